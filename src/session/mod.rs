//! Session module - durable conversation memory for agent threads
//!
//! Each agent thread (`thread_id = user_id`) has one [`Session`] checkpoint.
//! The [`SessionManager`] caches checkpoints in memory and, when given a
//! directory, persists each one as a JSON document so conversations survive
//! restarts.
//!
//! # Example
//!
//! ```
//! use aptoclaw::session::{SessionManager, Message};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = SessionManager::new_memory();
//!
//!     let mut session = manager.get_or_create("12345").await.unwrap();
//!     session.add_message(Message::user("Hello!"));
//!     session.add_message(Message::assistant("Hi there!"));
//!     manager.save(&session).await.unwrap();
//!
//!     assert_eq!(manager.get_or_create("12345").await.unwrap().message_count(), 2);
//! }
//! ```

pub mod types;

pub use types::{Message, Role, Session, ToolCall};

use crate::error::{AptoError, Result};
use crate::utils::fs::{file_safe_key, write_atomic};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Checkpoint store for conversation threads.
///
/// Cloning is cheap; clones share the same cache.
///
/// Concurrent read-modify-save of the same thread is not safe; the agent
/// session factory holds a per-thread lock around each reply.
#[derive(Clone)]
pub struct SessionManager {
    /// In-memory cache of sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Optional directory for file-based persistence
    storage_path: Option<PathBuf>,
}

impl SessionManager {
    /// Create an in-memory session manager without persistence.
    pub fn new_memory() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: None,
        }
    }

    /// Create a session manager persisting to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    ///
    /// # Example
    /// ```no_run
    /// use aptoclaw::session::SessionManager;
    /// use std::path::PathBuf;
    ///
    /// let manager = SessionManager::with_path(PathBuf::from("/tmp/sessions")).unwrap();
    /// ```
    pub fn with_path(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: Some(path),
        })
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    fn file_for(&self, key: &str) -> Option<PathBuf> {
        self.storage_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", file_safe_key(key))))
    }

    /// Get an existing session or an empty one for `key`.
    ///
    /// A new session is cached but not written until [`save`](Self::save).
    pub async fn get_or_create(&self, key: &str) -> Result<Session> {
        match self.get(key).await? {
            Some(session) => Ok(session),
            None => {
                let session = Session::new(key);
                let mut sessions = self.sessions.write().await;
                sessions.insert(key.to_string(), session.clone());
                Ok(session)
            }
        }
    }

    /// Get a session if it exists in the cache or on disk.
    pub async fn get(&self, key: &str) -> Result<Option<Session>> {
        // Check in-memory cache first
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(key) {
                return Ok(Some(session.clone()));
            }
        }

        let Some(file_path) = self.file_for(key) else {
            return Ok(None);
        };
        let content = match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_str(&content).map_err(|e| {
            error!(thread_id = %key, path = %file_path.display(), error = %e, "Corrupt conversation checkpoint");
            AptoError::Session(format!("checkpoint for thread {} is corrupt: {}", key, e))
        })?;
        debug!(thread_id = %key, messages = session.message_count(), "Loaded checkpoint");

        let mut sessions = self.sessions.write().await;
        sessions.insert(key.to_string(), session.clone());
        Ok(Some(session))
    }

    /// Store a session on disk, when persistent, and then in the cache.
    ///
    /// A failed write leaves the cache as it was, so memory never runs ahead
    /// of what a restart would load.
    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(file_path) = self.file_for(&session.key) {
            let content = serde_json::to_string_pretty(session)?;
            write_atomic(&file_path, content.as_bytes()).await?;
        }

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.key.clone(), session.clone());
        Ok(())
    }

    #[cfg(test)]
    async fn cache_size(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new_memory()
    }
}
