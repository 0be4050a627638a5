//! Account persistence.
//!
//! Every mutation is a single store operation so callers never split an
//! existence check from the write that depends on it.

use super::account::UserAccount;
use crate::error::{AptoError, Result};
use crate::utils::fs::{create_exclusive, file_safe_key, write_atomic};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Result of [`AccountStore::insert_if_absent`].
#[derive(Debug)]
pub enum InsertOutcome {
    /// The candidate was stored.
    Inserted(UserAccount),
    /// An account already existed; it is returned unchanged.
    Existing(UserAccount),
}

impl InsertOutcome {
    pub fn into_account(self) -> UserAccount {
        match self {
            InsertOutcome::Inserted(a) | InsertOutcome::Existing(a) => a,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Document store keyed by user id.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Store `candidate` unless an account for its user already exists.
    async fn insert_if_absent(&self, candidate: UserAccount) -> Result<InsertOutcome>;

    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>>;

    /// Give the user `candidate`'s key pair. An existing account keeps its
    /// alerts flag and creation time; status flags are cleared.
    async fn upsert_keys(&self, candidate: UserAccount) -> Result<UserAccount>;

    /// Set the alerts flag. `None` when the user has no account.
    async fn set_alerts(&self, user_id: &str, enabled: bool) -> Result<Option<UserAccount>>;

    /// Flip the alerts flag. `None` when the user has no account.
    async fn toggle_alerts(&self, user_id: &str) -> Result<Option<UserAccount>>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, used in tests and for throwaway runs.
#[derive(Default, Clone)]
pub struct MemoryAccountStore {
    pub(in crate::wallet) accounts: Arc<RwLock<HashMap<String, UserAccount>>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert_if_absent(&self, candidate: UserAccount) -> Result<InsertOutcome> {
        let mut accounts = self.accounts.write().await;
        if let Some(existing) = accounts.get(candidate.user_id()) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        accounts.insert(candidate.user_id().to_string(), candidate.clone());
        Ok(InsertOutcome::Inserted(candidate))
    }

    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        Ok(self.accounts.read().await.get(user_id).cloned())
    }

    async fn upsert_keys(&self, candidate: UserAccount) -> Result<UserAccount> {
        let mut accounts = self.accounts.write().await;
        let stored = match accounts.get_mut(candidate.user_id()) {
            Some(existing) => {
                existing.adopt_keys(&candidate);
                existing.clone()
            }
            None => {
                accounts.insert(candidate.user_id().to_string(), candidate.clone());
                candidate
            }
        };
        Ok(stored)
    }

    async fn set_alerts(&self, user_id: &str, enabled: bool) -> Result<Option<UserAccount>> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.get_mut(user_id).map(|a| {
            a.set_alerts(enabled);
            a.clone()
        }))
    }

    async fn toggle_alerts(&self, user_id: &str) -> Result<Option<UserAccount>> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.get_mut(user_id).map(|a| {
            let next = !a.alerts_enabled();
            a.set_alerts(next);
            a.clone()
        }))
    }
}

// ============================================================================
// JSON document store
// ============================================================================

/// One pretty-printed JSON document per user under a directory.
///
/// Creation is exclusive at the filesystem level, so two processes racing on
/// first contact still end up with a single document. Updates within one
/// process are serialized by a write lock and land via rename.
pub struct JsonFileAccountStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileAccountStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        restrict_permissions(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_safe_key(user_id)))
    }

    async fn read(&self, user_id: &str) -> Result<Option<UserAccount>> {
        let path = self.path_for(user_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let account = serde_json::from_slice(&bytes).map_err(|e| {
                    AptoError::Store(format!("account document {} unreadable: {}", path.display(), e))
                })?;
                Ok(Some(account))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, account: &UserAccount) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(account)?;
        write_atomic(&self.path_for(account.user_id()), &bytes).await?;
        Ok(())
    }

    async fn update_alerts(
        &self,
        user_id: &str,
        next: impl FnOnce(bool) -> bool,
    ) -> Result<Option<UserAccount>> {
        let _guard = self.write_lock.lock().await;
        let Some(mut account) = self.read(user_id).await? else {
            return Ok(None);
        };
        account.set_alerts(next(account.alerts_enabled()));
        self.write(&account).await?;
        Ok(Some(account))
    }
}

#[async_trait]
impl AccountStore for JsonFileAccountStore {
    async fn insert_if_absent(&self, candidate: UserAccount) -> Result<InsertOutcome> {
        let bytes = serde_json::to_vec_pretty(&candidate)?;
        let path = self.path_for(candidate.user_id());
        if create_exclusive(&path, &bytes).await? {
            debug!(user_id = %candidate.user_id(), "Account document created");
            return Ok(InsertOutcome::Inserted(candidate));
        }
        match self.read(candidate.user_id()).await? {
            Some(existing) => Ok(InsertOutcome::Existing(existing)),
            None => Err(AptoError::Store(format!(
                "account document {} vanished during insert",
                path.display()
            ))),
        }
    }

    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        self.read(user_id).await
    }

    async fn upsert_keys(&self, candidate: UserAccount) -> Result<UserAccount> {
        let _guard = self.write_lock.lock().await;
        let stored = match self.read(candidate.user_id()).await? {
            Some(mut existing) => {
                existing.adopt_keys(&candidate);
                existing
            }
            None => candidate,
        };
        self.write(&stored).await?;
        Ok(stored)
    }

    async fn set_alerts(&self, user_id: &str, enabled: bool) -> Result<Option<UserAccount>> {
        self.update_alerts(user_id, |_| enabled).await
    }

    async fn toggle_alerts(&self, user_id: &str) -> Result<Option<UserAccount>> {
        self.update_alerts(user_id, |current| !current).await
    }
}

#[cfg(unix)]
fn restrict_permissions(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Path) -> Result<()> {
    Ok(())
}
