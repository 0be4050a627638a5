//! Channel trait and types for AptoClaw
//!
//! A channel turns transport events (typed text, button presses) into
//! [`InboundMessage`](crate::bus::InboundMessage)s on the bus and delivers
//! [`OutboundMessage`]s back to the user.

use async_trait::async_trait;

use crate::bus::OutboundMessage;
use crate::error::Result;

/// Interface every chat transport implements.
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use aptoclaw::channels::{Channel, BaseChannelConfig};
/// use aptoclaw::bus::OutboundMessage;
/// use aptoclaw::error::Result;
///
/// struct ConsoleChannel {
///     config: BaseChannelConfig,
///     running: bool,
/// }
///
/// #[async_trait]
/// impl Channel for ConsoleChannel {
///     fn name(&self) -> &str {
///         &self.config.name
///     }
///
///     async fn start(&mut self) -> Result<()> {
///         self.running = true;
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<()> {
///         self.running = false;
///         Ok(())
///     }
///
///     async fn send(&self, msg: OutboundMessage) -> Result<()> {
///         println!("[{}] {}", msg.chat_id, msg.content);
///         Ok(())
///     }
///
///     fn is_running(&self) -> bool {
///         self.running
///     }
///
///     fn is_allowed(&self, user_id: &str) -> bool {
///         self.config.is_allowed(user_id)
///     }
/// }
/// ```
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name, matched against `OutboundMessage::channel`.
    fn name(&self) -> &str;

    /// Connect and begin publishing inbound events. Returns once the
    /// listener is spawned.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot start (e.g. missing token).
    async fn start(&mut self) -> Result<()>;

    /// Stop listening and release the connection.
    async fn stop(&mut self) -> Result<()>;

    /// Deliver a text message or a chat status update.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat id is invalid for this transport or the
    /// transport rejects the request.
    async fn send(&self, msg: OutboundMessage) -> Result<()>;

    fn is_running(&self) -> bool;

    /// Whether `user_id` may talk to the bot on this channel.
    fn is_allowed(&self, user_id: &str) -> bool;
}

/// Name and access control shared by all channels.
///
/// # Example
///
/// ```
/// use aptoclaw::channels::BaseChannelConfig;
///
/// let config = BaseChannelConfig::with_allowlist("telegram", vec!["42".to_string()]);
/// assert!(config.is_allowed("42"));
/// assert!(!config.is_allowed("43"));
///
/// let open = BaseChannelConfig::new("telegram");
/// assert!(open.is_allowed("anyone"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BaseChannelConfig {
    pub name: String,
    /// Allowed user ids. Empty means everyone, unless `deny_by_default`.
    pub allowlist: Vec<String>,
    /// Reject everyone when `allowlist` is empty
    pub deny_by_default: bool,
}

impl BaseChannelConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_allowlist(name: &str, allowlist: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            allowlist,
            deny_by_default: false,
        }
    }

    pub fn is_allowed(&self, user_id: &str) -> bool {
        if self.allowlist.is_empty() {
            !self.deny_by_default
        } else {
            self.allowlist.iter().any(|u| u == user_id)
        }
    }
}
