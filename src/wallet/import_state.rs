//! Per-user "next message is a private key" gate.
//!
//! Single-shot: the first text consumed after `begin` clears the gate whether
//! or not it was a valid key. The user has to ask to import again after a typo.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Import gate state for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    AwaitingKey,
}

/// Transient, in-memory import gates keyed by user id.
#[derive(Clone, Default)]
pub struct ImportStateTracker {
    awaiting: Arc<Mutex<HashSet<String>>>,
}

impl ImportStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Idle -> AwaitingKey`. Calling it again while awaiting is a no-op.
    pub async fn begin(&self, user_id: &str) {
        self.awaiting.lock().await.insert(user_id.to_string());
    }

    pub async fn state(&self, user_id: &str) -> ImportState {
        if self.awaiting.lock().await.contains(user_id) {
            ImportState::AwaitingKey
        } else {
            ImportState::Idle
        }
    }

    /// Consume the gate: returns `true` exactly once per `begin`, and the
    /// user is `Idle` afterwards.
    pub async fn take(&self, user_id: &str) -> bool {
        self.awaiting.lock().await.remove(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_shot() {
        let tracker = ImportStateTracker::new();
        assert_eq!(tracker.state("u1").await, ImportState::Idle);

        tracker.begin("u1").await;
        assert_eq!(tracker.state("u1").await, ImportState::AwaitingKey);

        assert!(tracker.take("u1").await);
        assert_eq!(tracker.state("u1").await, ImportState::Idle);
        assert!(!tracker.take("u1").await);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let tracker = ImportStateTracker::new();
        tracker.begin("u1").await;
        assert_eq!(tracker.state("u2").await, ImportState::Idle);
        assert!(!tracker.take("u2").await);
        assert_eq!(tracker.state("u1").await, ImportState::AwaitingKey);
    }

    #[tokio::test]
    async fn test_begin_twice_is_still_single_shot() {
        let tracker = ImportStateTracker::new();
        tracker.begin("u1").await;
        tracker.begin("u1").await;
        assert!(tracker.take("u1").await);
        assert!(!tracker.take("u1").await);
        assert_eq!(tracker.state("u1").await, ImportState::Idle);
    }
}
