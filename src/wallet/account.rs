//! The persisted per-user account document.

use super::identity::SigningIdentity;
use crate::chain::AccountAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One custodial account per chat user.
///
/// `public_key` and `private_key` are always written together from the same
/// [`SigningIdentity`], so the public key never disagrees with the stored key.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserAccount {
    user_id: String,
    public_key: String,
    pub(in crate::wallet) private_key: String,
    #[serde(default)]
    alerts_enabled: bool,
    #[serde(default)]
    in_progress: bool,
    #[serde(default)]
    in_game: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// New account document with alerts off and both status flags cleared.
    pub(in crate::wallet) fn new(user_id: &str, identity: &SigningIdentity) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            public_key: identity.public_key_hex(),
            private_key: identity.private_key_hex(),
            alerts_enabled: false,
            in_progress: false,
            in_game: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Take `other`'s key pair and reset status flags. Alerts are untouched.
    pub(in crate::wallet) fn adopt_keys(&mut self, other: &UserAccount) {
        self.public_key = other.public_key.clone();
        self.private_key = other.private_key.clone();
        self.in_progress = false;
        self.in_game = false;
        self.updated_at = Utc::now();
    }

    pub(in crate::wallet) fn set_alerts(&mut self, enabled: bool) {
        self.alerts_enabled = enabled;
        self.updated_at = Utc::now();
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// `0x`-prefixed hex of the Ed25519 public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn alerts_enabled(&self) -> bool {
        self.alerts_enabled
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn in_game(&self) -> bool {
        self.in_game
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Account address derived from the stored public key. `None` if the
    /// stored public key is not 32 bytes of hex.
    pub fn address(&self) -> Option<AccountAddress> {
        AccountAddress::from_public_key_hex(&self.public_key)
    }
}

impl fmt::Debug for UserAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAccount")
            .field("user_id", &self.user_id)
            .field("public_key", &self.public_key)
            .field("alerts_enabled", &self.alerts_enabled)
            .field("in_progress", &self.in_progress)
            .field("in_game", &self.in_game)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_defaults() {
        let id = SigningIdentity::generate();
        let account = UserAccount::new("u1", &id);
        assert_eq!(account.user_id(), "u1");
        assert_eq!(account.public_key(), id.public_key_hex());
        assert!(!account.alerts_enabled());
        assert!(!account.in_progress());
        assert!(!account.in_game());
        assert_eq!(account.address(), Some(id.address()));
    }

    #[test]
    fn test_adopt_keys_keeps_alerts() {
        let mut account = UserAccount::new("u1", &SigningIdentity::generate());
        account.set_alerts(true);
        account.in_game = true;
        let next = SigningIdentity::generate();
        account.adopt_keys(&UserAccount::new("u1", &next));
        assert_eq!(account.public_key(), next.public_key_hex());
        assert!(account.alerts_enabled());
        assert!(!account.in_game());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let account = UserAccount::new("u1", &SigningIdentity::generate());
        let dbg = format!("{:?}", account);
        assert!(!dbg.contains(&account.private_key));
    }

    #[test]
    fn test_document_field_names() {
        let account = UserAccount::new("u1", &SigningIdentity::generate());
        let value = serde_json::to_value(&account).unwrap();
        for field in ["user_id", "public_key", "private_key", "alerts_enabled", "in_progress", "in_game"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
    }
}
