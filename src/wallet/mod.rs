//! Custodial key management.
//!
//! [`Keystore`] is the only component that reads or writes private key
//! material. Everything else receives a [`SigningIdentity`] (which can sign
//! but not export) or a public key string.
//!
//! # Example
//!
//! ```
//! use aptoclaw::wallet::{Keystore, MemoryAccountStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let keystore = Keystore::new(Arc::new(MemoryAccountStore::new()));
//!     let (identity, public_key) = keystore.get_or_create("42").await.unwrap();
//!     assert_eq!(identity.public_key_hex(), public_key);
//!
//!     let (_, again) = keystore.get_or_create("42").await.unwrap();
//!     assert_eq!(again, public_key);
//! }
//! ```

pub mod account;
pub mod identity;
pub mod import_state;
pub mod store;

pub use account::UserAccount;
pub use identity::SigningIdentity;
pub use import_state::{ImportState, ImportStateTracker};
pub use store::{AccountStore, InsertOutcome, JsonFileAccountStore, MemoryAccountStore};

use crate::error::{AptoError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Get-or-create, import, alerts and key reveal over an [`AccountStore`].
#[derive(Clone)]
pub struct Keystore {
    store: Arc<dyn AccountStore>,
}

impl Keystore {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Return the user's signing identity and public key, creating the
    /// account on first contact.
    ///
    /// Stored key material that fails to decode is an error
    /// (`KeyDecode`). A replacement key is never generated in that case.
    pub async fn get_or_create(&self, user_id: &str) -> Result<(SigningIdentity, String)> {
        if let Some(account) = self.store.get(user_id).await? {
            return Self::identity_of(&account);
        }

        let fresh = SigningIdentity::generate();
        let outcome = self
            .store
            .insert_if_absent(UserAccount::new(user_id, &fresh))
            .await?;
        match outcome {
            InsertOutcome::Inserted(account) => {
                info!(user_id = %user_id, address = %fresh.address(), "Created custodial account");
                Ok((fresh, account.public_key().to_string()))
            }
            // lost a first-contact race; the winner's key is the account
            InsertOutcome::Existing(account) => Self::identity_of(&account),
        }
    }

    /// Replace the user's key pair with the one encoded by `hex_key`.
    ///
    /// `hex_key` must be exactly 64 hex characters with no surrounding
    /// whitespace; on `InvalidKeyFormat` the stored account is untouched. On
    /// success the previous key is discarded: funds held by the old address
    /// are no longer reachable through this bot.
    pub async fn import_from_hex(&self, user_id: &str, hex_key: &str) -> Result<String> {
        let identity = SigningIdentity::from_hex64(hex_key)?;
        let previous = self.store.get(user_id).await?;
        let stored = self
            .store
            .upsert_keys(UserAccount::new(user_id, &identity))
            .await?;

        match previous {
            Some(old) if old.public_key() != stored.public_key() => {
                warn!(
                    user_id = %user_id,
                    previous_public_key = %old.public_key(),
                    "Imported key replaced existing custodial key"
                );
            }
            _ => info!(user_id = %user_id, "Imported custodial key"),
        }
        Ok(stored.public_key().to_string())
    }

    /// Set the alerts flag; fails with `AccountNotFound` if the user has none.
    pub async fn set_alerts(&self, user_id: &str, enabled: bool) -> Result<()> {
        self.store
            .set_alerts(user_id, enabled)
            .await?
            .map(|_| ())
            .ok_or_else(|| AptoError::AccountNotFound(user_id.to_string()))
    }

    /// Flip the alerts flag and return the new value.
    pub async fn toggle_alerts(&self, user_id: &str) -> Result<bool> {
        self.store
            .toggle_alerts(user_id)
            .await?
            .map(|a| a.alerts_enabled())
            .ok_or_else(|| AptoError::AccountNotFound(user_id.to_string()))
    }

    /// Stored private key string. The caller must route it only to the
    /// user's own direct chat.
    pub async fn reveal_private_key(&self, user_id: &str) -> Result<String> {
        self.store
            .get(user_id)
            .await?
            .map(|a| a.private_key)
            .ok_or_else(|| AptoError::AccountNotFound(user_id.to_string()))
    }

    /// Read-only account lookup; does not create.
    pub async fn account(&self, user_id: &str) -> Result<Option<UserAccount>> {
        self.store.get(user_id).await
    }

    fn identity_of(account: &UserAccount) -> Result<(SigningIdentity, String)> {
        let identity = SigningIdentity::from_stored(&account.private_key).map_err(|e| {
            error!(user_id = %account.user_id(), error = %e, "Stored key material is corrupt");
            e
        })?;
        if identity.public_key_hex() != account.public_key() {
            error!(user_id = %account.user_id(), "Stored public key does not match private key");
            return Err(AptoError::KeyDecode(
                "stored public key does not match stored private key".to_string(),
            ));
        }
        Ok((identity, account.public_key().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keystore() -> (Keystore, Arc<MemoryAccountStore>) {
        let store = Arc::new(MemoryAccountStore::new());
        (Keystore::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (ks, store) = keystore();
        let (_, a) = ks.get_or_create("u1").await.unwrap();
        let (_, b) = ks.get_or_create("u1").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len().await, 1);
        let account = ks.account("u1").await.unwrap().unwrap();
        assert!(!account.alerts_enabled());
        assert!(!account.in_progress());
        assert!(!account.in_game());
    }

    #[tokio::test]
    async fn test_corrupt_key_is_not_regenerated() {
        let (ks, store) = keystore();
        let (_, original) = ks.get_or_create("u1").await.unwrap();
        {
            let mut accounts = store.accounts.write().await;
            accounts.get_mut("u1").unwrap().private_key = "0xnothex".to_string();
        }
        let err = ks.get_or_create("u1").await.unwrap_err();
        assert!(err.is_fatal_key_error());
        let account = ks.account("u1").await.unwrap().unwrap();
        assert_eq!(account.public_key(), original);
    }

    #[tokio::test]
    async fn test_import_rejects_bad_hex_without_change() {
        let (ks, _) = keystore();
        let (_, original) = ks.get_or_create("u1").await.unwrap();
        let err = ks.import_from_hex("u1", "abc").await.unwrap_err();
        assert!(matches!(err, AptoError::InvalidKeyFormat));
        let (_, after) = ks.get_or_create("u1").await.unwrap();
        assert_eq!(after, original);
    }

    #[tokio::test]
    async fn test_import_overwrites_and_resets_flags() {
        let (ks, _) = keystore();
        ks.get_or_create("u1").await.unwrap();
        ks.set_alerts("u1", true).await.unwrap();

        let key = "11".repeat(32);
        let public_key = ks.import_from_hex("u1", &key).await.unwrap();
        let (identity, stored) = ks.get_or_create("u1").await.unwrap();
        assert_eq!(stored, public_key);
        assert_eq!(identity.public_key_hex(), public_key);
        assert_eq!(ks.reveal_private_key("u1").await.unwrap(), format!("0x{}", key));
    }

    #[tokio::test]
    async fn test_import_without_prior_account_creates_it() {
        let (ks, _) = keystore();
        let public_key = ks.import_from_hex("fresh", &"ab".repeat(32)).await.unwrap();
        let account = ks.account("fresh").await.unwrap().unwrap();
        assert_eq!(account.public_key(), public_key);
        assert!(!account.alerts_enabled());
    }

    #[tokio::test]
    async fn test_alerts_require_account() {
        let (ks, _) = keystore();
        assert!(matches!(
            ks.set_alerts("ghost", true).await,
            Err(AptoError::AccountNotFound(_))
        ));
        assert!(matches!(
            ks.toggle_alerts("ghost").await,
            Err(AptoError::AccountNotFound(_))
        ));
        assert!(matches!(
            ks.reveal_private_key("ghost").await,
            Err(AptoError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_twice_restores() {
        let (ks, _) = keystore();
        ks.get_or_create("u1").await.unwrap();
        assert!(ks.toggle_alerts("u1").await.unwrap());
        assert!(!ks.toggle_alerts("u1").await.unwrap());
        ks.set_alerts("u1", false).await.unwrap();
        ks.set_alerts("u1", false).await.unwrap();
        assert!(!ks.account("u1").await.unwrap().unwrap().alerts_enabled());
    }
}
