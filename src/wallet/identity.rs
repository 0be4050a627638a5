//! Ed25519 signing identities.
//!
//! Private key bytes leave this type only as the stored string form, and only
//! inside the `wallet` module.

use crate::chain::AccountAddress;
use crate::error::{AptoError, Result};
use ed25519_dalek::{Signer, SigningKey};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use regex::Regex;
use std::fmt;

/// Exactly 256 bits of hex, no prefix, no whitespace.
static IMPORT_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("static regex"));

/// AIP-80 style prefix some wallets put in front of exported keys.
const AIP80_PREFIX: &str = "ed25519-priv-";

/// A user's key pair.
#[derive(Clone)]
pub struct SigningIdentity {
    key: SigningKey,
}

impl SigningIdentity {
    /// Fresh key pair from the OS random source.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Parse user-supplied import text.
    ///
    /// The text must be exactly 64 hexadecimal characters. Surrounding
    /// whitespace or a `0x` prefix is rejected here; the dispatcher trims a
    /// pasted chat message before it reaches the keystore.
    pub fn from_hex64(text: &str) -> Result<Self> {
        if !IMPORT_KEY_RE.is_match(text) {
            return Err(AptoError::InvalidKeyFormat);
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes).map_err(|_| AptoError::InvalidKeyFormat)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Rebuild an identity from key material read back from the store.
    ///
    /// Accepts the `0x` form written by this crate and the `ed25519-priv-0x`
    /// form. Anything else is corruption and fails with `KeyDecode`.
    pub(crate) fn from_stored(material: &str) -> Result<Self> {
        let digits = material.strip_prefix(AIP80_PREFIX).unwrap_or(material);
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        if digits.len() != 64 {
            return Err(AptoError::KeyDecode(format!(
                "expected 64 hex digits, found {}",
                digits.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| AptoError::KeyDecode(e.to_string()))?;
        Ok(Self::from_bytes(&bytes))
    }

    fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(bytes),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    /// `0x`-prefixed lowercase hex of the public key.
    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.public_key_bytes()))
    }

    /// On-chain account address controlled by this key.
    pub fn address(&self) -> AccountAddress {
        AccountAddress::from_ed25519_public_key(&self.public_key_bytes())
    }

    /// Ed25519 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.key.sign(message).to_bytes()
    }

    /// Stored string form of the private key.
    pub(in crate::wallet) fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.to_bytes()))
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
