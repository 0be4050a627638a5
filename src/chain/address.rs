//! Aptos account addresses.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::str::FromStr;

/// Authentication-key scheme byte for single-signer Ed25519 accounts.
const ED25519_SCHEME: u8 = 0x00;

/// A 32-byte Aptos account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountAddress([u8; 32]);

/// Why an address string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid account address '{input}': {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: &'static str,
}

impl AccountAddress {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Address of the account whose authentication key is derived from this
    /// Ed25519 public key: `sha3_256(public_key || 0x00)`.
    pub fn from_ed25519_public_key(public_key: &[u8; 32]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(public_key);
        hasher.update([ED25519_SCHEME]);
        Self(hasher.finalize().into())
    }

    /// Same as [`from_ed25519_public_key`](Self::from_ed25519_public_key) for a
    /// hex-encoded key (`0x` prefix optional). `None` unless it is 32 bytes.
    pub fn from_public_key_hex(public_key: &str) -> Option<Self> {
        let digits = public_key.strip_prefix("0x").unwrap_or(public_key);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes).ok()?;
        Some(Self::from_ed25519_public_key(&bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full-length `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self.to_hex())
    }
}

impl FromStr for AccountAddress {
    type Err = AddressParseError;

    /// Accepts `0x`-prefixed or bare hex of 1 to 64 digits. Short forms such
    /// as `0x1` are left-padded with zeros.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| AddressParseError {
            input: s.to_string(),
            reason,
        };
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(err("empty"));
        }
        if digits.len() > 64 {
            return Err(err("longer than 32 bytes"));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err("not hexadecimal"));
        }
        let padded = format!("{:0>64}", digits);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes).map_err(|_| err("not hexadecimal"))?;
        Ok(Self(bytes))
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_address_is_padded() {
        let addr: AccountAddress = "0x1".parse().unwrap();
        assert_eq!(
            addr.to_hex(),
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!("0x".parse::<AccountAddress>().is_err());
        assert!("0xzz".parse::<AccountAddress>().is_err());
        assert!(format!("0x{}", "a".repeat(65))
            .parse::<AccountAddress>()
            .is_err());
    }

    #[test]
    fn test_accepts_bare_and_prefixed() {
        let a: AccountAddress = "ABCDEF".parse().unwrap();
        let b: AccountAddress = "0xabcdef".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derivation_appends_scheme_byte() {
        let pk = [7u8; 32];
        let mut hasher = Sha3_256::new();
        hasher.update([7u8; 32]);
        hasher.update([0u8]);
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(AccountAddress::from_ed25519_public_key(&pk).as_bytes(), &expected);
    }

    #[test]
    fn test_serde_as_string() {
        let addr: AccountAddress = "0x1".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.starts_with("\"0x0000"));
        let back: AccountAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
