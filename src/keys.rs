//! Key material for WolfMesh
//!
//! WireGuard keys are 32 raw bytes carried as base64 text. The same encoding
//! covers X25519 private/public keys and the pairwise pre-shared secrets, so
//! one `Key` type holds all three. Keypair generation uses X25519 so the
//! public half is always derived from the private half.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

/// Length of a raw key in bytes
pub const KEY_LEN: usize = 32;

/// Why a key encoding failed to parse
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("not valid base64")]
    Decode(#[from] base64::DecodeError),

    #[error("decoded to {0} bytes (expected {KEY_LEN})")]
    Length(usize),
}

/// A 32-byte key (private, public, or pre-shared), base64 on the wire
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Parse a base64-encoded key
    pub fn from_base64(raw: &str) -> Result<Self, KeyError> {
        let bytes = BASE64.decode(raw.trim())?;
        if bytes.len() != KEY_LEN {
            return Err(KeyError::Length(bytes.len()));
        }
        let mut arr = [0u8; KEY_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Encode as base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Generate a fresh random key (used for pre-shared secrets)
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl From<[u8; KEY_LEN]> for Key {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

// Key material never ends up in logs via {:?}
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// X25519 keypair, both halves generated as one operation
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub private: Key,
    pub public: Key,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            private: Key(secret.to_bytes()),
            public: Key(public.to_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_round_trip() {
        let key = Key::generate();
        let encoded = key.to_base64();
        let parsed = Key::from_base64(&encoded).unwrap();
        assert_eq!(key, parsed);
        assert_eq!(encoded, parsed.to_base64());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let key = Key::generate();
        let padded = format!("  {}\n", key.to_base64());
        assert_eq!(Key::from_base64(&padded).unwrap(), key);
    }

    #[test]
    fn test_reject_garbage() {
        assert!(matches!(
            Key::from_base64("not!!base64@@"),
            Err(KeyError::Decode(_))
        ));
    }

    #[test]
    fn test_reject_wrong_length() {
        let short = BASE64.encode([0u8; 16]);
        assert!(matches!(
            Key::from_base64(&short),
            Err(KeyError::Length(16))
        ));
    }

    #[test]
    fn test_generate_is_unique() {
        let a = Key::generate();
        let b = Key::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_keypair_public_derived_from_private() {
        let kp = KeyPair::generate();
        let secret = StaticSecret::from(*kp.private.as_bytes());
        let expected = PublicKey::from(&secret);
        assert_eq!(kp.public.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn test_debug_redacts_material() {
        let key = Key::generate();
        let dbg = format!("{:?}", key);
        assert!(!dbg.contains(&key.to_base64()));
    }
}
