//! Content digests using SHA-256.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;

/// Digest size in bytes (SHA-256 produces 256-bit hashes).
pub const DIGEST_SIZE: usize = 32;

/// A 32-byte SHA-256 content digest, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentDigest([u8; DIGEST_SIZE]);

impl ContentDigest {
    /// Create a digest from raw bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        ContentDigest(bytes)
    }

    /// Create a digest from a hex string (64 lowercase hex characters).
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != DIGEST_SIZE * 2 {
            return Err(Error::invalid_digest(format!(
                "Expected {} hex characters, got {}",
                DIGEST_SIZE * 2,
                hex_str.len()
            )));
        }
        if hex_str.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(Error::invalid_digest("Digest must be lowercase hex"));
        }

        let bytes =
            hex::decode(hex_str).map_err(|e| Error::invalid_digest(format!("Invalid hex: {}", e)))?;

        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&bytes);
        Ok(ContentDigest(digest))
    }

    /// Convert to hex string (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Digest raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        ContentDigest(Sha256::digest(data).into())
    }

    /// Digest everything a reader yields.
    pub fn of_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = Sha256::new();
        std::io::copy(&mut reader, &mut hasher)?;
        Ok(ContentDigest(hasher.finalize().into()))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentDigest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
