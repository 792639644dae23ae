//! ContentHash: a SHA-256 digest rendered as 64 lowercase hex chars.
//!
//! The hash is both the dedup key and the public image identifier, so it
//! has to be collision resistant and stable across processes and releases.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a rendered hash in hex characters.
pub const HASH_HEX_LEN: usize = 64;

/// A content hash - 256 bits (32 bytes, 64 hex chars) of SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

/// Errors that can occur when parsing content hashes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid hash length: expected 64 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in hash")]
    InvalidHex,
}

impl ContentHash {
    /// Hash data and return the content hash.
    pub fn from_data(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(hex::encode(digest))
    }

    /// Create from an existing hash string (validates format).
    ///
    /// Uppercase input is accepted and normalized to lowercase so that a
    /// single object never has two spellings on disk.
    pub fn from_str_checked(s: &str) -> Result<Self, HashError> {
        if s.len() != HASH_HEX_LEN {
            return Err(HashError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Whether `data` hashes to this value.
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::from_data(data) == *self
    }

    /// First 2 characters (used for directory sharding).
    pub fn prefix(&self) -> &str {
        &self.0[0..2]
    }

    /// Remainder after the prefix (used as filename).
    pub fn remainder(&self) -> &str {
        &self.0[2..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
