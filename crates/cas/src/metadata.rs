//! Metadata sidecars for cached objects.
//!
//! Each object can have a small JSON file next to it recording the MIME type
//! it was stored with, so originals can be served with the right
//! `Content-Type` without sniffing on every request.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};

/// Fallback MIME type when no sidecar exists.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Metadata stored alongside cached objects.
///
/// Stored as JSON in the metadata directory with the same prefix/remainder
/// structure as the object itself, but with a `.json` extension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CasMetadata {
    /// MIME type of the content (e.g., "image/jpeg", "image/png").
    pub mime_type: String,

    /// Size of the content in bytes.
    pub size: u64,
}

/// What `inspect()` knows about a cached object without reading its bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasReference {
    pub hash: ContentHash,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl CasReference {
    pub fn new(hash: ContentHash, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            hash,
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cas_metadata_json_shape() {
        let meta = CasMetadata {
            mime_type: "image/jpeg".to_string(),
            size: 48000,
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["mime_type"], "image/jpeg");
        assert_eq!(json["size"], 48000);
    }

    #[test]
    fn test_cas_reference_new() {
        let hash = ContentHash::from_data(b"test");
        let reference = CasReference::new(hash.clone(), "image/png", 4);

        assert_eq!(reference.hash, hash);
        assert_eq!(reference.mime_type, "image/png");
        assert_eq!(reference.size_bytes, 4);
    }
}
