//! Remote object store abstraction.
//!
//! The server runs in one of two modes, chosen once at startup from
//! configuration: with an HTTP object store behind the local cache, or
//! local-only. Both are a [`RemoteStore`]; the orchestrators never ask which.
//!
//! Keys are always content hashes, so an object's key never changes and a
//! repeated `put` of the same key carries the same bytes.

mod http;
mod memory;

pub use http::HttpObjectStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use cas::ContentHash;

/// Access level requested for an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    PublicRead,
    Private,
}

impl Visibility {
    pub fn from_public_read(public_read: bool) -> Self {
        if public_read {
            Self::PublicRead
        } else {
            Self::Private
        }
    }

    /// Canned ACL name understood by S3-compatible services.
    pub fn as_acl(&self) -> &'static str {
        match self {
            Self::PublicRead => "public-read",
            Self::Private => "private",
        }
    }
}

/// Remote store failures. A missing object is not an error; see [`RemoteStore::get`].
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote store rejected credentials ({0})")]
    Unauthorized(u16),

    #[error("Remote store refused the request: {0}")]
    Forbidden(String),

    #[error("Rate limited by remote store")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Unexpected response ({0}): {1}")]
    Request(u16, String),

    #[error("Object {0} failed its integrity check")]
    Corrupt(ContentHash),

    #[error("Remote store is offline")]
    Offline,
}

impl RemoteError {
    /// Build an error from a non-success HTTP status (404 never reaches here).
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => RemoteError::Unauthorized(status),
            403 => RemoteError::Forbidden(body.to_string()),
            408 => RemoteError::Timeout,
            429 => RemoteError::RateLimited,
            500..=599 => RemoteError::Server(status, body.to_string()),
            _ => RemoteError::Request(status, body.to_string()),
        }
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Network(err.to_string())
        }
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::RateLimited
                | RemoteError::Timeout
                | RemoteError::Network(_)
                | RemoteError::Server(_, _)
                | RemoteError::Offline
        )
    }
}

/// Durable store of original images, addressed by content hash.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch an object. `Ok(None)` means the store answered and has no such key.
    async fn get(&self, key: &ContentHash) -> Result<Option<Vec<u8>>, RemoteError>;

    /// Store an object. Re-putting an existing key is harmless.
    async fn put(
        &self,
        key: &ContentHash,
        data: Bytes,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<(), RemoteError>;

    /// Whether uploads are actually persisted anywhere.
    fn is_configured(&self) -> bool {
        true
    }

    /// Short human-readable description for logs and `/health`.
    fn describe(&self) -> String;
}

/// Local-only mode: nothing is ever found remotely and uploads skip the remote step.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

#[async_trait]
impl RemoteStore for LocalOnly {
    async fn get(&self, _key: &ContentHash) -> Result<Option<Vec<u8>>, RemoteError> {
        Ok(None)
    }

    async fn put(
        &self,
        _key: &ContentHash,
        _data: Bytes,
        _content_type: &str,
        _visibility: Visibility,
    ) -> Result<(), RemoteError> {
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "local-only".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            RemoteError::from_status(401, ""),
            RemoteError::Unauthorized(401)
        ));
        assert!(matches!(
            RemoteError::from_status(403, "denied"),
            RemoteError::Forbidden(body) if body == "denied"
        ));
        assert!(matches!(
            RemoteError::from_status(503, "busy"),
            RemoteError::Server(503, _)
        ));
        assert!(matches!(
            RemoteError::from_status(418, "teapot"),
            RemoteError::Request(418, _)
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::from_status(429, "").is_transient());
        assert!(RemoteError::from_status(500, "").is_transient());
        assert!(RemoteError::Timeout.is_transient());
        assert!(!RemoteError::from_status(403, "").is_transient());
        assert!(!RemoteError::Corrupt(ContentHash::from_data(b"x")).is_transient());
    }

    #[test]
    fn test_visibility_acl() {
        assert_eq!(Visibility::from_public_read(true).as_acl(), "public-read");
        assert_eq!(Visibility::from_public_read(false).as_acl(), "private");
    }

    #[tokio::test]
    async fn test_local_only_is_inert() {
        let remote = LocalOnly;
        let key = ContentHash::from_data(b"anything");

        remote
            .put(&key, Bytes::from_static(b"anything"), "image/png", Visibility::Private)
            .await
            .unwrap();
        assert_eq!(remote.get(&key).await.unwrap(), None);
        assert!(!remote.is_configured());
        assert_eq!(remote.describe(), "local-only");
    }
}
