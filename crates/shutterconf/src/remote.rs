//! Remote object store settings.
//!
//! The remote store is optional. Leaving both `endpoint` and `bucket` unset
//! runs the server in local-only mode; setting exactly one of them is a
//! configuration error rather than a silent downgrade.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// `[remote]` section as written in config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the object service, e.g. `https://objects.example.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Bucket that holds the images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Bearer token sent with every request, if the service wants one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Store uploads world-readable.
    /// Default: true
    #[serde(default = "RemoteConfig::default_public_read")]
    pub public_read: bool,

    /// Per-request timeout.
    /// Default: 30
    #[serde(default = "RemoteConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    fn default_public_read() -> bool {
        true
    }

    fn default_timeout_secs() -> u64 {
        30
    }

    /// Resolve into a usable target, or `None` for local-only mode.
    ///
    /// Blank `endpoint` or `bucket` values count as unset.
    pub fn target(&self) -> Result<Option<RemoteTarget>, ConfigError> {
        let endpoint = self.endpoint.as_deref().filter(|v| !v.trim().is_empty());
        let bucket = self.bucket.as_deref().filter(|v| !v.trim().is_empty());

        match (endpoint, bucket) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::IncompleteRemote { missing: "bucket" }),
            (None, Some(_)) => Err(ConfigError::IncompleteRemote { missing: "endpoint" }),
            (Some(endpoint), Some(bucket)) => Ok(Some(RemoteTarget {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                bucket: bucket.to_string(),
                auth_token: self.auth_token.clone(),
                public_read: self.public_read,
                timeout: Duration::from_secs(self.timeout_secs),
            })),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: None,
            auth_token: None,
            public_read: Self::default_public_read(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// A fully specified remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Endpoint without a trailing slash.
    pub endpoint: String,
    pub bucket: String,
    pub auth_token: Option<String>,
    pub public_read: bool,
    pub timeout: Duration,
}
