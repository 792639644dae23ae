//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the local image cache.
    /// No default: a server without a cache root refuses to start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

/// Network bind settings for the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindConfig {
    /// Interface to bind.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// HTTP port for upload, image and health endpoints.
    /// Default: 8901
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,

    /// Largest accepted upload body in bytes.
    /// Default: 32 MiB
    #[serde(default = "BindConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl BindConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        8901
    }

    fn default_max_upload_bytes() -> usize {
        32 * 1024 * 1024
    }

    /// `host:port` string suitable for binding a listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

/// How returned image URLs are composed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicConfig {
    /// Scheme prefixed to the request host in upload responses.
    /// Default: http
    #[serde(default = "PublicConfig::default_scheme")]
    pub scheme: String,
}

impl PublicConfig {
    fn default_scheme() -> String {
        "http".to_string()
    }
}

impl Default for PublicConfig {
    fn default() -> Self {
        Self {
            scheme: Self::default_scheme(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry. Unset means fmt logging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp_endpoint: Option<String>,

    /// Log filter directive (trace, debug, info, warn, error, or an
    /// `EnvFilter` expression).
    /// Default: info,shutterbox=debug
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info,shutterbox=debug".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: Self::default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_defaults() {
        let bind = BindConfig::default();
        assert_eq!(bind.http_port, 8901);
        assert_eq!(bind.addr(), "0.0.0.0:8901");
        assert_eq!(bind.max_upload_bytes, 32 * 1024 * 1024);
    }

    #[test]
    fn test_paths_default_has_no_cache_dir() {
        assert!(PathsConfig::default().cache_dir.is_none());
    }
}
