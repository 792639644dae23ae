//! Configuration loading for shutterbox.
//!
//! The server never reads process-wide mutable settings: everything it
//! needs is loaded once into a [`ShutterConfig`] at startup and handed to
//! constructors from there.
//!
//! # Usage
//!
//! ```rust,no_run
//! use shutterconf::ShutterConfig;
//!
//! let config = ShutterConfig::load().expect("Failed to load config");
//! let cache_dir = config.require_cache_dir().expect("cache_dir is required");
//! println!("cache: {}", cache_dir.display());
//! println!("listen: {}", config.bind.addr());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/shutterbox/config.toml` (system)
//! 2. `~/.config/shutterbox/config.toml` (user)
//! 3. `./shutterbox.toml` (local override), or the path given on the CLI
//! 4. Environment variables (`SHUTTERBOX_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! cache_dir = "~/.local/share/shutterbox/cache"
//!
//! [bind]
//! http_port = 8901
//!
//! [remote]
//! endpoint = "https://objects.example.com"
//! bucket = "images"
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod infra;
pub mod loader;
pub mod remote;

pub use infra::{BindConfig, PathsConfig, PublicConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use remote::{RemoteConfig, RemoteTarget};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("No cache directory configured (set [paths] cache_dir or SHUTTERBOX_CACHE_DIR)")]
    MissingCacheDir,

    #[error("Remote store is half configured: {missing} is not set")]
    IncompleteRemote { missing: &'static str },
}

/// Complete shutterbox configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShutterConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub public: PublicConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ShutterConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./shutterbox.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let mut sources = ConfigSources::default();
        let mut config = loader::load_layered(&files)?;
        sources.files = files;

        loader::apply_env_overrides(&mut config, &mut sources, |var| std::env::var(var).ok())?;

        Ok((config, sources))
    }

    /// Parse a single TOML document (no file discovery, no env).
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        loader::parse_toml(contents, Path::new("<inline>"))
    }

    /// The cache root, or the startup error for a missing one.
    pub fn require_cache_dir(&self) -> Result<&Path, ConfigError> {
        self.paths
            .cache_dir
            .as_deref()
            .ok_or(ConfigError::MissingCacheDir)
    }

    /// Resolved remote store, or `None` for local-only mode.
    pub fn remote_target(&self) -> Result<Option<RemoteTarget>, ConfigError> {
        self.remote.target()
    }

    /// Serialize config to TOML, with secrets masked.
    pub fn to_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.remote.auth_token.is_some() {
            shown.remote.auth_token = Some("<redacted>".to_string());
        }

        let body = toml::to_string_pretty(&shown)
            .unwrap_or_else(|e| format!("# failed to render config: {e}\n"));
        format!("# shutterbox configuration\n\n{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShutterConfig::default();
        assert_eq!(config.bind.http_port, 8901);
        assert_eq!(config.public.scheme, "http");
        assert!(config.paths.cache_dir.is_none());
        assert!(config.remote_target().unwrap().is_none());
    }

    #[test]
    fn test_missing_cache_dir_is_an_error() {
        let config = ShutterConfig::default();
        assert!(matches!(
            config.require_cache_dir(),
            Err(ConfigError::MissingCacheDir)
        ));
    }

    #[test]
    fn test_to_toml_redacts_token() {
        let mut config = ShutterConfig::default();
        config.paths.cache_dir = Some(PathBuf::from("/srv/cache"));
        config.remote.endpoint = Some("https://objects.example.com".to_string());
        config.remote.bucket = Some("images".to_string());
        config.remote.auth_token = Some("hunter2".to_string());

        let rendered = config.to_toml();
        assert!(rendered.contains("[paths]"));
        assert!(rendered.contains("[remote]"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = ShutterConfig::default();
        config.paths.cache_dir = Some(PathBuf::from("/srv/cache"));
        config.bind.http_port = 9100;

        let reparsed = ShutterConfig::from_toml_str(&config.to_toml()).unwrap();
        assert_eq!(reparsed.paths.cache_dir, Some(PathBuf::from("/srv/cache")));
        assert_eq!(reparsed.bind.http_port, 9100);
    }
}
