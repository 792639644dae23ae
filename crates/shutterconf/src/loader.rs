//! Config file discovery, layered loading, and environment variable overlay.

use crate::{ConfigError, ShutterConfig};
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/shutterbox/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("shutterbox/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("shutterbox.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Recursively merge `overlay` into `base`; overlay keys win, tables merge.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let incoming = match value {
            toml::Value::Table(incoming) => incoming,
            other => {
                base.insert(key, other);
                continue;
            }
        };
        if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
            merge_tables(existing, incoming);
            continue;
        }
        base.insert(key, toml::Value::Table(incoming));
    }
}

fn from_table(table: toml::Table, path: &Path) -> Result<ShutterConfig, ConfigError> {
    let mut config: ShutterConfig = toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if let Some(dir) = config.paths.cache_dir.take() {
        config.paths.cache_dir = Some(expand_path(&dir.to_string_lossy()));
    }
    Ok(config)
}

/// Load and merge the given files in order; later files override earlier ones
/// key by key. An empty list yields the compiled defaults.
pub fn load_layered(files: &[PathBuf]) -> Result<ShutterConfig, ConfigError> {
    let mut merged = toml::Table::new();
    for path in files {
        merge_tables(&mut merged, read_table(path)?);
    }

    let label = files
        .last()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("<defaults>"));
    from_table(merged, &label)
}

/// Parse config from a TOML string.
pub(crate) fn parse_toml(contents: &str, path: &Path) -> Result<ShutterConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    from_table(table, path)
}

fn parse_env<T: std::str::FromStr>(var: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value,
    })
}

fn parse_bool_env(var: &str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value,
        }),
    }
}

/// Apply environment variable overrides to config.
///
/// `lookup` resolves a variable name to its value; the server passes
/// `std::env::var`, tests pass a map.
pub fn apply_env_overrides<F>(
    config: &mut ShutterConfig,
    sources: &mut ConfigSources,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // An exported-but-empty variable counts as unset.
    let mut take = |var: &str| {
        let value = lookup(var).filter(|v| !v.trim().is_empty());
        if value.is_some() {
            sources.env_overrides.push(var.to_string());
        }
        value
    };

    if let Some(v) = take("SHUTTERBOX_CACHE_DIR") {
        config.paths.cache_dir = Some(expand_path(&v));
    }

    if let Some(v) = take("SHUTTERBOX_HOST") {
        config.bind.host = v;
    }
    if let Some(v) = take("SHUTTERBOX_HTTP_PORT") {
        config.bind.http_port = parse_env("SHUTTERBOX_HTTP_PORT", v)?;
    }
    if let Some(v) = take("SHUTTERBOX_MAX_UPLOAD_BYTES") {
        config.bind.max_upload_bytes = parse_env("SHUTTERBOX_MAX_UPLOAD_BYTES", v)?;
    }

    if let Some(v) = take("SHUTTERBOX_PUBLIC_SCHEME") {
        config.public.scheme = v;
    }

    if let Some(v) = take("SHUTTERBOX_REMOTE_ENDPOINT") {
        config.remote.endpoint = Some(v);
    }
    if let Some(v) = take("SHUTTERBOX_REMOTE_BUCKET") {
        config.remote.bucket = Some(v);
    }
    if let Some(v) = take("SHUTTERBOX_REMOTE_TOKEN") {
        config.remote.auth_token = Some(v);
    }
    if let Some(v) = take("SHUTTERBOX_REMOTE_PUBLIC_READ") {
        config.remote.public_read = parse_bool_env("SHUTTERBOX_REMOTE_PUBLIC_READ", v)?;
    }

    if let Some(v) = take("SHUTTERBOX_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
    }
    // Also support standard OTEL env var
    if let Some(v) = take("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
    }
    if let Some(v) = take("SHUTTERBOX_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    // Also support RUST_LOG
    if let Some(v) = take("RUST_LOG") {
        config.telemetry.log_level = v;
    }

    Ok(())
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = std::env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            std::env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
