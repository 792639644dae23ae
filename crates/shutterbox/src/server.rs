//! Wiring from configuration to a running HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use cas::FileStore;
use shutterconf::ShutterConfig;
use tracing::info;

use crate::remote::{HttpObjectStore, LocalOnly, RemoteStore, Visibility};
use crate::resize::ThumbnailResizer;
use crate::service::{ImageService, ServiceOptions};
use crate::web::{self, WebState};

/// Build the image service described by `config`.
///
/// Fails without a cache directory, or with a half-configured remote.
pub fn build_service(config: &ShutterConfig) -> Result<ImageService> {
    let cache_dir = config.require_cache_dir()?;

    let (remote, visibility): (Arc<dyn RemoteStore>, Visibility) = match config.remote_target()? {
        Some(target) => (
            Arc::new(
                HttpObjectStore::new(&target)
                    .context("Failed to build remote client")?
                    .with_max_object_bytes(config.bind.max_upload_bytes),
            ),
            Visibility::from_public_read(target.public_read),
        ),
        None => (Arc::new(LocalOnly), Visibility::default()),
    };

    let local = FileStore::at_path(cache_dir)
        .with_context(|| format!("Failed to open cache at {}", cache_dir.display()))?;

    let options = ServiceOptions {
        public_scheme: config.public.scheme.clone(),
        visibility,
    };

    Ok(ImageService::new(
        Arc::new(local),
        remote,
        Arc::new(ThumbnailResizer),
        options,
    ))
}

/// Serve until SIGINT or SIGTERM.
pub async fn run(config: ShutterConfig) -> Result<()> {
    let service = Arc::new(build_service(&config)?);

    info!("📷 shutterbox starting");
    if let Some(cache_dir) = &config.paths.cache_dir {
        info!("   Cache: {}", cache_dir.display());
    }
    info!("   Remote: {}", service.remote().describe());

    let app = web::router(WebState::new(service), config.bind.max_upload_bytes);

    let addr = config.bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("📷 shutterbox ready!");
    info!("   Upload: POST http://{}/upload", addr);
    info!("   Images: GET http://{}/image/{{id}}/{{filename}}[/{{size}}]", addr);
    info!("   Health: GET http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(web::shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_build_requires_cache_dir() {
        let err = build_service(&ShutterConfig::default()).err().unwrap();
        assert!(err.to_string().contains("cache"));
    }

    #[test]
    fn test_build_local_only() -> Result<()> {
        let dir = TempDir::new()?;
        let mut config = ShutterConfig::default();
        config.paths.cache_dir = Some(dir.path().to_path_buf());

        let service = build_service(&config)?;
        assert!(!service.remote().is_configured());
        assert!(dir.path().join("objects").is_dir());
        Ok(())
    }

    #[test]
    fn test_build_with_remote() -> Result<()> {
        let dir = TempDir::new()?;
        let mut config = ShutterConfig::default();
        config.paths.cache_dir = Some(dir.path().to_path_buf());
        config.remote.endpoint = Some("https://objects.example.com/".to_string());
        config.remote.bucket = Some("images".to_string());

        let service = build_service(&config)?;
        assert!(service.remote().is_configured());
        assert_eq!(service.remote().describe(), "https://objects.example.com/images");
        Ok(())
    }

    #[test]
    fn test_build_rejects_half_configured_remote() {
        let mut config = ShutterConfig::default();
        config.paths.cache_dir = Some(PathBuf::from("/nonexistent/never-created"));
        config.remote.endpoint = Some("https://objects.example.com".to_string());

        let err = build_service(&config).err().unwrap();
        assert!(err.to_string().contains("bucket"));
    }
}
