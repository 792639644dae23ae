//! Upload and fetch orchestration over the local cache and remote store.
//!
//! The local cache is the fast path and the remote store is the source of
//! truth. A fetch that misses locally pulls the original from the remote,
//! verifies it against its identifier, writes it back, then reads the cache
//! one more time. Uploads go to the remote first, so an image is never
//! served from a cache that the remote does not also hold.

use std::sync::Arc;

use bytes::Bytes;
use cas::{ContentHash, ContentStore, WriteOutcome, OCTET_STREAM};
use tracing::{debug, info, instrument, warn, Span};

use crate::error::ServiceError;
use crate::remote::{RemoteError, RemoteStore, Visibility};
use crate::resize::{sniff_mime, Resizer, RESIZED_CONTENT_TYPE};
use crate::size::SizeSpec;

/// Used when an upload carries no usable file name.
pub const DEFAULT_DISPLAY_NAME: &str = "image";

/// Knobs that do not belong to any one store.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Scheme prefixed to the request host in returned URLs.
    pub public_scheme: String,
    /// ACL requested for remote uploads.
    pub visibility: Visibility,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            public_scheme: "http".to_string(),
            visibility: Visibility::PublicRead,
        }
    }
}

/// Image bytes ready to send, with their content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: ContentHash,
    pub url: String,
}

pub struct ImageService {
    local: Arc<dyn ContentStore>,
    remote: Arc<dyn RemoteStore>,
    resizer: Arc<dyn Resizer>,
    options: ServiceOptions,
}

impl ImageService {
    pub fn new(
        local: Arc<dyn ContentStore>,
        remote: Arc<dyn RemoteStore>,
        resizer: Arc<dyn Resizer>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            local,
            remote,
            resizer,
            options,
        }
    }

    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    /// Serve an image, optionally resized to fit `size` (`WxH` or `original`).
    ///
    /// The size token is validated before any store is touched. Identifiers
    /// that are not 64 hex characters cannot name anything and are reported
    /// as [`ServiceError::NotFound`].
    #[instrument(skip_all, fields(id = %raw_id, size = ?size))]
    pub async fn fetch(&self, raw_id: &str, size: Option<&str>) -> Result<FetchedImage, ServiceError> {
        let spec = SizeSpec::from_token(size)?;

        let id = match ContentHash::from_str_checked(raw_id) {
            Ok(id) => id,
            Err(e) => {
                debug!(error = %e, "Rejecting unparseable identifier");
                return Err(ServiceError::NotFound);
            }
        };

        let original = self.locate(&id).await?;
        self.render(original, spec).await
    }

    /// Store an uploaded image and return its identifier and public URL.
    #[instrument(skip(self, data), fields(bytes = data.len(), id))]
    pub async fn upload(
        &self,
        data: Bytes,
        display_name: &str,
        host: &str,
    ) -> Result<UploadReceipt, ServiceError> {
        let id = ContentHash::from_data(&data);
        Span::current().record("id", id.as_str());
        let content_type = sniff_mime(&data);

        self.remote
            .put(&id, data.clone(), content_type, self.options.visibility)
            .await
            .map_err(|e| {
                warn!(error = %e, transient = e.is_transient(), "Remote upload failed");
                ServiceError::Upstream(e)
            })?;

        match self
            .local
            .write(&id, &data, content_type)
            .map_err(ServiceError::Io)?
        {
            WriteOutcome::Written => info!(content_type, "Cached new image"),
            WriteOutcome::AlreadyPresent => debug!("Image already cached"),
        }

        let url = self.public_url(host, &id, display_name);
        Ok(UploadReceipt { id, url })
    }

    /// Local hit, or remote fetch plus write-back and a single re-read.
    async fn locate(&self, id: &ContentHash) -> Result<FetchedImage, ServiceError> {
        if let Some(found) = self.read_local(id)? {
            debug!("Local cache hit");
            return Ok(found);
        }

        let bytes = match self.remote.get(id).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err(ServiceError::NotFound),
            Err(e) => {
                warn!(
                    error = %e,
                    transient = e.is_transient(),
                    remote = %self.remote.describe(),
                    "Remote fetch failed"
                );
                return Err(ServiceError::Upstream(e));
            }
        };

        if !id.matches(&bytes) {
            warn!(bytes = bytes.len(), "Remote object does not hash to its key");
            return Err(ServiceError::Upstream(RemoteError::Corrupt(id.clone())));
        }

        let outcome = self
            .local
            .write(id, &bytes, sniff_mime(&bytes))
            .map_err(ServiceError::Io)?;
        info!(bytes = bytes.len(), ?outcome, "Wrote remote object back to cache");
        drop(bytes);

        self.read_local(id)?
            .ok_or_else(|| ServiceError::CacheInconsistent(id.clone()))
    }

    fn read_local(&self, id: &ContentHash) -> Result<Option<FetchedImage>, ServiceError> {
        let Some(bytes) = self.local.retrieve(id).map_err(ServiceError::Io)? else {
            return Ok(None);
        };

        let content_type = match self.local.inspect(id) {
            Ok(Some(reference)) if reference.mime_type != OCTET_STREAM => reference.mime_type,
            Ok(_) => sniff_mime(&bytes).to_string(),
            Err(e) => {
                warn!(error = %e, "Unreadable metadata sidecar, sniffing content type");
                sniff_mime(&bytes).to_string()
            }
        };

        Ok(Some(FetchedImage {
            bytes,
            content_type,
        }))
    }

    async fn render(&self, original: FetchedImage, spec: SizeSpec) -> Result<FetchedImage, ServiceError> {
        let SizeSpec::Bounded { width, height } = spec else {
            return Ok(original);
        };

        let resizer = Arc::clone(&self.resizer);
        let bytes = tokio::task::spawn_blocking(move || {
            resizer.resize(&original.bytes, width, height)
        })
        .await
        .map_err(|e| ServiceError::Worker(e.to_string()))??;

        debug!(bytes = bytes.len(), size = %spec, "Resized image");
        Ok(FetchedImage {
            bytes,
            content_type: RESIZED_CONTENT_TYPE.to_string(),
        })
    }

    fn public_url(&self, host: &str, id: &ContentHash, display_name: &str) -> String {
        let name = sanitize_display_name(display_name);
        format!(
            "{}://{}/image/{}/{}",
            self.options.public_scheme,
            host,
            id,
            urlencoding::encode(&name)
        )
    }
}

/// Reduce a client-supplied file name to a single harmless path segment.
///
/// Directory components, control characters and leading dots are removed;
/// an empty result becomes [`DEFAULT_DISPLAY_NAME`].
pub fn sanitize_display_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    if cleaned.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
