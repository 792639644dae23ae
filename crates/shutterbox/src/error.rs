//! Request-level failures and their HTTP translation.

use axum::http::StatusCode;
use cas::ContentHash;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::resize::ResizeError;
use crate::size::SizeSpecError;

/// Everything an upload or fetch can fail with.
///
/// Variants carry detail for the logs; clients only ever see [`ServiceError::kind`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Image not found")]
    NotFound,

    #[error("Remote store failure: {0}")]
    Upstream(#[source] RemoteError),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Upload exceeds the configured size limit")]
    PayloadTooLarge,

    #[error("Stored image could not be processed: {0}")]
    Undecodable(#[source] ResizeError),

    #[error("Local cache failure: {0:#}")]
    Io(anyhow::Error),

    #[error("Cache write-back for {0} did not become readable")]
    CacheInconsistent(ContentHash),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Undecodable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Io(_) | ServiceError::CacheInconsistent(_) | ServiceError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable, detail-free label returned to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound => "not_found",
            ServiceError::Upstream(_) => "upstream_unavailable",
            ServiceError::MalformedRequest(_) => "malformed_request",
            ServiceError::PayloadTooLarge => "payload_too_large",
            ServiceError::Undecodable(_) => "undecodable_image",
            ServiceError::Io(_) | ServiceError::CacheInconsistent(_) | ServiceError::Worker(_) => {
                "internal_error"
            }
        }
    }

    /// Server-side faults, as opposed to problems with the request.
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<SizeSpecError> for ServiceError {
    fn from(err: SizeSpecError) -> Self {
        ServiceError::MalformedRequest(err.to_string())
    }
}

impl From<RemoteError> for ServiceError {
    fn from(err: RemoteError) -> Self {
        ServiceError::Upstream(err)
    }
}

impl From<ResizeError> for ServiceError {
    fn from(err: ResizeError) -> Self {
        ServiceError::Undecodable(err)
    }
}
