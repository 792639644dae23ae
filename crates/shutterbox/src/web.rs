//! HTTP endpoints for shutterbox.
//!
//! Images are addressed by content hash. The file name in image URLs is
//! cosmetic and never used for lookup.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::error::ServiceError;
use crate::service::{FetchedImage, ImageService};
use crate::telemetry::parse_traceparent;

/// Multipart field that carries the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Originals and renditions never change for a given URL.
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Shared state for web handlers
#[derive(Clone)]
pub struct WebState {
    pub service: Arc<ImageService>,
    pub start_time: Instant,
}

impl WebState {
    pub fn new(service: Arc<ImageService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: WebState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/image/{id}/{filename}", get(fetch_original))
        .route("/image/{id}/{filename}/{size}", get(fetch_sized))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Request span, parented to the caller's trace when a `traceparent` header is present.
fn request_span(request: &Request<Body>) -> tracing::Span {
    let span = tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
    );
    let traceparent = request
        .headers()
        .get("traceparent")
        .and_then(|v| v.to_str().ok());
    if let Some(parent) = parse_traceparent(traceparent) {
        span.set_parent(parent);
    }
    span
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub id: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        } else if matches!(self, ServiceError::NotFound) {
            debug!(error = %self, "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(serde_json::json!({ "error": self.kind() }))).into_response()
    }
}

fn image_response(image: FetchedImage) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL.to_string()),
        ],
        image.bytes,
    )
        .into_response()
}

fn multipart_error(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge
    } else {
        ServiceError::MalformedRequest(err.body_text())
    }
}

/// Serve root discovery endpoint
async fn serve_root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "shutterbox",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "upload": "POST /upload",
            "image": "/image/{id}/{filename}",
            "resized": "/image/{id}/{filename}/{width}x{height}",
            "health": "/health",
        }
    }))
}

async fn health(State(state): State<WebState>) -> Json<serde_json::Value> {
    let remote = state.service.remote();

    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "remote": {
            "configured": remote.is_configured(),
            "store": remote.describe(),
        }
    }))
}

async fn upload(
    State(state): State<WebState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServiceError> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string();

    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        file = Some((name, data));
        break;
    }

    let Some((name, data)) = file else {
        return Err(ServiceError::MalformedRequest(format!(
            "missing multipart field {UPLOAD_FIELD:?}"
        )));
    };

    let receipt = state.service.upload(data, &name, &host).await?;
    Ok(Json(UploadResponse {
        url: receipt.url,
        id: receipt.id.into_inner(),
    }))
}

async fn fetch_original(
    State(state): State<WebState>,
    Path((id, _filename)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    let image = state.service.fetch(&id, None).await?;
    Ok(image_response(image))
}

async fn fetch_sized(
    State(state): State<WebState>,
    Path((id, _filename, size)): Path<(String, String, String)>,
) -> Result<Response, ServiceError> {
    let image = state.service.fetch(&id, Some(&size)).await?;
    Ok(image_response(image))
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate() => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
