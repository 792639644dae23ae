//! shutterbox: a content-addressed image store.
//!
//! Clients upload an image and get back a stable URL derived from the
//! SHA-256 of its bytes. Originals live in an optional remote object store
//! and are cached write-once on local disk; requests may ask for a
//! downscaled JPEG rendition that fits a bounding box.
//!
//! - [`service::ImageService`] orchestrates uploads and fetches
//! - [`remote`] holds the object store adapters
//! - [`web`] exposes the service over HTTP

pub mod error;
pub mod remote;
pub mod resize;
pub mod server;
pub mod service;
pub mod size;
pub mod telemetry;
pub mod web;

pub use error::ServiceError;
pub use remote::{HttpObjectStore, LocalOnly, MemoryStore, RemoteError, RemoteStore, Visibility};
pub use resize::{Resizer, ThumbnailResizer};
pub use service::{FetchedImage, ImageService, ServiceOptions, UploadReceipt};
pub use size::SizeSpec;
