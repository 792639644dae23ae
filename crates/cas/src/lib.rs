//! Content Addressable Storage (CAS) for shutterbox.
//!
//! The local half of the image store: every image is kept under the SHA-256
//! of its bytes, written once and never modified.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cas::{ContentStore, FileStore};
//!
//! let store = FileStore::at_path("/var/lib/shutterbox/cache").unwrap();
//!
//! // Store content
//! let hash = store.store(b"\x89PNG...", "image/png").unwrap();
//! println!("Stored as: {}", hash);
//!
//! // Retrieve content
//! if let Some(data) = store.retrieve(&hash).unwrap() {
//!     println!("Got {} bytes", data.len());
//! }
//! ```
//!
//! # Shared Storage
//!
//! Several processes may point at the same root:
//! - Content is write-once (content-addressed = no conflicts)
//! - Creation is atomic, so a losing writer sees `AlreadyPresent`
//! - No locking required

pub mod config;
pub mod hash;
pub mod metadata;
pub mod store;

pub use config::CasConfig;
pub use hash::{ContentHash, HashError, HASH_HEX_LEN};
pub use metadata::{CasMetadata, CasReference, OCTET_STREAM};
pub use store::{ContentStore, FileStore, WriteOutcome};
