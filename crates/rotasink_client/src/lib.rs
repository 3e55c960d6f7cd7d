//! # Rotasink Client
//!
//! Store client abstractions for Rotasink.
//!
//! The rotating writers never talk to a network SDK directly. They go
//! through the two traits in this crate, which carry exactly the calls a
//! writer needs: provision a bucket or container, stream one upload per
//! segment, copy server-side, and delete.
//!
//! ## Available Clients
//!
//! - [`InMemoryObjectStore`] - S3-style store for tests and local runs
//! - [`InMemoryBlobStore`] - Azure-style store with asynchronous copies
//! - `S3ObjectStore` and `AzureBlobStore` - real services through the
//!   `object_store` crate (feature `cloud`)
//!
//! ## Example
//!
//! ```rust
//! use rotasink_client::{BlobStoreClient, CopyStatus, InMemoryBlobStore, UploadOptions};
//! use std::time::Duration;
//!
//! let store = InMemoryBlobStore::new();
//! store.create_container("logs", Duration::from_secs(30)).unwrap();
//! store
//!     .upload_stream("logs", "app", &mut &b"line"[..], UploadOptions::default())
//!     .unwrap();
//! let status = store.start_copy("logs", "app", "app-1").unwrap();
//! assert_eq!(status, CopyStatus::Success);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob_store;
#[cfg(feature = "cloud")]
mod cloud;
mod error;
mod memory;
mod object_store;

pub use blob_store::{BlobStoreClient, CopyStatus, UploadOptions};
#[cfg(feature = "cloud")]
pub use cloud::{AzureBlobStore, S3ObjectStore, S3_MIN_PART_SIZE};
pub use error::{ClientError, ClientResult};
pub use memory::{InMemoryBlobStore, InMemoryObjectStore};
pub use object_store::ObjectStoreClient;
