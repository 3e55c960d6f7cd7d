//! # Rotasink Core
//!
//! Size-triggered rotating writers for Rotasink.
//!
//! A writer accepts opaque byte payloads and appends them to a working
//! segment. Once the next payload would bring the segment to the rotation
//! threshold, the segment is finalized under a timestamped name and a fresh
//! working segment is opened. A payload is never split across segments.
//!
//! ## Design Principles
//!
//! - One open segment per writer, fed through a bounded background pump
//! - Rotation blocks the caller until the old segment is durable
//! - Backends only know how to open, persist and finalize a segment
//! - Any rotation failure poisons the writer
//!
//! ## Available Backends
//!
//! - [`FileRotateWriter`] - Local files, finalized by rename
//! - [`ObjectRotateWriter`] - S3-style object stores, copy then delete
//! - [`BlobRotateWriter`] - Azure-style blob stores, polled copy then delete
//!
//! The store clients come from `rotasink_client`. With the `cloud` feature,
//! `ObjectRotateWriter::connect_remote` and `BlobRotateWriter::connect_remote`
//! build clients for real S3 and Azure services from the configuration.
//!
//! ## Example
//!
//! ```rust
//! use rotasink_client::InMemoryObjectStore;
//! use rotasink_core::{ObjectRotateWriter, ObjectStoreConfig};
//! use std::sync::Arc;
//!
//! let client = Arc::new(InMemoryObjectStore::new());
//! let config = ObjectStoreConfig::new("localhost:9000", "logs", "app", 14);
//! let writer = ObjectRotateWriter::connect(Arc::clone(&client), config).unwrap();
//! writer.write(b"Hello World 1").unwrap();
//! writer.write(b"Hello World 2").unwrap();
//! writer.close().unwrap();
//! assert_eq!(client.keys("logs").len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod clock;
#[cfg(feature = "cloud")]
mod cloud;
mod config;
mod copy;
mod error;
mod file;
mod naming;
mod object;
mod pump;
mod store;
mod writer;

pub use blob::{BlobRotateWriter, BlobSegmentStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BlobStoreConfig, FileConfig, ObjectStoreConfig, WriterConfig, DEFAULT_BLOB_ENDPOINT,
    DEFAULT_QUEUE_DEPTH,
};
pub use error::{ErrorKind, RotateError, RotateResult, RotationPhase, Source};
pub use file::{FileRotateWriter, FileSegmentStore};
pub use naming::SegmentNames;
pub use object::{ObjectRotateWriter, ObjectSegmentStore};
pub use pump::{ChannelReader, SegmentPump};
pub use store::SegmentStore;
pub use writer::{RotateWriter, SizeRotateWriter, WriterState};
