//! Test destinations and canned scenarios.
//!
//! A [`TestDestination`] owns the storage behind a writer, a temporary
//! directory or an in-memory store, and can list what was persisted
//! after the writer has closed.

use rotasink_client::{InMemoryBlobStore, InMemoryObjectStore};
use rotasink_core::{
    BlobRotateWriter, BlobStoreConfig, FileConfig, FileRotateWriter, ObjectRotateWriter,
    ObjectStoreConfig, RotateWriter,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Bucket used by object-store destinations.
pub const TEST_BUCKET: &str = "testbucket";

/// Container used by blob-store destinations.
pub const TEST_CONTAINER: &str = "testcontainer";

/// Storage behind a writer under test.
pub enum TestDestination {
    /// A temporary directory, removed on drop.
    File(TempDir),
    /// An in-memory S3-style store.
    Object(Arc<InMemoryObjectStore>),
    /// An in-memory Azure-style store.
    Blob(Arc<InMemoryBlobStore>),
}

impl TestDestination {
    /// Creates a file destination in a fresh temporary directory.
    pub fn file() -> Self {
        TestDestination::File(TempDir::new().expect("Failed to create temp directory"))
    }

    /// Creates an empty object-store destination.
    pub fn object() -> Self {
        TestDestination::Object(Arc::new(InMemoryObjectStore::new()))
    }

    /// Creates an empty blob-store destination.
    pub fn blob() -> Self {
        TestDestination::Blob(Arc::new(InMemoryBlobStore::new()))
    }

    /// Returns one destination per backend.
    pub fn all() -> Vec<Self> {
        vec![Self::file(), Self::object(), Self::blob()]
    }

    /// Short backend name for assertion messages.
    pub fn kind(&self) -> &'static str {
        match self {
            TestDestination::File(_) => "file",
            TestDestination::Object(_) => "object",
            TestDestination::Blob(_) => "blob",
        }
    }

    /// Opens a writer whose working segment is named `base`.
    ///
    /// # Panics
    ///
    /// Panics if the writer cannot be opened.
    pub fn open(&self, base: &str, threshold: usize) -> Box<dyn RotateWriter> {
        match self {
            TestDestination::File(dir) => Box::new(
                FileRotateWriter::open(FileConfig::new(dir.path().join(base), threshold))
                    .expect("Failed to open file writer"),
            ),
            TestDestination::Object(client) => Box::new(
                ObjectRotateWriter::connect(
                    Arc::clone(client),
                    ObjectStoreConfig::new("localhost:9000", TEST_BUCKET, base, threshold),
                )
                .expect("Failed to connect object writer"),
            ),
            TestDestination::Blob(client) => Box::new(
                BlobRotateWriter::connect(
                    Arc::clone(client),
                    BlobStoreConfig::new("devstoreaccount1", TEST_CONTAINER, base, threshold)
                        .with_poll_interval(Duration::from_millis(1)),
                )
                .expect("Failed to connect blob writer"),
            ),
        }
    }

    /// Returns `(name, size)` of every persisted segment, sorted by name.
    pub fn segments(&self) -> Vec<(String, usize)> {
        let mut out: Vec<(String, usize)> = match self {
            TestDestination::File(dir) => fs::read_dir(dir.path())
                .expect("Failed to list temp directory")
                .map(|entry| {
                    let entry = entry.expect("Failed to read directory entry");
                    let len = entry.metadata().expect("Failed to stat segment").len();
                    (entry.file_name().to_string_lossy().into_owned(), len as usize)
                })
                .collect(),
            TestDestination::Object(client) => client
                .keys(TEST_BUCKET)
                .into_iter()
                .map(|key| {
                    let len = client.get(TEST_BUCKET, &key).map_or(0, |d| d.len());
                    (key, len)
                })
                .collect(),
            TestDestination::Blob(client) => client
                .blobs(TEST_CONTAINER)
                .into_iter()
                .map(|blob| {
                    let len = client.get(TEST_CONTAINER, &blob).map_or(0, |d| d.len());
                    (blob, len)
                })
                .collect(),
        };
        out.sort();
        out
    }

    /// Returns the contents of one segment.
    ///
    /// # Panics
    ///
    /// Panics if the segment does not exist.
    pub fn read(&self, name: &str) -> Vec<u8> {
        match self {
            TestDestination::File(dir) => {
                fs::read(dir.path().join(name)).expect("Failed to read segment")
            }
            TestDestination::Object(client) => {
                client.get(TEST_BUCKET, name).expect("No such object")
            }
            TestDestination::Blob(client) => {
                client.get(TEST_CONTAINER, name).expect("No such blob")
            }
        }
    }
}

/// The three payloads of the hello-world scenario, 13 bytes each.
pub fn hello_world_payloads() -> Vec<Vec<u8>> {
    (1..=3)
        .map(|i| format!("Hello World {i}").into_bytes())
        .collect()
}

/// Writes every payload in order.
///
/// # Panics
///
/// Panics on the first failed write.
pub fn write_all(writer: &dyn RotateWriter, payloads: &[Vec<u8>]) {
    for payload in payloads {
        writer.write(payload).expect("Write failed");
    }
}

/// Returns the lengths a writer with `threshold` should leave behind for
/// `lengths`, last element being the working segment.
///
/// Mirrors the rotation rule: the segment rotates when the next payload
/// would bring it to the threshold, even if it is still empty.
/// Zero-length payloads are skipped.
pub fn expected_segment_sizes(lengths: &[usize], threshold: usize) -> Vec<usize> {
    let mut sizes = vec![0];
    for &len in lengths.iter().filter(|&&len| len > 0) {
        let current = sizes.last().copied().unwrap_or(0);
        if current + len >= threshold {
            sizes.push(len);
        } else if let Some(last) = sizes.last_mut() {
            *last += len;
        }
    }
    sizes
}
