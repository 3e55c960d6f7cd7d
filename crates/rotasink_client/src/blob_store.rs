//! Blob-store (Azure-style) client trait.

use crate::error::ClientResult;
use std::io::Read;
use std::time::Duration;

/// Status of a server-side blob copy.
///
/// Copies are asynchronous: a copy starts `Pending` and later settles in
/// `Success` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    /// The copy is still in progress.
    Pending,
    /// The copy completed.
    Success,
    /// The copy ended in failure, with the service's description.
    Failed(String),
}

impl CopyStatus {
    /// Returns true once the copy has settled.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CopyStatus::Pending)
    }
}

/// Buffering parameters handed to a streamed block upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Size of each staged block in bytes.
    pub buffer_size: usize,
    /// Number of blocks staged concurrently.
    pub max_buffers: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            buffer_size: 2 * 1024 * 1024,
            max_buffers: 3,
        }
    }
}

/// The operations the rotating writer needs from a blob store.
pub trait BlobStoreClient: Send + Sync {
    /// Creates a container, giving up once `deadline` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClientError::AlreadyExists`] if the container
    /// exists, or another error if the request fails.
    fn create_container(&self, container: &str, deadline: Duration) -> ClientResult<()>;

    /// Returns the size of a blob, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn blob_size(&self, container: &str, blob: &str) -> ClientResult<Option<u64>>;

    /// Uploads a block blob from a stream of unknown length.
    ///
    /// Returns only once the blob has been committed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading `body` or any block upload fails.
    fn upload_stream(
        &self,
        container: &str,
        blob: &str,
        body: &mut dyn Read,
        options: UploadOptions,
    ) -> ClientResult<u64>;

    /// Starts a server-side copy of `src` to `dst` and returns its
    /// initial status.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy could not be started.
    fn start_copy(&self, container: &str, src: &str, dst: &str) -> ClientResult<CopyStatus>;

    /// Returns the current status of the copy into `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the status could not be fetched.
    fn copy_status(&self, container: &str, dst: &str) -> ClientResult<CopyStatus>;

    /// Deletes a blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_blob(&self, container: &str, blob: &str) -> ClientResult<()>;
}
