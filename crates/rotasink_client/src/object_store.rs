//! Object-store (S3-style) client trait.

use crate::error::ClientResult;
use std::io::Read;

/// The operations the rotating writer needs from an S3-compatible store.
///
/// Implementations wrap a concrete SDK. The writer never interprets the
/// bytes it uploads, and it never asks for a server-side rename: the
/// store has none, so finalization is `copy_object` followed by
/// `delete_object`.
pub trait ObjectStoreClient: Send + Sync {
    /// Creates a bucket in the given location.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClientError::AlreadyExists`] if the bucket exists,
    /// or another error if the request fails.
    fn make_bucket(&self, bucket: &str, location: &str) -> ClientResult<()>;

    /// Returns whether the bucket exists and is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn bucket_exists(&self, bucket: &str) -> ClientResult<bool>;

    /// Returns the size of an object, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn object_size(&self, bucket: &str, key: &str) -> ClientResult<Option<u64>>;

    /// Uploads an object whose size is not known in advance.
    ///
    /// `body` is read until end-of-stream. The call returns only after the
    /// whole object has been persisted, and reports the number of bytes
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns an error if reading `body` or the upload fails.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        content_type: &str,
    ) -> ClientResult<u64>;

    /// Copies `src` to `dst` within one bucket, server-side.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing or the copy fails.
    fn copy_object(&self, bucket: &str, src: &str, dst: &str) -> ClientResult<()>;

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()>;
}
