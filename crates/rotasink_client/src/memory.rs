//! In-memory store clients for testing.
//!
//! Both clients keep their contents behind `parking_lot` locks and can be
//! shared across threads (wrap them in an `Arc`). Each exposes a handful
//! of one-shot fault switches so callers can exercise failure paths that
//! a real service only produces under load or misconfiguration.

use crate::blob_store::{BlobStoreClient, CopyStatus, UploadOptions};
use crate::error::{ClientError, ClientResult};
use crate::object_store::ObjectStoreClient;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Namespace = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct ObjectFaults {
    make_bucket: Option<String>,
    put: Option<String>,
    copy: Option<String>,
    delete: Option<String>,
}

/// An in-memory S3-style object store.
///
/// Objects become visible only when their upload has read the body to
/// end-of-stream, matching the all-or-nothing visibility of a real
/// multipart upload.
///
/// # Example
///
/// ```rust
/// use rotasink_client::{InMemoryObjectStore, ObjectStoreClient};
///
/// let store = InMemoryObjectStore::new();
/// store.make_bucket("logs", "eu-central-1").unwrap();
/// store
///     .put_object("logs", "app.log", &mut &b"hello"[..], "text/plain")
///     .unwrap();
/// assert_eq!(store.get("logs", "app.log").unwrap(), b"hello");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    buckets: RwLock<BTreeMap<String, Namespace>>,
    faults: Mutex<ObjectFaults>,
    copy_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    /// Creates an empty store with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the keys stored in `bucket`, sorted.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a copy of an object's contents.
    #[must_use]
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    /// Returns the number of `copy_object` calls received.
    pub fn copy_calls(&self) -> usize {
        self.copy_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of `delete_object` calls received.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Makes the next `make_bucket` call fail with a service error.
    pub fn fail_next_make_bucket(&self, message: impl Into<String>) {
        self.faults.lock().make_bucket = Some(message.into());
    }

    /// Makes the next `put_object` call fail without reading its body.
    pub fn fail_next_put(&self, message: impl Into<String>) {
        self.faults.lock().put = Some(message.into());
    }

    /// Makes the next `copy_object` call fail.
    pub fn fail_next_copy(&self, message: impl Into<String>) {
        self.faults.lock().copy = Some(message.into());
    }

    /// Makes the next `delete_object` call fail.
    pub fn fail_next_delete(&self, message: impl Into<String>) {
        self.faults.lock().delete = Some(message.into());
    }
}

impl ObjectStoreClient for InMemoryObjectStore {
    fn make_bucket(&self, bucket: &str, _location: &str) -> ClientResult<()> {
        if let Some(message) = self.faults.lock().make_bucket.take() {
            return Err(ClientError::Service(message));
        }
        let mut buckets = self.buckets.write();
        if buckets.contains_key(bucket) {
            return Err(ClientError::AlreadyExists(bucket.to_string()));
        }
        buckets.insert(bucket.to_string(), Namespace::new());
        Ok(())
    }

    fn bucket_exists(&self, bucket: &str) -> ClientResult<bool> {
        Ok(self.buckets.read().contains_key(bucket))
    }

    fn object_size(&self, bucket: &str, key: &str) -> ClientResult<Option<u64>> {
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| ClientError::NotFound(bucket.to_string()))?;
        Ok(objects.get(key).map(|data| data.len() as u64))
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        _content_type: &str,
    ) -> ClientResult<u64> {
        if let Some(message) = self.faults.lock().put.take() {
            return Err(ClientError::Service(message));
        }
        if !self.buckets.read().contains_key(bucket) {
            return Err(ClientError::NotFound(bucket.to_string()));
        }

        let mut data = Vec::new();
        body.read_to_end(&mut data)?;
        let len = data.len() as u64;

        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::NotFound(bucket.to_string()))?;
        objects.insert(key.to_string(), data);
        Ok(len)
    }

    fn copy_object(&self, bucket: &str, src: &str, dst: &str) -> ClientResult<()> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.faults.lock().copy.take() {
            return Err(ClientError::Service(message));
        }

        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::NotFound(bucket.to_string()))?;
        let data = objects
            .get(src)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("{bucket}/{src}")))?;
        objects.insert(dst.to_string(), data);
        Ok(())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.faults.lock().delete.take() {
            return Err(ClientError::Service(message));
        }

        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::NotFound(bucket.to_string()))?;
        // S3 deletes are idempotent.
        objects.remove(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BlobFaults {
    create_container: Option<String>,
    upload: Option<String>,
    delete: Option<String>,
    copy_outcome: Option<String>,
    pending_polls: u32,
}

#[derive(Debug)]
struct CopyJob {
    data: Vec<u8>,
    remaining_polls: u32,
    failure: Option<String>,
    status: CopyStatus,
}

/// An in-memory Azure-style blob store.
///
/// Server-side copies can be configured to stay `Pending` for a number of
/// status polls, or to settle in `Failed`, so the writer's polling loop
/// can be exercised deterministically.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    containers: RwLock<BTreeMap<String, Namespace>>,
    copies: Mutex<HashMap<(String, String), CopyJob>>,
    faults: Mutex<BlobFaults>,
    status_polls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryBlobStore {
    /// Creates an empty store with no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the blob names stored in `container`, sorted.
    #[must_use]
    pub fn blobs(&self, container: &str) -> Vec<String> {
        self.containers
            .read()
            .get(container)
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a copy of a blob's contents.
    #[must_use]
    pub fn get(&self, container: &str, blob: &str) -> Option<Vec<u8>> {
        self.containers
            .read()
            .get(container)
            .and_then(|blobs| blobs.get(blob).cloned())
    }

    /// Returns the number of `copy_status` calls received.
    pub fn status_polls(&self) -> usize {
        self.status_polls.load(Ordering::SeqCst)
    }

    /// Returns the number of copies whose outcome has not been reported yet.
    pub fn pending_copies(&self) -> usize {
        self.copies.lock().len()
    }

    /// Returns the number of `delete_blob` calls received.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Makes the next `create_container` call fail with a service error.
    pub fn fail_next_create_container(&self, message: impl Into<String>) {
        self.faults.lock().create_container = Some(message.into());
    }

    /// Makes the next `upload_stream` call fail without reading its body.
    pub fn fail_next_upload(&self, message: impl Into<String>) {
        self.faults.lock().upload = Some(message.into());
    }

    /// Makes the next `delete_blob` call fail.
    pub fn fail_next_delete(&self, message: impl Into<String>) {
        self.faults.lock().delete = Some(message.into());
    }

    /// Makes the next started copy settle in `Failed`.
    pub fn fail_next_copy(&self, reason: impl Into<String>) {
        self.faults.lock().copy_outcome = Some(reason.into());
    }

    /// Keeps copies started from now on `Pending` for `polls` status polls.
    ///
    /// `u32::MAX` leaves them pending for good.
    pub fn set_pending_polls(&self, polls: u32) {
        self.faults.lock().pending_polls = polls;
    }
}

impl BlobStoreClient for InMemoryBlobStore {
    fn create_container(&self, container: &str, _deadline: Duration) -> ClientResult<()> {
        if let Some(message) = self.faults.lock().create_container.take() {
            return Err(ClientError::Service(message));
        }
        let mut containers = self.containers.write();
        if containers.contains_key(container) {
            return Err(ClientError::AlreadyExists(container.to_string()));
        }
        containers.insert(container.to_string(), Namespace::new());
        Ok(())
    }

    fn blob_size(&self, container: &str, blob: &str) -> ClientResult<Option<u64>> {
        let containers = self.containers.read();
        let blobs = containers
            .get(container)
            .ok_or_else(|| ClientError::NotFound(container.to_string()))?;
        Ok(blobs.get(blob).map(|data| data.len() as u64))
    }

    fn upload_stream(
        &self,
        container: &str,
        blob: &str,
        body: &mut dyn Read,
        options: UploadOptions,
    ) -> ClientResult<u64> {
        if let Some(message) = self.faults.lock().upload.take() {
            return Err(ClientError::Service(message));
        }
        if !self.containers.read().contains_key(container) {
            return Err(ClientError::NotFound(container.to_string()));
        }

        // Stage the body block by block, then commit the block list.
        let block_size = options.buffer_size.max(1);
        let mut data = Vec::new();
        let mut block = vec![0u8; block_size];
        loop {
            let n = body.read(&mut block)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&block[..n]);
        }
        let len = data.len() as u64;

        let mut containers = self.containers.write();
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| ClientError::NotFound(container.to_string()))?;
        blobs.insert(blob.to_string(), data);
        Ok(len)
    }

    fn start_copy(&self, container: &str, src: &str, dst: &str) -> ClientResult<CopyStatus> {
        let data = self
            .get(container, src)
            .ok_or_else(|| ClientError::NotFound(format!("{container}/{src}")))?;

        let (remaining_polls, failure) = {
            let mut faults = self.faults.lock();
            (faults.pending_polls, faults.copy_outcome.take())
        };

        let mut job = CopyJob {
            data,
            remaining_polls,
            failure,
            status: CopyStatus::Pending,
        };
        if remaining_polls == 0 {
            self.settle(container, dst, &mut job);
            return Ok(job.status);
        }
        self.copies
            .lock()
            .insert((container.to_string(), dst.to_string()), job);
        Ok(CopyStatus::Pending)
    }

    fn copy_status(&self, container: &str, dst: &str) -> ClientResult<CopyStatus> {
        self.status_polls.fetch_add(1, Ordering::SeqCst);

        let key = (container.to_string(), dst.to_string());
        let mut copies = self.copies.lock();
        let job = copies
            .get_mut(&key)
            .ok_or_else(|| ClientError::NotFound(format!("copy into {container}/{dst}")))?;

        if job.remaining_polls > 0 && job.remaining_polls != u32::MAX {
            job.remaining_polls -= 1;
        }
        if job.remaining_polls > 0 {
            return Ok(CopyStatus::Pending);
        }
        // Settled copies are reported once and forgotten.
        let mut job = copies.remove(&key).ok_or_else(|| {
            ClientError::NotFound(format!("copy into {container}/{dst}"))
        })?;
        drop(copies);
        self.settle(container, dst, &mut job);
        Ok(job.status)
    }

    fn delete_blob(&self, container: &str, blob: &str) -> ClientResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.faults.lock().delete.take() {
            return Err(ClientError::Service(message));
        }

        let mut containers = self.containers.write();
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| ClientError::NotFound(container.to_string()))?;
        blobs
            .remove(blob)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(format!("{container}/{blob}")))
    }
}

impl InMemoryBlobStore {
    fn settle(&self, container: &str, dst: &str, job: &mut CopyJob) {
        let data = std::mem::take(&mut job.data);
        job.status = match job.failure.take() {
            Some(reason) => CopyStatus::Failed(reason),
            None => {
                if let Some(blobs) = self.containers.write().get_mut(container) {
                    blobs.insert(dst.to_string(), data);
                }
                CopyStatus::Success
            }
        };
    }
}
