//! Clients for real S3-compatible and Azure blob services.
//!
//! Both clients sit on the `object_store` crate and are bound to a single
//! bucket or container. Its async API is driven from a small private tokio
//! runtime, so the clients can be called from any plain thread, the
//! writer's pump threads included.
//!
//! Credentials are read from the environment the way `object_store` reads
//! them (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
//! `AZURE_STORAGE_ACCOUNT_KEY`, ...).
//!
//! `object_store` cannot create buckets or containers. Provisioning through
//! these clients only checks that the namespace is reachable and reports it
//! as already existing; a missing one must be created out of band.

use crate::blob_store::{BlobStoreClient, CopyStatus, UploadOptions};
use crate::error::{ClientError, ClientResult};
use crate::object_store::ObjectStoreClient;
use ::object_store::aws::AmazonS3Builder;
use ::object_store::azure::MicrosoftAzureBuilder;
use ::object_store::path::Path;
use ::object_store::{
    Attribute, Attributes, ObjectStore, PutMultipartOpts, PutOptions, PutPayload, WriteMultipart,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Smallest part S3 accepts in a multipart upload, except the last one.
pub const S3_MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Parts of one S3 upload kept in flight at once.
const S3_MAX_CONCURRENCY: usize = 4;

/// One bucket or container of an `object_store` backend.
#[derive(Debug)]
struct Remote {
    store: Arc<dyn ObjectStore>,
    namespace: String,
    runtime: Runtime,
}

impl Remote {
    fn new(namespace: &str, store: Arc<dyn ObjectStore>) -> ClientResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("rotasink-client")
            .enable_all()
            .build()?;
        Ok(Self {
            store,
            namespace: namespace.to_string(),
            runtime,
        })
    }

    fn check(&self, namespace: &str) -> ClientResult<()> {
        if namespace == self.namespace {
            Ok(())
        } else {
            Err(ClientError::NotFound(format!(
                "{namespace} (client is bound to {})",
                self.namespace
            )))
        }
    }

    /// Lists the top level of the namespace.
    fn probe(&self, deadline: Option<Duration>) -> ClientResult<()> {
        let listing = self.store.list_with_delimiter(None);
        let result = match deadline {
            Some(deadline) => self
                .runtime
                .block_on(tokio::time::timeout(deadline, listing))
                .map_err(|_| {
                    ClientError::service(format!(
                        "{} did not answer within {:?}",
                        self.namespace, deadline
                    ))
                })?,
            None => self.runtime.block_on(listing),
        };
        result.map(|_| ()).map_err(client_error)
    }

    /// Reports a reachable namespace as already existing.
    fn provision(&self, deadline: Option<Duration>) -> ClientResult<()> {
        match self.probe(deadline) {
            Ok(()) => Err(ClientError::AlreadyExists(self.namespace.clone())),
            Err(e) => Err(ClientError::service(format!(
                "{} is not reachable and cannot be created by this client: {e}",
                self.namespace
            ))),
        }
    }

    fn exists(&self) -> ClientResult<bool> {
        match self.probe(None) {
            Ok(()) => Ok(true),
            Err(ClientError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn size(&self, name: &str) -> ClientResult<Option<u64>> {
        match self.runtime.block_on(self.store.head(&Path::from(name))) {
            Ok(meta) => Ok(Some(meta.size as u64)),
            Err(::object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(client_error(e)),
        }
    }

    /// Streams `body` into `name`.
    ///
    /// A body shorter than one part goes up in a single request; anything
    /// longer becomes a multipart upload with `concurrency` parts in flight.
    /// The object only becomes visible once the whole body has been read.
    fn upload(
        &self,
        name: &str,
        body: &mut dyn Read,
        part_size: usize,
        concurrency: usize,
        attributes: Attributes,
    ) -> ClientResult<u64> {
        let path = Path::from(name);
        let part_size = part_size.max(1);

        let mut part = vec![0u8; part_size];
        let filled = fill(body, &mut part)?;
        if filled < part_size {
            part.truncate(filled);
            let opts = PutOptions {
                attributes,
                ..Default::default()
            };
            self.runtime
                .block_on(self.store.put_opts(&path, PutPayload::from(part), opts))
                .map_err(client_error)?;
            debug!("uploaded {} ({} bytes, single request)", name, filled);
            return Ok(filled as u64);
        }

        let opts = PutMultipartOpts {
            attributes,
            ..Default::default()
        };
        let upload = self
            .runtime
            .block_on(self.store.put_multipart_opts(&path, opts))
            .map_err(client_error)?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, part_size);
        let mut total = 0u64;
        let mut n = filled;
        while n > 0 {
            if let Err(e) = self.runtime.block_on(writer.wait_for_capacity(concurrency)) {
                let _ = self.runtime.block_on(writer.abort());
                return Err(client_error(e));
            }
            {
                // Parts are spawned onto the runtime.
                let _enter = self.runtime.enter();
                writer.write(&part[..n]);
            }
            total += n as u64;

            n = match fill(body, &mut part) {
                Ok(n) => n,
                Err(e) => {
                    let _ = self.runtime.block_on(writer.abort());
                    return Err(e.into());
                }
            };
        }
        self.runtime
            .block_on(writer.finish())
            .map_err(client_error)?;
        debug!("uploaded {} ({} bytes, multipart)", name, total);
        Ok(total)
    }

    fn copy(&self, src: &str, dst: &str) -> ClientResult<()> {
        self.runtime
            .block_on(self.store.copy(&Path::from(src), &Path::from(dst)))
            .map_err(client_error)
    }

    fn delete(&self, name: &str) -> ClientResult<()> {
        self.runtime
            .block_on(self.store.delete(&Path::from(name)))
            .map_err(client_error)
    }
}

/// Reads until `buf` is full or the body ends.
fn fill(body: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match body.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn client_error(err: ::object_store::Error) -> ClientError {
    match err {
        ::object_store::Error::NotFound { path, .. } => ClientError::NotFound(path),
        ::object_store::Error::AlreadyExists { path, .. } => ClientError::AlreadyExists(path),
        other => ClientError::Service(other.to_string()),
    }
}

/// An S3-compatible service (AWS, MinIO, ...) reached through `object_store`.
///
/// # Example
///
/// ```no_run
/// use rotasink_client::{ObjectStoreClient, S3ObjectStore};
///
/// let client = S3ObjectStore::connect("http://localhost:9000", "logs", "us-east-1").unwrap();
/// assert!(client.bucket_exists("logs").unwrap());
/// ```
#[derive(Debug)]
pub struct S3ObjectStore {
    remote: Remote,
    part_size: usize,
}

impl S3ObjectStore {
    /// Connects to `bucket` behind `endpoint_url`.
    ///
    /// Plain `http://` endpoints are allowed. An empty `region` leaves the
    /// region to the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be configured.
    pub fn connect(endpoint_url: &str, bucket: &str, region: &str) -> ClientResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_endpoint(endpoint_url)
            .with_allow_http(endpoint_url.starts_with("http://"))
            .with_bucket_name(bucket);
        if !region.is_empty() {
            builder = builder.with_region(region);
        }
        let store = builder.build().map_err(client_error)?;
        Self::with_store(bucket, Arc::new(store))
    }

    /// Wraps an already configured store serving `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client runtime cannot be started.
    pub fn with_store(bucket: &str, store: Arc<dyn ObjectStore>) -> ClientResult<Self> {
        Ok(Self {
            remote: Remote::new(bucket, store)?,
            part_size: S3_MIN_PART_SIZE,
        })
    }

    /// Sets the multipart part size. S3 rejects parts below
    /// [`S3_MIN_PART_SIZE`] except for the last one.
    #[must_use]
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }
}

impl ObjectStoreClient for S3ObjectStore {
    fn make_bucket(&self, bucket: &str, _location: &str) -> ClientResult<()> {
        self.remote.check(bucket)?;
        self.remote.provision(None)
    }

    fn bucket_exists(&self, bucket: &str) -> ClientResult<bool> {
        self.remote.check(bucket)?;
        self.remote.exists()
    }

    fn object_size(&self, bucket: &str, key: &str) -> ClientResult<Option<u64>> {
        self.remote.check(bucket)?;
        self.remote.size(key)
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        content_type: &str,
    ) -> ClientResult<u64> {
        self.remote.check(bucket)?;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        self.remote
            .upload(key, body, self.part_size, S3_MAX_CONCURRENCY, attributes)
    }

    fn copy_object(&self, bucket: &str, src: &str, dst: &str) -> ClientResult<()> {
        self.remote.check(bucket)?;
        self.remote.copy(src, dst)
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.remote.check(bucket)?;
        self.remote.delete(key)
    }
}

/// An Azure blob container reached through `object_store`.
///
/// `object_store` does not expose the service's copy status, so a copy
/// counts as settled once the destination has the source's size.
#[derive(Debug)]
pub struct AzureBlobStore {
    remote: Remote,
    copies: Mutex<HashMap<String, u64>>,
}

impl AzureBlobStore {
    /// Connects to `container` in `account`.
    ///
    /// `endpoint` addresses an emulator or private endpoint path-style, as
    /// `http://<endpoint>/<account>`; `None` uses the public cloud.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be configured.
    pub fn connect(account: &str, container: &str, endpoint: Option<&str>) -> ClientResult<Self> {
        let mut builder = MicrosoftAzureBuilder::from_env()
            .with_account(account)
            .with_container_name(container);
        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(format!("http://{endpoint}/{account}"))
                .with_allow_http(true);
        }
        let store = builder.build().map_err(client_error)?;
        Self::with_store(container, Arc::new(store))
    }

    /// Wraps an already configured store serving `container`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client runtime cannot be started.
    pub fn with_store(container: &str, store: Arc<dyn ObjectStore>) -> ClientResult<Self> {
        Ok(Self {
            remote: Remote::new(container, store)?,
            copies: Mutex::new(HashMap::new()),
        })
    }

    fn progress(&self, dst: &str) -> ClientResult<CopyStatus> {
        let Some(expected) = self.copies.lock().get(dst).copied() else {
            return Err(ClientError::NotFound(format!("copy into {dst}")));
        };
        let status = match self.remote.size(dst)? {
            Some(size) if size == expected => CopyStatus::Success,
            Some(size) if size > expected => {
                CopyStatus::Failed(format!("{dst} holds {size} bytes, expected {expected}"))
            }
            _ => CopyStatus::Pending,
        };
        if status.is_terminal() {
            self.copies.lock().remove(dst);
        }
        Ok(status)
    }
}

impl BlobStoreClient for AzureBlobStore {
    fn create_container(&self, container: &str, deadline: Duration) -> ClientResult<()> {
        self.remote.check(container)?;
        self.remote.provision(Some(deadline))
    }

    fn blob_size(&self, container: &str, blob: &str) -> ClientResult<Option<u64>> {
        self.remote.check(container)?;
        self.remote.size(blob)
    }

    fn upload_stream(
        &self,
        container: &str,
        blob: &str,
        body: &mut dyn Read,
        options: UploadOptions,
    ) -> ClientResult<u64> {
        self.remote.check(container)?;
        self.remote.upload(
            blob,
            body,
            options.buffer_size,
            options.max_buffers.max(1),
            Attributes::new(),
        )
    }

    fn start_copy(&self, container: &str, src: &str, dst: &str) -> ClientResult<CopyStatus> {
        self.remote.check(container)?;
        let size = self
            .remote
            .size(src)?
            .ok_or_else(|| ClientError::NotFound(format!("{container}/{src}")))?;
        self.remote.copy(src, dst)?;
        self.copies.lock().insert(dst.to_string(), size);
        self.progress(dst)
    }

    fn copy_status(&self, container: &str, dst: &str) -> ClientResult<CopyStatus> {
        self.remote.check(container)?;
        self.progress(dst)
    }

    fn delete_blob(&self, container: &str, blob: &str) -> ClientResult<()> {
        self.remote.check(container)?;
        self.remote.delete(blob)
    }
}
