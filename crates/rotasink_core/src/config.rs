//! Configuration for rotating writers.
//!
//! Every backend configuration embeds a [`WriterConfig`] carrying the
//! rotation threshold and the pump queue depth. Configurations are plain
//! structs with `with_*` builders; they also deserialize (durations are
//! given in milliseconds) so embedding applications can load them from a
//! document.

use crate::error::{RotateError, RotateResult};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of queued writes a segment pump buffers.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default blob-store endpoint suffix.
pub const DEFAULT_BLOB_ENDPOINT: &str = "blob.core.windows.net";

/// Settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WriterConfig {
    /// Segment size in bytes that triggers a rotation.
    pub rotation_threshold: usize,
    /// Writes buffered between the caller and the segment pump before
    /// `write` blocks.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl WriterConfig {
    /// Creates a configuration rotating at `rotation_threshold` bytes.
    pub fn new(rotation_threshold: usize) -> Self {
        Self {
            rotation_threshold,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Sets the pump queue depth.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::InvalidConfig`] if the threshold or the queue
    /// depth is zero.
    pub fn validate(&self) -> RotateResult<()> {
        if self.rotation_threshold == 0 {
            return Err(RotateError::InvalidConfig(
                "rotation threshold must be positive".into(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(RotateError::InvalidConfig(
                "queue depth must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the local file backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    /// Path of the working file, without extension.
    pub path: PathBuf,
    /// Extension appended to working and finalized names.
    #[serde(default)]
    pub extension: String,
    /// Create missing parent directories when the writer opens.
    #[serde(default)]
    pub create_dirs: bool,
    /// Rotation settings.
    #[serde(flatten)]
    pub writer: WriterConfig,
}

impl FileConfig {
    /// Creates a configuration writing to `path`.
    pub fn new(path: impl Into<PathBuf>, rotation_threshold: usize) -> Self {
        Self {
            path: path.into(),
            extension: String::new(),
            create_dirs: false,
            writer: WriterConfig::new(rotation_threshold),
        }
    }

    /// Sets the extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Creates missing parent directories on open.
    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    /// Sets the pump queue depth.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.writer.queue_depth = depth;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::InvalidConfig`] if the path has no file name
    /// or is not valid UTF-8, or the rotation settings are invalid.
    pub fn validate(&self) -> RotateResult<()> {
        self.writer.validate()?;
        if self.path.file_name().is_none() {
            return Err(RotateError::InvalidConfig(format!(
                "{} does not name a file",
                self.path.display()
            )));
        }
        if self.path.to_str().is_none() {
            return Err(RotateError::InvalidConfig(format!(
                "{} is not valid UTF-8",
                self.path.display()
            )));
        }
        Ok(())
    }
}

/// Configuration for the S3-style object-store backend.
///
/// Credentials are not part of this configuration: they belong to the
/// [`rotasink_client::ObjectStoreClient`] the writer is given.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectStoreConfig {
    /// Service endpoint, `host[:port]`.
    pub endpoint: String,
    /// Whether the endpoint is reached over TLS.
    #[serde(default)]
    pub use_ssl: bool,
    /// Bucket holding the segments.
    pub bucket: String,
    /// Object key of the working segment, without extension.
    pub object_name: String,
    /// Extension appended to working and finalized keys.
    #[serde(default)]
    pub extension: String,
    /// Region the bucket is created in.
    #[serde(default)]
    pub location: String,
    /// Content type of uploaded segments.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Rotation settings.
    #[serde(flatten)]
    pub writer: WriterConfig,
}

impl ObjectStoreConfig {
    /// Creates a configuration for `bucket/object_name` on `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        object_name: impl Into<String>,
        rotation_threshold: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            use_ssl: false,
            bucket: bucket.into(),
            object_name: object_name.into(),
            extension: String::new(),
            location: String::new(),
            content_type: default_content_type(),
            writer: WriterConfig::new(rotation_threshold),
        }
    }

    /// Sets the extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the bucket location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Enables or disables TLS.
    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Sets the content type of uploaded segments.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Sets the pump queue depth.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.writer.queue_depth = depth;
        self
    }

    /// Returns the endpoint as a URL.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint)
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::InvalidConfig`] if the bucket or object name is
    /// empty, or the rotation settings are invalid.
    pub fn validate(&self) -> RotateResult<()> {
        self.writer.validate()?;
        if self.bucket.is_empty() {
            return Err(RotateError::InvalidConfig("bucket name is empty".into()));
        }
        if self.object_name.is_empty() {
            return Err(RotateError::InvalidConfig("object name is empty".into()));
        }
        Ok(())
    }
}

/// Configuration for the Azure-style blob-store backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlobStoreConfig {
    /// Storage account name.
    pub storage_account: String,
    /// Container holding the segments.
    pub container: String,
    /// Blob name of the working segment, without extension.
    pub blob_name: String,
    /// Extension appended to working and finalized names.
    #[serde(default)]
    pub extension: String,
    /// Custom endpoint (an emulator, say). `None` uses the public cloud.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Interval between copy-status polls.
    #[serde(default = "default_poll_interval", deserialize_with = "millis")]
    pub poll_interval: Duration,
    /// Longest a rotation waits for a server-side copy to settle.
    #[serde(default = "default_copy_timeout", deserialize_with = "millis")]
    pub copy_timeout: Duration,
    /// Deadline for creating the container.
    #[serde(default = "default_provision_timeout", deserialize_with = "millis")]
    pub provision_timeout: Duration,
    /// Size of each staged upload block.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Number of blocks staged concurrently.
    #[serde(default = "default_max_buffers")]
    pub max_buffers: usize,
    /// Rotation settings.
    #[serde(flatten)]
    pub writer: WriterConfig,
}

impl BlobStoreConfig {
    /// Creates a configuration for `container/blob_name` in `storage_account`.
    pub fn new(
        storage_account: impl Into<String>,
        container: impl Into<String>,
        blob_name: impl Into<String>,
        rotation_threshold: usize,
    ) -> Self {
        Self {
            storage_account: storage_account.into(),
            container: container.into(),
            blob_name: blob_name.into(),
            extension: String::new(),
            endpoint: None,
            poll_interval: default_poll_interval(),
            copy_timeout: default_copy_timeout(),
            provision_timeout: default_provision_timeout(),
            buffer_size: default_buffer_size(),
            max_buffers: default_max_buffers(),
            writer: WriterConfig::new(rotation_threshold),
        }
    }

    /// Sets the extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Uses a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the copy-status poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the deadline for a server-side copy.
    pub fn with_copy_timeout(mut self, timeout: Duration) -> Self {
        self.copy_timeout = timeout;
        self
    }

    /// Sets the deadline for creating the container.
    pub fn with_provision_timeout(mut self, timeout: Duration) -> Self {
        self.provision_timeout = timeout;
        self
    }

    /// Sets the upload block size and the number of concurrent blocks.
    pub fn with_upload_buffers(mut self, buffer_size: usize, max_buffers: usize) -> Self {
        self.buffer_size = buffer_size;
        self.max_buffers = max_buffers;
        self
    }

    /// Sets the pump queue depth.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.writer.queue_depth = depth;
        self
    }

    /// Returns the container URL.
    ///
    /// The public cloud is addressed as
    /// `https://<account>.blob.core.windows.net/<container>`; a custom
    /// endpoint uses path-style `http://<endpoint>/<account>/<container>`.
    pub fn container_url(&self) -> String {
        match &self.endpoint {
            None => format!(
                "https://{}.{}/{}",
                self.storage_account, DEFAULT_BLOB_ENDPOINT, self.container
            ),
            Some(endpoint) => format!(
                "http://{}/{}/{}",
                endpoint, self.storage_account, self.container
            ),
        }
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::InvalidConfig`] if a name is empty, a buffer
    /// setting or the copy timeout is zero, or the rotation settings are
    /// invalid.
    pub fn validate(&self) -> RotateResult<()> {
        self.writer.validate()?;
        if self.storage_account.is_empty() {
            return Err(RotateError::InvalidConfig("storage account is empty".into()));
        }
        if self.container.is_empty() {
            return Err(RotateError::InvalidConfig("container name is empty".into()));
        }
        if self.blob_name.is_empty() {
            return Err(RotateError::InvalidConfig("blob name is empty".into()));
        }
        if self.buffer_size == 0 || self.max_buffers == 0 {
            return Err(RotateError::InvalidConfig(
                "upload buffer size and count must be positive".into(),
            ));
        }
        if self.copy_timeout.is_zero() {
            return Err(RotateError::InvalidConfig(
                "copy timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_copy_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_provision_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_buffer_size() -> usize {
    2 * 1024 * 1024
}

fn default_max_buffers() -> usize {
    3
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
