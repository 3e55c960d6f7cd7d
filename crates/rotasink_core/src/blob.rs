//! Azure-style blob-store backend.

use crate::config::BlobStoreConfig;
use crate::copy::{copy_failed, delete_original, settle_copy, PollPolicy};
use crate::error::{RotateError, RotateResult};
use crate::naming::SegmentNames;
use crate::pump::SegmentPump;
use crate::store::SegmentStore;
use crate::writer::SizeRotateWriter;
use rotasink_client::{BlobStoreClient, UploadOptions};
use std::sync::Arc;
use tracing::info;

/// A rotating writer backed by an Azure-style blob store.
pub type BlobRotateWriter<C> = SizeRotateWriter<BlobSegmentStore<C>>;

/// Segment store streaming each segment as one block-blob upload.
///
/// Server-side copies are asynchronous: finalizing starts a copy of the
/// working blob, polls its status until it settles or the copy timeout
/// passes, and deletes the working blob only after the copy succeeded.
#[derive(Debug)]
pub struct BlobSegmentStore<C> {
    client: Arc<C>,
    container: String,
    names: SegmentNames,
    upload: UploadOptions,
    policy: PollPolicy,
}

impl<C: BlobStoreClient + 'static> BlobSegmentStore<C> {
    /// Prepares the store, creating the container if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::InvalidConfig`] for an invalid configuration,
    /// or [`RotateError::SetupFailed`] if the container cannot be created
    /// for any reason other than already existing.
    pub fn connect(client: Arc<C>, config: &BlobStoreConfig) -> RotateResult<Self> {
        config.validate()?;

        match client.create_container(&config.container, config.provision_timeout) {
            Ok(()) => info!("created container {}", config.container_url()),
            Err(e) if e.is_already_exists() => {
                info!("container {} already exists", config.container_url());
            }
            Err(e) => return Err(RotateError::setup(config.container_url(), e)),
        }

        Ok(Self {
            client,
            container: config.container.clone(),
            names: SegmentNames::new(config.blob_name.clone(), config.extension.clone()),
            upload: UploadOptions {
                buffer_size: config.buffer_size,
                max_buffers: config.max_buffers,
            },
            policy: PollPolicy {
                interval: config.poll_interval,
                deadline: config.copy_timeout,
            },
        })
    }

    /// Returns the container holding the segments.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the names this store derives blob names from.
    pub fn names(&self) -> &SegmentNames {
        &self.names
    }
}

impl<C: BlobStoreClient + 'static> SegmentStore for BlobSegmentStore<C> {
    fn describe(&self) -> String {
        format!("azblob://{}/{}", self.container, self.names.working())
    }

    fn working_name(&self) -> String {
        self.names.working()
    }

    fn open_segment(&self, queue_depth: usize) -> RotateResult<SegmentPump> {
        let blob = self.names.working();
        let client = Arc::clone(&self.client);
        let container = self.container.clone();
        let options = self.upload;

        let sink_blob = blob.clone();
        SegmentPump::spawn(blob, queue_depth, move |reader| {
            client
                .upload_stream(&container, &sink_blob, reader, options)
                .map_err(|e| RotateError::write(&sink_blob, e))
        })
    }

    fn finalize(&self, stamp: u64) -> RotateResult<Option<String>> {
        let from = self.names.working();
        let to = self.names.finalized(stamp);

        let initial = self
            .client
            .start_copy(&self.container, &from, &to)
            .map_err(|e| copy_failed(&from, &to, e))?;
        settle_copy(&from, &to, initial, self.policy, || {
            self.client.copy_status(&self.container, &to)
        })?;
        delete_original(&from, &to, || self.client.delete_blob(&self.container, &from))?;
        Ok(Some(to))
    }

    fn has_leftover(&self) -> RotateResult<bool> {
        let blob = self.names.working();
        self.client
            .blob_size(&self.container, &blob)
            .map(|size| size.is_some_and(|n| n > 0))
            .map_err(|e| RotateError::setup(format!("{}/{}", self.container, blob), e))
    }
}

impl<C: BlobStoreClient + 'static> SizeRotateWriter<BlobSegmentStore<C>> {
    /// Connects a blob-store rotating writer.
    ///
    /// # Errors
    ///
    /// Returns a configuration, setup or create error.
    pub fn connect(client: Arc<C>, config: BlobStoreConfig) -> RotateResult<Self> {
        let store = BlobSegmentStore::connect(client, &config)?;
        Self::new(store, &config.writer)
    }
}
