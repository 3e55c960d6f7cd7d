//! S3-style object-store backend.

use crate::config::ObjectStoreConfig;
use crate::copy::{copy_failed, delete_original};
use crate::error::{RotateError, RotateResult};
use crate::naming::SegmentNames;
use crate::pump::SegmentPump;
use crate::store::SegmentStore;
use crate::writer::SizeRotateWriter;
use rotasink_client::ObjectStoreClient;
use std::sync::Arc;
use tracing::info;

/// A rotating writer backed by an S3-style object store.
pub type ObjectRotateWriter<C> = SizeRotateWriter<ObjectSegmentStore<C>>;

/// Segment store streaming each segment as one object upload.
///
/// The store has no rename, so finalizing copies the working key to its
/// timestamped key server-side and then deletes the working key. The copy
/// is only issued after the segment's upload has completed.
#[derive(Debug)]
pub struct ObjectSegmentStore<C> {
    client: Arc<C>,
    bucket: String,
    content_type: String,
    names: SegmentNames,
}

impl<C: ObjectStoreClient + 'static> ObjectSegmentStore<C> {
    /// Prepares the store, creating the bucket if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::InvalidConfig`] for an invalid configuration,
    /// or [`RotateError::SetupFailed`] if the bucket neither exists nor can
    /// be created.
    pub fn connect(client: Arc<C>, config: &ObjectStoreConfig) -> RotateResult<Self> {
        config.validate()?;

        if let Err(make_err) = client.make_bucket(&config.bucket, &config.location) {
            match client.bucket_exists(&config.bucket) {
                Ok(true) => info!("bucket {} already exists", config.bucket),
                Ok(false) => return Err(RotateError::setup(&config.bucket, make_err)),
                Err(e) => return Err(RotateError::setup(&config.bucket, e)),
            }
        } else {
            info!(
                "created bucket {} at {} in {:?}",
                config.bucket,
                config.endpoint_url(),
                config.location
            );
        }

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            content_type: config.content_type.clone(),
            names: SegmentNames::new(config.object_name.clone(), config.extension.clone()),
        })
    }

    /// Returns the bucket holding the segments.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the names this store derives object keys from.
    pub fn names(&self) -> &SegmentNames {
        &self.names
    }
}

impl<C: ObjectStoreClient + 'static> SegmentStore for ObjectSegmentStore<C> {
    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.names.working())
    }

    fn working_name(&self) -> String {
        self.names.working()
    }

    fn open_segment(&self, queue_depth: usize) -> RotateResult<SegmentPump> {
        let key = self.names.working();
        let client = Arc::clone(&self.client);
        let bucket = self.bucket.clone();
        let content_type = self.content_type.clone();

        let sink_key = key.clone();
        SegmentPump::spawn(key, queue_depth, move |reader| {
            client
                .put_object(&bucket, &sink_key, reader, &content_type)
                .map_err(|e| RotateError::write(&sink_key, e))
        })
    }

    fn finalize(&self, stamp: u64) -> RotateResult<Option<String>> {
        let from = self.names.working();
        let to = self.names.finalized(stamp);

        // Object copies settle before the call returns: there is no
        // pending state to poll.
        self.client
            .copy_object(&self.bucket, &from, &to)
            .map_err(|e| copy_failed(&from, &to, e))?;
        delete_original(&from, &to, || self.client.delete_object(&self.bucket, &from))?;
        Ok(Some(to))
    }

    fn has_leftover(&self) -> RotateResult<bool> {
        let key = self.names.working();
        self.client
            .object_size(&self.bucket, &key)
            .map(|size| size.is_some_and(|n| n > 0))
            .map_err(|e| RotateError::setup(format!("{}/{}", self.bucket, key), e))
    }
}

impl<C: ObjectStoreClient + 'static> SizeRotateWriter<ObjectSegmentStore<C>> {
    /// Connects an object-store rotating writer.
    ///
    /// # Errors
    ///
    /// Returns a configuration, setup or create error.
    pub fn connect(client: Arc<C>, config: ObjectStoreConfig) -> RotateResult<Self> {
        let store = ObjectSegmentStore::connect(client, &config)?;
        Self::new(store, &config.writer)
    }
}
