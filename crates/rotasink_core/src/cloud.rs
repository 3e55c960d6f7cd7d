//! Writers over real S3 and Azure services.

use crate::blob::BlobRotateWriter;
use crate::config::{BlobStoreConfig, ObjectStoreConfig};
use crate::error::{RotateError, RotateResult};
use crate::object::ObjectRotateWriter;
use rotasink_client::{AzureBlobStore, S3ObjectStore};
use std::sync::Arc;

impl ObjectStoreConfig {
    /// Builds a client for the configured endpoint, bucket and location.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::SetupFailed`] if the client cannot be built.
    pub fn build_client(&self) -> RotateResult<S3ObjectStore> {
        S3ObjectStore::connect(&self.endpoint_url(), &self.bucket, &self.location)
            .map_err(|e| RotateError::setup(self.endpoint_url(), e))
    }
}

impl BlobStoreConfig {
    /// Builds a client for the configured account, container and endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::SetupFailed`] if the client cannot be built.
    pub fn build_client(&self) -> RotateResult<AzureBlobStore> {
        AzureBlobStore::connect(
            &self.storage_account,
            &self.container,
            self.endpoint.as_deref(),
        )
        .map_err(|e| RotateError::setup(self.container_url(), e))
    }
}

impl ObjectRotateWriter<S3ObjectStore> {
    /// Connects to the S3-compatible service `config` describes.
    ///
    /// # Errors
    ///
    /// Returns a configuration, setup or create error.
    pub fn connect_remote(config: ObjectStoreConfig) -> RotateResult<Self> {
        config.validate()?;
        let client = Arc::new(config.build_client()?);
        Self::connect(client, config)
    }
}

impl BlobRotateWriter<AzureBlobStore> {
    /// Connects to the Azure container `config` describes.
    ///
    /// # Errors
    ///
    /// Returns a configuration, setup or create error.
    pub fn connect_remote(config: BlobStoreConfig) -> RotateResult<Self> {
        config.validate()?;
        let client = Arc::new(config.build_client()?);
        Self::connect(client, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SegmentStore;
    use crate::{BlobSegmentStore, ObjectSegmentStore, SizeRotateWriter};
    use object_store::memory::InMemory;
    use rotasink_client::{BlobStoreClient, ObjectStoreClient};
    use std::time::Duration;

    #[test]
    fn object_writer_over_object_store() {
        let client =
            Arc::new(S3ObjectStore::with_store("logs", Arc::new(InMemory::new())).unwrap());
        let config = ObjectStoreConfig::new("localhost:9000", "logs", "app", 14);
        let store = ObjectSegmentStore::connect(Arc::clone(&client), &config).unwrap();
        let writer = SizeRotateWriter::new(store, &config.writer).unwrap();

        writer.write(b"Hello World 1").unwrap();
        writer.write(b"Hello World 2").unwrap();
        writer.close().unwrap();

        let finalized = writer.finalized_segments();
        assert_eq!(finalized.len(), 1);
        assert_eq!(client.object_size("logs", &finalized[0]).unwrap(), Some(13));
        assert_eq!(client.object_size("logs", "app").unwrap(), Some(13));
    }

    #[test]
    fn blob_writer_over_object_store() {
        let client =
            Arc::new(AzureBlobStore::with_store("segments", Arc::new(InMemory::new())).unwrap());
        let config = BlobStoreConfig::new("devaccount", "segments", "app", 14)
            .with_extension(".log")
            .with_poll_interval(Duration::from_millis(1));
        let store = BlobSegmentStore::connect(Arc::clone(&client), &config).unwrap();
        assert_eq!(store.describe(), "azblob://segments/app.log");
        let writer = SizeRotateWriter::new(store, &config.writer).unwrap();

        writer.write(b"Hello World 1").unwrap();
        writer.rotate().unwrap();
        writer.close().unwrap();

        let finalized = writer.finalized_segments();
        assert_eq!(client.blob_size("segments", &finalized[0]).unwrap(), Some(13));
        assert_eq!(client.blob_size("segments", "app.log").unwrap(), Some(0));
    }

    #[test]
    fn s3_client_is_built_from_the_config() {
        let config = ObjectStoreConfig::new("localhost:9000", "logs", "app", 14)
            .with_location("eu-central-1");
        assert!(config.build_client().is_ok());
    }
}
