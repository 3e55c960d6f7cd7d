//! Local file backend.

use crate::config::FileConfig;
use crate::error::{RotateError, RotateResult};
use crate::naming::SegmentNames;
use crate::pump::SegmentPump;
use crate::store::SegmentStore;
use crate::writer::SizeRotateWriter;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A rotating writer backed by local files.
pub type FileRotateWriter = SizeRotateWriter<FileSegmentStore>;

/// Segment store writing to a local file and renaming it on rotation.
///
/// The working segment is `<path><ext>`. Finalizing renames it to
/// `<path>-<nanos><ext>` in the same directory, which is atomic on
/// POSIX filesystems.
#[derive(Debug)]
pub struct FileSegmentStore {
    names: SegmentNames,
}

impl FileSegmentStore {
    /// Prepares the store for `config`, creating parent directories if
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::InvalidConfig`] for an invalid configuration,
    /// or [`RotateError::SetupFailed`] if directories cannot be created.
    pub fn new(config: &FileConfig) -> RotateResult<Self> {
        config.validate()?;
        let base = config
            .path
            .to_str()
            .ok_or_else(|| RotateError::InvalidConfig("path is not valid UTF-8".into()))?;

        if config.create_dirs {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| RotateError::setup(parent.display().to_string(), e))?;
            }
        }

        Ok(Self {
            names: SegmentNames::new(base, config.extension.clone()),
        })
    }

    /// Returns the path of the working segment.
    pub fn working_path(&self) -> PathBuf {
        PathBuf::from(self.names.working())
    }

    /// Returns the names this store derives segment paths from.
    pub fn names(&self) -> &SegmentNames {
        &self.names
    }
}

impl SegmentStore for FileSegmentStore {
    fn describe(&self) -> String {
        format!("file://{}", self.names.working())
    }

    fn working_name(&self) -> String {
        self.names.working()
    }

    fn open_segment(&self, queue_depth: usize) -> RotateResult<SegmentPump> {
        let name = self.names.working();
        let mut file = File::create(&name).map_err(|e| RotateError::create(&name, e))?;

        let sink_name = name.clone();
        SegmentPump::spawn(name, queue_depth, move |reader| {
            let written = io::copy(reader, &mut file).map_err(|e| RotateError::write(&sink_name, e))?;
            file.flush()
                .and_then(|()| file.sync_all())
                .map_err(|e| RotateError::close(&sink_name, e))?;
            Ok(written)
        })
    }

    fn finalize(&self, stamp: u64) -> RotateResult<Option<String>> {
        let from = self.names.working();
        if !Path::new(&from).exists() {
            warn!("working segment {} vanished before rotation", from);
            return Ok(None);
        }

        let to = self.names.finalized(stamp);
        fs::rename(&from, &to).map_err(|source| RotateError::RenameFailed {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        Ok(Some(to))
    }

    fn has_leftover(&self) -> RotateResult<bool> {
        match fs::metadata(self.names.working()) {
            Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RotateError::setup(self.names.working(), e)),
        }
    }
}

impl SizeRotateWriter<FileSegmentStore> {
    /// Opens a file-backed rotating writer.
    ///
    /// # Errors
    ///
    /// Returns a configuration, setup or create error.
    pub fn open(config: FileConfig) -> RotateResult<Self> {
        let store = FileSegmentStore::new(&config)?;
        Self::new(store, &config.writer)
    }
}
