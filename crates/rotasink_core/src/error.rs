//! Error types for rotating writers.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Boxed underlying cause of a backend failure.
pub type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for rotating writer operations.
pub type RotateResult<T> = Result<T, RotateError>;

/// Errors produced by a rotating writer.
#[derive(Debug, Error)]
pub enum RotateError {
    /// A single write is larger than a whole segment.
    #[error("payload of {len} bytes exceeds rotation threshold of {threshold} bytes, increase the threshold")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Configured rotation threshold.
        threshold: usize,
    },

    /// The writer configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Provisioning the destination (directory, bucket, container) failed.
    #[error("unable to provision {target}: {source}")]
    SetupFailed {
        /// The destination being provisioned.
        target: String,
        /// Underlying cause.
        #[source]
        source: Source,
    },

    /// A fresh working segment could not be created.
    #[error("error creating segment {segment}: {source}")]
    CreateFailed {
        /// Working name of the segment.
        segment: String,
        /// Underlying cause.
        #[source]
        source: Source,
    },

    /// Persisting bytes of the open segment failed.
    #[error("error writing segment {segment}: {source}")]
    WriteFailed {
        /// Working name of the segment.
        segment: String,
        /// Underlying cause.
        #[source]
        source: Source,
    },

    /// The open segment could not be drained and closed.
    #[error("error closing segment {segment}: {source}")]
    CloseFailed {
        /// Working name of the segment.
        segment: String,
        /// Underlying cause.
        #[source]
        source: Source,
    },

    /// Renaming a closed file segment to its finalized name failed.
    #[error("error renaming {from} to {to}: {source}")]
    RenameFailed {
        /// Working path.
        from: String,
        /// Finalized path.
        to: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Copying a closed segment to its finalized name failed.
    #[error("copy error unable to rotate {from} to {to}: {source}")]
    CopyFailed {
        /// Working name.
        from: String,
        /// Finalized name.
        to: String,
        /// Underlying cause.
        #[source]
        source: Source,
    },

    /// The segment was copied but the working copy could not be removed.
    #[error("copy error unable to rename / remove {segment} (copied to {copied_to}): {source}")]
    RemoveFailed {
        /// Working name that is still present.
        segment: String,
        /// Finalized name that now holds a duplicate.
        copied_to: String,
        /// Underlying cause.
        #[source]
        source: Source,
    },

    /// A server-side copy did not settle before the deadline.
    #[error("copy of {from} to {to} still pending after {waited:?}")]
    RotationTimedOut {
        /// Working name.
        from: String,
        /// Finalized name.
        to: String,
        /// How long the copy was polled.
        waited: Duration,
    },

    /// An earlier failure left the writer unusable.
    #[error("writer failed earlier and must be reconstructed")]
    Poisoned,

    /// The writer has been closed.
    #[error("writer is closed")]
    Closed,
}

/// Broad category of a [`RotateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was invalid.
    Validation,
    /// The configuration was invalid.
    Config,
    /// The destination could not be provisioned.
    Setup,
    /// Bytes could not be persisted.
    Persistence,
    /// Rotation of a completed segment failed.
    Rotation,
    /// The writer is closed or poisoned.
    State,
}

/// Phase of a rotation in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    /// Draining and closing the open segment.
    Close,
    /// Giving the segment its finalized name (rename or copy).
    Copy,
    /// Removing the working copy after a successful copy.
    Delete,
}

impl RotateError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RotateError::PayloadTooLarge { .. } => ErrorKind::Validation,
            RotateError::InvalidConfig(_) => ErrorKind::Config,
            RotateError::SetupFailed { .. } => ErrorKind::Setup,
            RotateError::CreateFailed { .. } | RotateError::WriteFailed { .. } => {
                ErrorKind::Persistence
            }
            RotateError::CloseFailed { .. }
            | RotateError::RenameFailed { .. }
            | RotateError::CopyFailed { .. }
            | RotateError::RemoveFailed { .. }
            | RotateError::RotationTimedOut { .. } => ErrorKind::Rotation,
            RotateError::Poisoned | RotateError::Closed => ErrorKind::State,
        }
    }

    /// Returns the rotation phase that failed, if this is a rotation error.
    pub fn rotation_phase(&self) -> Option<RotationPhase> {
        match self {
            RotateError::CloseFailed { .. } => Some(RotationPhase::Close),
            RotateError::RenameFailed { .. }
            | RotateError::CopyFailed { .. }
            | RotateError::RotationTimedOut { .. } => Some(RotationPhase::Copy),
            RotateError::RemoveFailed { .. } => Some(RotationPhase::Delete),
            _ => None,
        }
    }

    /// Returns true if the old segment may now exist under two names.
    ///
    /// A timed-out copy counts: the service may still complete it.
    pub fn may_leave_duplicate(&self) -> bool {
        matches!(
            self,
            RotateError::RemoveFailed { .. } | RotateError::RotationTimedOut { .. }
        )
    }

    pub(crate) fn create(segment: &str, source: impl Into<Source>) -> Self {
        RotateError::CreateFailed {
            segment: segment.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn write(segment: &str, source: impl Into<Source>) -> Self {
        RotateError::WriteFailed {
            segment: segment.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn close(segment: &str, source: impl Into<Source>) -> Self {
        RotateError::CloseFailed {
            segment: segment.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn setup(target: impl Into<String>, source: impl Into<Source>) -> Self {
        RotateError::SetupFailed {
            target: target.into(),
            source: source.into(),
        }
    }
}

impl From<RotateError> for io::Error {
    fn from(err: RotateError) -> Self {
        let kind = match &err {
            RotateError::PayloadTooLarge { .. } | RotateError::InvalidConfig(_) => {
                io::ErrorKind::InvalidInput
            }
            RotateError::Closed => io::ErrorKind::BrokenPipe,
            RotateError::RotationTimedOut { .. } => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        let err = RotateError::PayloadTooLarge {
            len: 20,
            threshold: 14,
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.rotation_phase(), None);

        assert_eq!(RotateError::Closed.kind(), ErrorKind::State);
        assert_eq!(RotateError::Poisoned.kind(), ErrorKind::State);
        assert_eq!(
            RotateError::write("app.log", "disk full").kind(),
            ErrorKind::Persistence
        );
    }

    #[test]
    fn rotation_phases() {
        let close = RotateError::close("app.log", "upload aborted");
        assert_eq!(close.rotation_phase(), Some(RotationPhase::Close));
        assert!(!close.may_leave_duplicate());

        let copy = RotateError::CopyFailed {
            from: "app.log".into(),
            to: "app-1.log".into(),
            source: "denied".into(),
        };
        assert_eq!(copy.rotation_phase(), Some(RotationPhase::Copy));
        assert!(!copy.may_leave_duplicate());

        let remove = RotateError::RemoveFailed {
            segment: "app.log".into(),
            copied_to: "app-1.log".into(),
            source: "denied".into(),
        };
        assert_eq!(remove.rotation_phase(), Some(RotationPhase::Delete));
        assert!(remove.may_leave_duplicate());

        let timed_out = RotateError::RotationTimedOut {
            from: "app".into(),
            to: "app-1".into(),
            waited: Duration::from_secs(60),
        };
        assert_eq!(timed_out.kind(), ErrorKind::Rotation);
        assert!(timed_out.may_leave_duplicate());
    }

    #[test]
    fn error_display() {
        let err = RotateError::PayloadTooLarge {
            len: 20,
            threshold: 14,
        };
        assert!(err.to_string().contains("20"));
        assert!(err.to_string().contains("14"));

        let err = RotateError::RemoveFailed {
            segment: "app".into(),
            copied_to: "app-1".into(),
            source: "denied".into(),
        };
        assert!(err.to_string().contains("unable to rename / remove"));
    }

    #[test]
    fn converts_into_io_error() {
        let err: io::Error = RotateError::PayloadTooLarge {
            len: 2,
            threshold: 1,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err: io::Error = RotateError::Closed.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        let inner = err.into_inner().unwrap();
        assert!(inner.downcast_ref::<RotateError>().is_some());
    }
}
