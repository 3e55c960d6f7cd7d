//! CLI error type.

use rotasink_core::RotateError;
use std::io;
use thiserror::Error;

/// Errors that end a `rotasink` run.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading standard input failed.
    #[error("failed to read input: {0}")]
    Input(#[from] io::Error),

    /// The rotating writer failed.
    #[error(transparent)]
    Rotate(#[from] RotateError),
}
