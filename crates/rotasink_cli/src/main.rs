//! Rotasink CLI
//!
//! Pipes standard input into a size-rotated file.
//!
//! ```text
//! some-daemon | rotasink --path /var/log/daemon.log --threshold 10485760
//! ```

mod error;
mod feed;

use clap::Parser;
use error::CliError;
use feed::FeedMode;
use rotasink_core::{FileConfig, FileRotateWriter};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Writes standard input into files rotated by size.
#[derive(Parser)]
#[command(name = "rotasink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the working file
    #[arg(short, long)]
    path: PathBuf,

    /// Rotate before a file reaches this many bytes
    #[arg(short, long)]
    threshold: usize,

    /// Extension appended to working and rotated files
    #[arg(short, long, default_value = "")]
    extension: String,

    /// Create missing parent directories
    #[arg(long)]
    create_dirs: bool,

    /// Write each input line separately
    #[arg(short, long)]
    line_buffered: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = FileConfig::new(&cli.path, cli.threshold)
        .with_extension(cli.extension)
        .with_create_dirs(cli.create_dirs);
    let writer = FileRotateWriter::open(config)?;

    let mode = if cli.line_buffered {
        FeedMode::Lines
    } else {
        FeedMode::Chunks
    };
    let stats = feed::feed(io::stdin().lock(), &writer, cli.threshold, mode)?;
    writer.close()?;

    info!(
        "wrote {} bytes in {} writes, {} rotations",
        stats.bytes,
        stats.writes,
        writer.finalized_segments().len()
    );
    Ok(())
}
