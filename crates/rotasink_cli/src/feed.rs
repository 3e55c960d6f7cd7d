//! Feeding an input stream into a rotating writer.

use crate::error::CliError;
use rotasink_core::RotateWriter;
use std::io::{BufRead, ErrorKind, Read};
use tracing::debug;

/// How input is cut into writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Fixed-size chunks, regardless of content.
    Chunks,
    /// One write per line. Lines too long for one write are split.
    Lines,
}

/// Totals of one feed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    /// Bytes written.
    pub bytes: u64,
    /// Write calls issued.
    pub writes: u64,
}

impl FeedStats {
    fn record(&mut self, len: usize) {
        self.bytes += len as u64;
        self.writes += 1;
    }
}

/// Copies `input` into `writer` until end of input.
///
/// Writes stay one byte below the threshold where it allows, so every
/// rotated file holds at least one write and never reaches the threshold.
pub fn feed<R: BufRead>(
    mut input: R,
    writer: &dyn RotateWriter,
    threshold: usize,
    mode: FeedMode,
) -> Result<FeedStats, CliError> {
    let max_write = max_write(threshold);
    let mut stats = FeedStats::default();
    match mode {
        FeedMode::Chunks => {
            let mut buf = vec![0u8; max_write];
            loop {
                let n = fill(&mut input, &mut buf)?;
                if n == 0 {
                    break;
                }
                writer.write(&buf[..n])?;
                stats.record(n);
            }
        }
        FeedMode::Lines => {
            let mut line = Vec::new();
            loop {
                line.clear();
                if input.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                for piece in line.chunks(max_write) {
                    writer.write(piece)?;
                    stats.record(piece.len());
                }
            }
        }
    }
    debug!("input exhausted after {} bytes", stats.bytes);
    Ok(stats)
}

fn max_write(threshold: usize) -> usize {
    threshold.saturating_sub(1).max(1)
}

/// Reads until `buf` is full or the input ends.
fn fill<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize, CliError> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotasink_core::{FileConfig, FileRotateWriter};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn segments(dir: &Path) -> Vec<Vec<u8>> {
        let mut paths: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        paths.sort();
        paths.into_iter().map(|p| fs::read(p).unwrap()).collect()
    }

    #[test]
    fn chunks_never_exceed_threshold() {
        let dir = tempdir().unwrap();
        let writer = FileRotateWriter::open(FileConfig::new(dir.path().join("out"), 8)).unwrap();

        let input: Vec<u8> = (0..50u8).collect();
        let stats = feed(&input[..], &writer, 8, FeedMode::Chunks).unwrap();
        writer.close().unwrap();

        assert_eq!(stats.bytes, 50);
        assert_eq!(stats.writes, 8);
        let all = segments(dir.path());
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|s| !s.is_empty() && s.len() < 8));
        assert_eq!(all.iter().map(Vec::len).sum::<usize>(), 50);
    }

    #[test]
    fn lines_are_written_whole() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out");
        let writer = FileRotateWriter::open(FileConfig::new(&path, 16)).unwrap();

        let input = b"first line\nsecond line\nthird\n";
        let stats = feed(&input[..], &writer, 16, FeedMode::Lines).unwrap();
        writer.close().unwrap();

        assert_eq!(stats.writes, 3);
        assert_eq!(writer.finalized_segments().len(), 2);
        assert_eq!(fs::read(&path).unwrap(), b"third\n");
    }

    #[test]
    fn long_lines_are_split() {
        let dir = tempdir().unwrap();
        let writer = FileRotateWriter::open(FileConfig::new(dir.path().join("out"), 4)).unwrap();

        let stats = feed(&b"abcdefghij\n"[..], &writer, 4, FeedMode::Lines).unwrap();
        writer.close().unwrap();

        assert_eq!(stats.writes, 4);
        assert_eq!(stats.bytes, 11);
    }

    #[test]
    fn threshold_of_one_writes_single_bytes() {
        assert_eq!(max_write(1), 1);
        assert_eq!(max_write(2), 1);
        assert_eq!(max_write(8), 7);
    }

    #[test]
    fn empty_input_writes_nothing() {
        let dir = tempdir().unwrap();
        let writer = FileRotateWriter::open(FileConfig::new(dir.path().join("out"), 4)).unwrap();
        let stats = feed(&b""[..], &writer, 4, FeedMode::Chunks).unwrap();
        writer.close().unwrap();
        assert_eq!(stats, FeedStats::default());
        assert_eq!(segments(dir.path()), vec![Vec::<u8>::new()]);
    }
}
