//! Segment pump: the background consumer of one open segment.
//!
//! A pump owns a dedicated thread that drains a bounded queue of writes
//! into the backend's persistence call. The writer side holds the queue's
//! sender and the thread's join handle; dropping the sender is the
//! end-of-stream signal, and joining the thread is the only way to learn
//! the segment's fate. A pump that fails keeps its error in the join
//! result until someone collects it, so a failure is never lost.

use crate::error::{RotateError, RotateResult};
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Reads the queued writes of one segment as a continuous byte stream.
///
/// Returns end-of-stream once the writer has dropped its side of the
/// queue and every queued write has been consumed.
#[derive(Debug)]
pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                // Sender dropped: end of segment.
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Handle to the background task persisting one segment.
#[derive(Debug)]
pub struct SegmentPump {
    segment: String,
    sender: Option<SyncSender<Vec<u8>>>,
    handle: Option<JoinHandle<RotateResult<u64>>>,
}

impl SegmentPump {
    /// Starts a pump for `segment`.
    ///
    /// `sink` runs on the pump thread. It must read the stream to its end
    /// and return the number of bytes it persisted.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::CreateFailed`] if the thread cannot be spawned.
    pub fn spawn<F>(segment: impl Into<String>, queue_depth: usize, sink: F) -> RotateResult<Self>
    where
        F: FnOnce(&mut ChannelReader) -> RotateResult<u64> + Send + 'static,
    {
        let segment = segment.into();
        let (tx, rx) = mpsc::sync_channel(queue_depth);

        let thread_segment = segment.clone();
        let handle = thread::Builder::new()
            .name("rotasink-pump".into())
            .spawn(move || {
                let mut reader = ChannelReader::new(rx);
                let result = sink(&mut reader);
                debug!("pump for {} finished: {:?}", thread_segment, result);
                result
            })
            .map_err(|e| RotateError::create(&segment, e))?;

        debug!("pump for {} started", segment);
        Ok(Self {
            segment,
            sender: Some(tx),
            handle: Some(handle),
        })
    }

    /// Returns the working name of the segment being pumped.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Queues one write, blocking while the queue is full.
    ///
    /// The payload is queued whole or not at all.
    ///
    /// # Errors
    ///
    /// If the pump has already stopped, collects and returns its failure.
    pub fn send(&mut self, payload: &[u8]) -> RotateResult<()> {
        let sent = match &self.sender {
            Some(sender) => sender.send(payload.to_vec()).is_ok(),
            None => false,
        };
        if sent {
            return Ok(());
        }

        // The receiving end is gone: the pump stopped early.
        self.sender = None;
        match self.join() {
            Err(err) => Err(err),
            Ok(persisted) => Err(RotateError::write(
                &self.segment,
                format!("pump stopped after {persisted} bytes before end of stream"),
            )),
        }
    }

    /// Signals end-of-stream and waits for the backend to finish.
    ///
    /// Returns the number of bytes the backend persisted.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::CloseFailed`] if the segment could not be
    /// persisted and closed.
    pub fn finish(mut self) -> RotateResult<u64> {
        self.sender = None;
        self.join().map_err(|err| match err {
            RotateError::WriteFailed { segment, source } => {
                RotateError::CloseFailed { segment, source }
            }
            other => other,
        })
    }

    fn join(&mut self) -> RotateResult<u64> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| RotateError::close(&self.segment, "pump already collected"))?;
        handle
            .join()
            .map_err(|_| RotateError::close(&self.segment, "pump thread panicked"))?
    }
}

impl Drop for SegmentPump {
    fn drop(&mut self) {
        self.sender = None;
        if self.handle.is_some() {
            let _ = self.join();
        }
    }
}
