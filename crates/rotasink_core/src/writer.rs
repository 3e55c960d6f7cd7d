//! The size-triggered rotating writer.

use crate::clock::{Clock, SystemClock};
use crate::config::WriterConfig;
use crate::error::{RotateError, RotateResult};
use crate::naming::StampSequence;
use crate::pump::SegmentPump;
use crate::store::SegmentStore;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Observable state of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// A segment is open and accepting writes.
    Open,
    /// A rotation or the segment pump failed; the writer must be rebuilt.
    Failed,
    /// The writer was closed.
    Closed,
}

/// The operations every rotating writer offers, whatever its backend.
///
/// Use this trait to pick a backend at runtime behind a
/// `Box<dyn RotateWriter>`.
pub trait RotateWriter: Send + Sync {
    /// Writes one payload into the current segment, rotating first if the
    /// payload would fill it. Returns the number of bytes accepted, which
    /// is always the whole payload.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::PayloadTooLarge`] for payloads larger than the
    /// threshold, a persistence error if the segment pump failed, or the
    /// rotation error if the triggered rotation failed.
    fn write(&self, payload: &[u8]) -> RotateResult<usize>;

    /// Finalizes the current segment and opens a new one.
    ///
    /// # Errors
    ///
    /// Returns a close, rename, copy, remove or timeout error.
    fn rotate(&self) -> RotateResult<()>;

    /// Drains the current segment, leaving it under its working name.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::CloseFailed`] if the segment could not be
    /// persisted.
    fn close(&self) -> RotateResult<()>;

    /// Returns the writer's state.
    fn state(&self) -> WriterState;

    /// Returns the finalized names produced so far, oldest first.
    fn finalized_segments(&self) -> Vec<String>;
}

#[derive(Debug)]
struct Inner {
    state: WriterState,
    pump: Option<SegmentPump>,
    bytes_in_segment: usize,
    total_bytes: u64,
    stamps: StampSequence,
    finalized: Vec<String>,
}

impl Inner {
    fn ensure_open(&self) -> RotateResult<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Failed => Err(RotateError::Poisoned),
            WriterState::Closed => Err(RotateError::Closed),
        }
    }

    /// Marks the writer failed on error.
    fn poison<T>(&mut self, result: RotateResult<T>) -> RotateResult<T> {
        if result.is_err() {
            self.state = WriterState::Failed;
            self.pump = None;
        }
        result
    }
}

/// A writer that rotates its segments once they reach a size threshold.
///
/// All entry points serialize on one per-writer lock. Bytes handed to
/// [`write`](Self::write) are queued to a background pump; a rotation
/// blocks the caller until the previous segment has been persisted and
/// finalized, so at most one segment is open at any time.
///
/// # Example
///
/// ```no_run
/// use rotasink_core::{FileConfig, FileRotateWriter};
///
/// let writer = FileRotateWriter::open(FileConfig::new("/var/log/app.log", 1 << 20)).unwrap();
/// writer.write(b"started\n").unwrap();
/// writer.close().unwrap();
/// ```
#[derive(Debug)]
pub struct SizeRotateWriter<S: SegmentStore> {
    store: S,
    threshold: usize,
    queue_depth: usize,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl<S: SegmentStore> SizeRotateWriter<S> {
    /// Creates a writer over `store` and opens its first segment.
    ///
    /// A non-empty working segment left behind by an earlier writer is
    /// finalized first rather than overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`RotateError::InvalidConfig`] for invalid settings, or the
    /// store's error if the leftover cannot be finalized or the first
    /// segment cannot be created.
    pub fn new(store: S, config: &WriterConfig) -> RotateResult<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Creates a writer taking rotation timestamps from `clock`.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_clock(store: S, config: &WriterConfig, clock: Arc<dyn Clock>) -> RotateResult<Self> {
        config.validate()?;

        let mut stamps = StampSequence::default();
        let mut finalized = Vec::new();
        if store.has_leftover()? {
            let stamp = stamps.next(clock.now_unix_nanos());
            if let Some(name) = store.finalize(stamp)? {
                info!("finalized leftover segment of {} as {}", store.describe(), name);
                finalized.push(name);
            }
        }

        let pump = store.open_segment(config.queue_depth)?;
        info!(
            "opened rotating writer for {} (threshold {} bytes)",
            store.describe(),
            config.rotation_threshold
        );

        Ok(Self {
            store,
            threshold: config.rotation_threshold,
            queue_depth: config.queue_depth,
            clock,
            inner: Mutex::new(Inner {
                state: WriterState::Open,
                pump: Some(pump),
                bytes_in_segment: 0,
                total_bytes: 0,
                stamps,
                finalized,
            }),
        })
    }

    /// Writes one payload. See [`RotateWriter::write`].
    ///
    /// # Errors
    ///
    /// See [`RotateWriter::write`].
    pub fn write(&self, payload: &[u8]) -> RotateResult<usize> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;

        if payload.len() > self.threshold {
            return Err(RotateError::PayloadTooLarge {
                len: payload.len(),
                threshold: self.threshold,
            });
        }
        if payload.is_empty() {
            return Ok(0);
        }

        // Rotate first so a payload never straddles two segments.
        if inner.bytes_in_segment + payload.len() >= self.threshold {
            self.rotate_locked(&mut inner)?;
        }

        let sent = match inner.pump.as_mut() {
            Some(pump) => pump.send(payload),
            None => Err(RotateError::Poisoned),
        };
        inner.poison(sent)?;

        inner.bytes_in_segment += payload.len();
        inner.total_bytes += payload.len() as u64;
        Ok(payload.len())
    }

    /// Finalizes the current segment. See [`RotateWriter::rotate`].
    ///
    /// Succeeds without doing anything when no segment is open.
    ///
    /// # Errors
    ///
    /// See [`RotateWriter::rotate`].
    pub fn rotate(&self) -> RotateResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != WriterState::Open {
            debug!("rotate on {} with no open segment", self.store.describe());
            return Ok(());
        }
        self.rotate_locked(&mut inner)
    }

    /// Drains and closes the current segment. See [`RotateWriter::close`].
    ///
    /// Closing twice, or closing a failed writer, succeeds.
    ///
    /// # Errors
    ///
    /// See [`RotateWriter::close`].
    pub fn close(&self) -> RotateResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != WriterState::Open {
            return Ok(());
        }
        inner.state = WriterState::Closed;

        let Some(pump) = inner.pump.take() else {
            return Ok(());
        };
        let expected = inner.bytes_in_segment;
        let segment = pump.segment().to_string();
        let result = pump
            .finish()
            .and_then(|persisted| check_persisted(segment, expected, persisted));
        inner.bytes_in_segment = 0;
        result?;

        info!(
            "closed rotating writer for {} ({} bytes in final segment {})",
            self.store.describe(),
            expected,
            self.store.working_name()
        );
        Ok(())
    }

    /// Returns the writer's state.
    pub fn state(&self) -> WriterState {
        self.inner.lock().state
    }

    /// Returns the rotation threshold in bytes.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Returns the bytes accepted into the current segment.
    pub fn bytes_in_segment(&self) -> usize {
        self.inner.lock().bytes_in_segment
    }

    /// Returns the bytes accepted over the writer's lifetime.
    pub fn total_bytes(&self) -> u64 {
        self.inner.lock().total_bytes
    }

    /// Returns the finalized names produced so far, oldest first.
    pub fn finalized_segments(&self) -> Vec<String> {
        self.inner.lock().finalized.clone()
    }

    /// Returns the backend store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn rotate_locked(&self, inner: &mut Inner) -> RotateResult<()> {
        let Some(pump) = inner.pump.take() else {
            return Ok(());
        };
        let expected = inner.bytes_in_segment;
        let segment = pump.segment().to_string();

        let drained = pump
            .finish()
            .and_then(|persisted| check_persisted(segment, expected, persisted));
        inner.poison(drained)?;

        let stamp = inner.stamps.next(self.clock.now_unix_nanos());
        let finalized = self.store.finalize(stamp);
        if let Some(name) = inner.poison(finalized)? {
            info!(
                "rotated {} to {} ({} bytes)",
                self.store.working_name(),
                name,
                expected
            );
            inner.finalized.push(name);
        }

        let opened = self.store.open_segment(self.queue_depth);
        inner.pump = Some(inner.poison(opened)?);
        inner.bytes_in_segment = 0;
        Ok(())
    }
}

fn check_persisted(segment: String, expected: usize, persisted: u64) -> RotateResult<()> {
    if persisted == expected as u64 {
        Ok(())
    } else {
        Err(RotateError::CloseFailed {
            segment,
            source: format!("persisted {persisted} of {expected} accepted bytes").into(),
        })
    }
}

impl<S: SegmentStore> RotateWriter for SizeRotateWriter<S> {
    fn write(&self, payload: &[u8]) -> RotateResult<usize> {
        SizeRotateWriter::write(self, payload)
    }

    fn rotate(&self) -> RotateResult<()> {
        SizeRotateWriter::rotate(self)
    }

    fn close(&self) -> RotateResult<()> {
        SizeRotateWriter::close(self)
    }

    fn state(&self) -> WriterState {
        SizeRotateWriter::state(self)
    }

    fn finalized_segments(&self) -> Vec<String> {
        SizeRotateWriter::finalized_segments(self)
    }
}

impl<S: SegmentStore> io::Write for SizeRotateWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SizeRotateWriter::write(self, buf).map_err(io::Error::from)
    }

    /// Durability is owned by rotation and close; there is nothing to flush.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: SegmentStore> Drop for SizeRotateWriter<S> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(
                "closing rotating writer for {} on drop failed: {}",
                self.store.describe(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::naming::SegmentNames;
    use std::collections::BTreeMap;
    use std::io::Read;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    /// A store keeping segments in a shared map.
    #[derive(Debug, Default)]
    struct MapStore {
        segments: Arc<parking_lot::Mutex<BTreeMap<String, Vec<u8>>>>,
        names: Option<SegmentNames>,
        fail_finalize: AtomicBool,
        fail_sink: Arc<AtomicBool>,
        refuse_stream: Arc<AtomicBool>,
    }

    impl MapStore {
        fn new() -> Self {
            Self {
                names: Some(SegmentNames::new("seg", ".log")),
                ..Self::default()
            }
        }

        fn names(&self) -> &SegmentNames {
            self.names.as_ref().unwrap()
        }

        fn sizes(&self) -> BTreeMap<String, usize> {
            self.segments
                .lock()
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect()
        }
    }

    impl SegmentStore for MapStore {
        fn describe(&self) -> String {
            "map://seg".into()
        }

        fn working_name(&self) -> String {
            self.names().working()
        }

        fn open_segment(&self, queue_depth: usize) -> RotateResult<SegmentPump> {
            let segments = Arc::clone(&self.segments);
            let fail = Arc::clone(&self.fail_sink);
            let refuse = Arc::clone(&self.refuse_stream);
            let name = self.working_name();
            let sink_name = name.clone();
            SegmentPump::spawn(name, queue_depth, move |reader| {
                if refuse.load(Ordering::SeqCst) {
                    return Err(RotateError::write(&sink_name, "stream refused"));
                }
                let mut data = Vec::new();
                reader
                    .read_to_end(&mut data)
                    .map_err(|e| RotateError::write(&sink_name, e))?;
                if fail.load(Ordering::SeqCst) {
                    return Err(RotateError::write(&sink_name, "sink failure"));
                }
                let len = data.len() as u64;
                segments.lock().insert(sink_name, data);
                Ok(len)
            })
        }

        fn finalize(&self, stamp: u64) -> RotateResult<Option<String>> {
            let from = self.working_name();
            let to = self.names().finalized(stamp);
            if self.fail_finalize.load(Ordering::SeqCst) {
                return Err(RotateError::CopyFailed {
                    from,
                    to,
                    source: "refused".into(),
                });
            }
            let mut segments = self.segments.lock();
            match segments.remove(&from) {
                Some(data) => {
                    segments.insert(to.clone(), data);
                    Ok(Some(to))
                }
                None => Ok(None),
            }
        }

        fn has_leftover(&self) -> RotateResult<bool> {
            Ok(self
                .segments
                .lock()
                .get(&self.working_name())
                .is_some_and(|data| !data.is_empty()))
        }
    }

    fn writer(threshold: usize) -> SizeRotateWriter<MapStore> {
        SizeRotateWriter::with_clock(
            MapStore::new(),
            &WriterConfig::new(threshold),
            Arc::new(ManualClock::new(1_000)),
        )
        .unwrap()
    }

    #[test]
    fn hello_world_rotation() {
        let w = writer(14);
        w.write(b"Hello World 1").unwrap();
        assert_eq!(w.bytes_in_segment(), 13);
        w.write(b"Hello World 2").unwrap();
        assert_eq!(w.bytes_in_segment(), 13);
        w.write(b"Hello World 3").unwrap();
        w.close().unwrap();

        let sizes = w.store().sizes();
        assert_eq!(sizes.len(), 3);
        assert!(sizes.values().all(|&len| len == 13));
        assert_eq!(
            w.finalized_segments(),
            vec!["seg-1000.log".to_string(), "seg-1001.log".to_string()]
        );
        assert_eq!(w.total_bytes(), 39);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let w = writer(4);
        let err = w.write(b"12345").unwrap_err();
        assert!(matches!(
            err,
            RotateError::PayloadTooLarge {
                len: 5,
                threshold: 4
            }
        ));
        assert_eq!(w.bytes_in_segment(), 0);
        assert_eq!(w.state(), WriterState::Open);
        w.close().unwrap();
        assert_eq!(w.store().sizes()["seg.log"], 0);
    }

    #[test]
    fn zero_length_write_is_a_no_op() {
        let w = writer(4);
        w.write(b"abc").unwrap();
        assert_eq!(w.write(b"").unwrap(), 0);
        assert_eq!(w.bytes_in_segment(), 3);
        assert!(w.finalized_segments().is_empty());
    }

    #[test]
    fn payload_equal_to_threshold_rotates_first() {
        let w = writer(4);
        w.write(b"abcd").unwrap();
        // 0 + 4 >= 4: the empty segment is finalized before the payload lands.
        assert_eq!(w.finalized_segments(), vec!["seg-1000.log".to_string()]);
        assert_eq!(w.bytes_in_segment(), 4);

        w.write(b"e").unwrap();
        assert_eq!(w.finalized_segments().len(), 2);
        w.close().unwrap();
        let sizes = w.store().sizes();
        assert_eq!(sizes["seg-1000.log"], 0);
        assert_eq!(sizes["seg-1001.log"], 4);
        assert_eq!(sizes["seg.log"], 1);
    }

    #[test]
    fn payloads_below_threshold_never_fill_a_segment() {
        let w = writer(10);
        for payload in [&b"123"[..], b"4567", b"89", b"0", b"abcdefghi"] {
            w.write(payload).unwrap();
        }
        w.close().unwrap();
        let sizes = w.store().sizes();
        assert_eq!(sizes.len(), 3);
        assert!(sizes.values().all(|&len| len < 10));
        assert_eq!(sizes.values().sum::<usize>(), 19);
    }

    #[test]
    fn dead_pump_fails_the_next_write() {
        let store = MapStore::new();
        store.refuse_stream.store(true, Ordering::SeqCst);
        let w = SizeRotateWriter::with_clock(
            store,
            &WriterConfig::new(1 << 20),
            Arc::new(ManualClock::new(1)),
        )
        .unwrap();

        // Writes queue until the pump thread has gone away.
        let err = (0..1_000)
            .find_map(|_| match w.write(b"x") {
                Ok(_) => {
                    thread::sleep(Duration::from_millis(1));
                    None
                }
                Err(err) => Some(err),
            })
            .expect("pump never stopped");
        assert!(matches!(err, RotateError::WriteFailed { .. }), "{err}");
        assert_eq!(w.state(), WriterState::Failed);
        assert!(matches!(w.write(b"x"), Err(RotateError::Poisoned)));
        assert!(w.close().is_ok());
        assert!(w.store().sizes().is_empty());
    }

    #[test]
    fn explicit_rotate_and_close_semantics() {
        let w = writer(100);
        w.write(b"abc").unwrap();
        w.rotate().unwrap();
        assert_eq!(w.bytes_in_segment(), 0);
        assert_eq!(w.finalized_segments().len(), 1);

        w.close().unwrap();
        assert_eq!(w.state(), WriterState::Closed);
        assert!(w.close().is_ok());
        assert!(w.rotate().is_ok());
        assert!(matches!(w.write(b"x"), Err(RotateError::Closed)));
    }

    #[test]
    fn finalize_failure_poisons_the_writer() {
        let w = writer(5);
        w.write(b"abc").unwrap();
        w.store().fail_finalize.store(true, Ordering::SeqCst);

        let err = w.write(b"def").unwrap_err();
        assert!(matches!(err, RotateError::CopyFailed { .. }));
        assert_eq!(w.state(), WriterState::Failed);
        assert!(matches!(w.write(b"x"), Err(RotateError::Poisoned)));
        assert!(w.rotate().is_ok());
        assert!(w.close().is_ok());

        // The closed segment is still under its working name.
        assert_eq!(w.store().sizes()["seg.log"], 3);
    }

    #[test]
    fn sink_failure_surfaces_on_close() {
        let w = writer(100);
        w.store().fail_sink.store(true, Ordering::SeqCst);
        w.write(b"abc").unwrap();
        let err = w.close().unwrap_err();
        assert!(matches!(err, RotateError::CloseFailed { .. }));
    }

    #[test]
    fn sink_failure_surfaces_on_rotate() {
        let w = writer(100);
        w.store().fail_sink.store(true, Ordering::SeqCst);
        w.write(b"abc").unwrap();
        let err = w.rotate().unwrap_err();
        assert_eq!(err.rotation_phase(), Some(crate::RotationPhase::Close));
        assert_eq!(w.state(), WriterState::Failed);
    }

    #[test]
    fn leftover_segment_is_finalized_on_open() {
        let store = MapStore::new();
        store
            .segments
            .lock()
            .insert("seg.log".into(), b"old".to_vec());

        let w = SizeRotateWriter::with_clock(
            store,
            &WriterConfig::new(10),
            Arc::new(ManualClock::new(5)),
        )
        .unwrap();
        assert_eq!(w.finalized_segments(), vec!["seg-5.log".to_string()]);
        w.close().unwrap();
        assert_eq!(w.store().sizes()["seg-5.log"], 3);
    }

    #[test]
    fn finalized_names_distinct_under_frozen_clock() {
        let w = writer(2);
        for _ in 0..10 {
            w.write(b"x").unwrap();
            w.write(b"y").unwrap();
        }
        let names = w.finalized_segments();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn io_write_adapter() {
        use std::io::Write;

        let mut w = writer(8);
        w.write_all(b"1234").unwrap();
        w.write_all(b"5678").unwrap();
        w.flush().unwrap();
        assert_eq!(SizeRotateWriter::finalized_segments(&w).len(), 1);

        let err = Write::write(&mut w, b"123456789").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn dyn_rotate_writer() {
        let w: Box<dyn RotateWriter> = Box::new(writer(14));
        w.write(b"Hello World 1").unwrap();
        w.rotate().unwrap();
        assert_eq!(w.finalized_segments().len(), 1);
        w.close().unwrap();
        assert_eq!(w.state(), WriterState::Closed);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let result = SizeRotateWriter::new(MapStore::new(), &WriterConfig::new(0));
        assert!(matches!(result, Err(RotateError::InvalidConfig(_))));
    }
}
