//! Segment store trait: how a backend persists and finalizes segments.

use crate::error::RotateResult;
use crate::pump::SegmentPump;

/// Backend half of a rotating writer.
///
/// A store knows where the working segment lives, how to stream bytes
/// into it, and how to give a closed segment its permanent name. It knows
/// nothing about thresholds or byte counts; [`crate::SizeRotateWriter`]
/// drives it and guarantees that calls never overlap.
///
/// # Invariants
///
/// - `finalize` is only called after the pump returned by the previous
///   `open_segment` has finished
/// - at most one pump per store is open at any time
pub trait SegmentStore: Send + Sync + 'static {
    /// Human-readable destination, used in logs.
    fn describe(&self) -> String;

    /// Name of the working segment.
    fn working_name(&self) -> String;

    /// Creates a fresh working segment and starts its pump.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RotateError::CreateFailed`] if the segment or the
    /// pump cannot be created.
    fn open_segment(&self, queue_depth: usize) -> RotateResult<SegmentPump>;

    /// Moves the closed working segment to its finalized name for `stamp`.
    ///
    /// Returns the finalized name, or `None` if there was no working
    /// segment to finalize.
    ///
    /// # Errors
    ///
    /// Returns a rename, copy, remove or timeout error. On a copy-phase
    /// failure the working segment is left untouched.
    fn finalize(&self, stamp: u64) -> RotateResult<Option<String>>;

    /// Returns true if a non-empty working segment from an earlier writer
    /// is present and would be overwritten by `open_segment`.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be inspected.
    fn has_leftover(&self) -> RotateResult<bool>;
}
