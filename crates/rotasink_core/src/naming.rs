//! Segment naming.
//!
//! The working segment is `<base><ext>`; a finalized segment is
//! `<base>-<unix nanos><ext>`. Downstream consumers scan destinations
//! for this exact shape, so it must not change.

/// Derives working and finalized segment names from a base identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNames {
    base: String,
    extension: String,
}

impl SegmentNames {
    /// Creates names for `base`, with `extension` appended verbatim
    /// (include the leading dot, e.g. `".txt"`; empty for none).
    pub fn new(base: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            extension: extension.into(),
        }
    }

    /// Returns the base identity.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the extension, possibly empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Name of the segment currently accepting writes.
    pub fn working(&self) -> String {
        format!("{}{}", self.base, self.extension)
    }

    /// Permanent name for a segment rotated at `stamp` nanoseconds.
    pub fn finalized(&self, stamp: u64) -> String {
        format!("{}-{}{}", self.base, stamp, self.extension)
    }

    /// Extracts the rotation stamp from a finalized name, if `name` is one
    /// of ours.
    pub fn parse_stamp(&self, name: &str) -> Option<u64> {
        let rest = name.strip_prefix(&self.base)?.strip_prefix('-')?;
        let digits = rest.strip_suffix(&self.extension)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Hands out strictly increasing rotation stamps.
///
/// Two rotations inside the same clock tick, or a clock stepping
/// backwards, would otherwise produce colliding finalized names.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StampSequence {
    last: Option<u64>,
}

impl StampSequence {
    pub(crate) fn next(&mut self, now: u64) -> u64 {
        let stamp = match self.last {
            Some(last) if now <= last => last.saturating_add(1),
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }
}
