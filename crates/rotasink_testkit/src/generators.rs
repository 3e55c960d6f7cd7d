//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Strategy for rotation thresholds small enough to rotate often.
pub fn threshold_strategy() -> impl Strategy<Value = usize> {
    1usize..64
}

/// Strategy for a sequence of payload lengths that all fit `threshold`.
pub fn payload_lengths_strategy(threshold: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..=threshold, 0..40)
}

/// Strategy for a threshold together with payloads strictly below it.
pub fn workload_strategy() -> impl Strategy<Value = (usize, Vec<Vec<u8>>)> {
    threshold_strategy().prop_flat_map(|threshold| {
        let payload = prop::collection::vec(any::<u8>(), 0..threshold);
        (Just(threshold), prop::collection::vec(payload, 0..40))
    })
}
