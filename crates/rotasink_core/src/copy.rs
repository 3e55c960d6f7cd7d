//! Copy-then-delete finalization for stores without a rename.
//!
//! ```text
//! PENDING --poll--> PENDING
//!    |                 |
//!    +--> SUCCESS --> delete original
//!    +--> FAILED  --> abort, original kept
//! ```
//!
//! A copy that is still pending when the deadline passes aborts the
//! rotation with [`RotateError::RotationTimedOut`]; the original is kept.
//! Object-store copies are synchronous and enter the machine directly in
//! SUCCESS or FAILED.

use crate::error::{RotateError, RotateResult, Source};
use rotasink_client::{ClientResult, CopyStatus};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// How a pending copy is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PollPolicy {
    pub(crate) interval: Duration,
    pub(crate) deadline: Duration,
}

/// Drives a copy from its initial status to a terminal one.
pub(crate) fn settle_copy<F>(
    from: &str,
    to: &str,
    initial: CopyStatus,
    policy: PollPolicy,
    mut poll: F,
) -> RotateResult<()>
where
    F: FnMut() -> ClientResult<CopyStatus>,
{
    let started = Instant::now();
    let mut status = initial;
    loop {
        match status {
            CopyStatus::Success => return Ok(()),
            CopyStatus::Failed(reason) => return Err(copy_failed(from, to, reason)),
            CopyStatus::Pending => {
                let waited = started.elapsed();
                if waited >= policy.deadline {
                    return Err(RotateError::RotationTimedOut {
                        from: from.to_string(),
                        to: to.to_string(),
                        waited,
                    });
                }
                debug!("copy of {} to {} pending after {:?}", from, to, waited);
                thread::sleep(policy.interval.min(policy.deadline - waited));
                status = poll().map_err(|e| copy_failed(from, to, e))?;
            }
        }
    }
}

/// Removes the original once its copy has succeeded.
pub(crate) fn delete_original<F>(from: &str, to: &str, delete: F) -> RotateResult<()>
where
    F: FnOnce() -> ClientResult<()>,
{
    delete().map_err(|e| RotateError::RemoveFailed {
        segment: from.to_string(),
        copied_to: to.to_string(),
        source: e.into(),
    })
}

pub(crate) fn copy_failed(from: &str, to: &str, source: impl Into<Source>) -> RotateError {
    RotateError::CopyFailed {
        from: from.to_string(),
        to: to.to_string(),
        source: source.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotasink_client::ClientError;

    fn fast() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            deadline: Duration::from_millis(200),
        }
    }

    #[test]
    fn immediate_success() {
        let result = settle_copy("a", "b", CopyStatus::Success, fast(), || {
            panic!("no poll expected")
        });
        assert!(result.is_ok());
    }

    #[test]
    fn pending_then_success() {
        let mut polls = 0;
        let result = settle_copy("a", "b", CopyStatus::Pending, fast(), || {
            polls += 1;
            Ok(if polls < 3 {
                CopyStatus::Pending
            } else {
                CopyStatus::Success
            })
        });
        assert!(result.is_ok());
        assert_eq!(polls, 3);
    }

    #[test]
    fn failed_status_is_a_copy_failure() {
        let err = settle_copy(
            "a",
            "b",
            CopyStatus::Failed("aborted".into()),
            fast(),
            || Ok(CopyStatus::Success),
        )
        .unwrap_err();
        assert!(matches!(err, RotateError::CopyFailed { .. }));
        assert!(err.to_string().contains("unable to rotate"));
    }

    #[test]
    fn poll_error_is_a_copy_failure() {
        let err = settle_copy("a", "b", CopyStatus::Pending, fast(), || {
            Err(ClientError::service("status unavailable"))
        })
        .unwrap_err();
        assert!(matches!(err, RotateError::CopyFailed { .. }));
    }

    #[test]
    fn stuck_copy_times_out() {
        let policy = PollPolicy {
            interval: Duration::from_millis(2),
            deadline: Duration::from_millis(20),
        };
        let err = settle_copy("a", "b", CopyStatus::Pending, policy, || {
            Ok(CopyStatus::Pending)
        })
        .unwrap_err();
        match err {
            RotateError::RotationTimedOut { waited, .. } => {
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn delete_failure_is_a_remove_failure() {
        let err = delete_original("a", "b", || Err(ClientError::service("denied"))).unwrap_err();
        assert!(matches!(err, RotateError::RemoveFailed { .. }));
        assert!(err.may_leave_duplicate());
        assert!(delete_original("a", "b", || Ok(())).is_ok());
    }
}
