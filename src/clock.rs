//! Deadlines and cancellable pauses shared by waits and retries.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Far enough ahead that no wait ever reaches it.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// The instant `duration` from now, saturating instead of overflowing.
pub(crate) fn after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// How a pause between two attempts ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pause {
    /// The next attempt is due.
    Resume,
    /// The next attempt would fall at or after the deadline, which has now passed.
    Expired,
    /// The token was cancelled.
    Cancelled,
}

/// Sleep until `next`, stopping at `deadline` or on cancellation.
pub(crate) async fn pause_until(
    cancel: &CancellationToken,
    next: Instant,
    deadline: Instant,
) -> Pause {
    let expired = next >= deadline;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Pause::Cancelled,
        _ = sleep_until(next.min(deadline)) => {
            if expired {
                Pause::Expired
            } else {
                Pause::Resume
            }
        },
    }
}
