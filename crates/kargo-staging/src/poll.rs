//! Deadline-bounded polling with a fixed delay between attempts.

use std::future::Future;
use std::time::Duration;

use kargo_util::errors::{PublishError, PublishResult};
use tokio::time::Instant;
use tracing::debug;

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<T> {
    /// The awaited state was reached.
    Done(T),
    /// Not there yet; check again after the poll delay.
    Waiting,
}

/// Run `check` until it reports [`Progress::Done`], fails, or `timeout` elapses.
///
/// The deadline is fixed when the loop starts, so the phase fails after
/// `timeout` of wall-clock time regardless of how many polls ran. The last
/// sleep is shortened so one final check happens right at the deadline.
pub async fn poll_until<T, F, Fut>(
    phase: &str,
    timeout: Duration,
    delay: Duration,
    mut check: F,
) -> PublishResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PublishResult<Progress<T>>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Progress::Done(value) = check().await? {
            debug!(phase, attempt, "poll finished");
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PublishError::Timeout {
                phase: phase.to_string(),
                timeout,
            });
        }
        debug!(phase, attempt, "still waiting");
        tokio::time::sleep(delay.min(deadline - now)).await;
    }
}
