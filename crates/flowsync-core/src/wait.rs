// ── Bounded readiness wait ──
//
// Polls a condition on a fixed interval until it holds or the overall
// timeout elapses. There is no other cancellation.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

use crate::error::CoreError;

/// Wait until `condition` returns `true`, checking every `interval`.
///
/// The condition is checked once immediately. Errors from the condition
/// abort the wait and are returned as-is.
pub async fn wait_until<F>(
    what: &str,
    mut condition: F,
    interval: Duration,
    timeout: Duration,
) -> Result<(), CoreError>
where
    F: FnMut() -> Result<bool, CoreError>,
{
    let deadline = Instant::now() + timeout;
    let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if condition()? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(CoreError::Timeout {
                what: what.to_owned(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        trace!(what, "condition not met yet");
    }
}
