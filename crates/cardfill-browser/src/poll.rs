use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Runs `probe` until it yields a value or `deadline` has elapsed.
///
/// The probe always runs at least once, and once more at the deadline
/// itself. Between attempts the task sleeps for `interval` (clamped to the
/// time left). Uses tokio's clock, so paused-time tests advance it
/// deterministically.
pub async fn poll_until<T, F, Fut>(interval: Duration, deadline: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let expires_at = Instant::now() + deadline;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= expires_at {
            return None;
        }
        sleep(interval.min(expires_at - now)).await;
    }
}
