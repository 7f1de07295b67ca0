//! Deadline-bounded, fixed-interval polling.
//!
//! Every wait in the workspace (runner idle-wait, instance port discovery,
//! instance shutdown) goes through [`poll_until`] or [`try_poll_until`].
//! Both use [`tokio::time`], so tests can drive them with a paused clock.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Interval and deadline for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between two probes.
    pub interval: Duration,
    /// Total time budget, measured from the first probe.
    pub timeout: Duration,
}

impl PollConfig {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Probe until it yields `Some` or the deadline passes.
///
/// The probe runs once immediately and once more at the deadline, so a
/// zero timeout still gets a single attempt. Returns `None` on timeout.
pub async fn poll_until<T, F, Fut>(config: PollConfig, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let outcome: Result<Option<T>, std::convert::Infallible> =
        try_poll_until(config, || {
            let fut = probe();
            async move { Ok(fut.await) }
        })
        .await;
    match outcome {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Fallible variant of [`poll_until`]: the first probe error ends the loop.
pub async fn try_poll_until<T, E, F, Fut>(config: PollConfig, mut probe: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::debug!(
                attempt,
                timeout_ms = config.timeout.as_millis() as u64,
                "Polling deadline reached",
            );
            return Ok(None);
        }

        tokio::time::sleep(config.interval.min(deadline - now)).await;
    }
}
