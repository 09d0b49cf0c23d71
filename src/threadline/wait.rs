//! Bounded, cancellable polling.
//!
//! [`poll_until`] repeatedly sleeps and then probes until the probed value is done, the
//! attempt budget or deadline of a [`WaitPolicy`] runs out, or a
//! [`CancellationToken`] fires. The sleep is the only point where cancellation is
//! observed; a probe in flight always runs to completion.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use threadline::wait::WaitPolicy;
//!
//! let policy = WaitPolicy::new(Duration::from_secs(1), 10)
//!     .with_backoff(2.0, Duration::from_secs(8))
//!     .with_deadline(Duration::from_secs(60));
//!
//! assert_eq!(policy.delay_for(1), Duration::from_secs(1));
//! assert_eq!(policy.delay_for(3), Duration::from_secs(4));
//! assert_eq!(policy.delay_for(6), Duration::from_secs(8));
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How long and how often to wait for something to finish.
#[derive(Clone, Debug, PartialEq)]
pub struct WaitPolicy {
    /// Sleep before the first probe.
    pub interval: Duration,
    /// Maximum number of probes.
    pub max_attempts: u32,
    /// Multiplier applied to the sleep after every probe; `1.0` keeps it fixed.
    pub backoff_factor: f64,
    /// Upper bound for any single sleep.
    pub max_interval: Duration,
    /// Upper bound for the whole wait, if any.
    pub deadline: Option<Duration>,
}

impl Default for WaitPolicy {
    /// Five probes, three seconds apart.
    fn default() -> Self {
        WaitPolicy::new(Duration::from_secs(3), 5)
    }
}

impl WaitPolicy {
    /// Fixed spacing of `interval` with at most `max_attempts` probes.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        WaitPolicy {
            interval,
            max_attempts,
            backoff_factor: 1.0,
            max_interval: interval,
            deadline: None,
        }
    }

    /// Grow the sleep by `factor` after each probe, never beyond `max_interval`.
    ///
    /// Factors below `1.0` are treated as `1.0`.
    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    /// Give up once `deadline` has elapsed since the wait started.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sleep taken before probe number `attempt` (1-based).
    ///
    /// Factors below `1.0` or NaN count as `1.0`, and the sleep never exceeds the larger of
    /// `interval` and `max_interval`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = if self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            1.0
        };
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = (self.interval.as_secs_f64() * factor.powi(exponent)).max(0.0);
        let cap = self.max_interval.max(self.interval);
        if !scaled.is_finite() || scaled >= cap.as_secs_f64() {
            return cap;
        }
        Duration::from_secs_f64(scaled)
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitResult<T> {
    /// A probe returned a finished value.
    Done { value: T, attempts: u32 },
    /// The budget ran out; `last` is the value of the final probe, if any ran.
    Exhausted { last: Option<T>, attempts: u32 },
    /// The token was cancelled during a sleep.
    Cancelled { last: Option<T>, attempts: u32 },
}

/// Sleep, then call `probe`, until `is_done` accepts its value.
///
/// Probe errors end the wait immediately and are returned as-is.
pub async fn poll_until<T, E, F, Fut, D>(
    policy: &WaitPolicy,
    cancel: &CancellationToken,
    mut probe: F,
    is_done: D,
) -> Result<WaitResult<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: Fn(&T) -> bool,
{
    let started = Instant::now();
    let mut last = None;
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        let mut delay = policy.delay_for(attempts + 1);
        if let Some(deadline) = policy.deadline {
            let remaining = deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            delay = delay.min(remaining);
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Ok(WaitResult::Cancelled { last, attempts });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempts += 1;
        let value = probe(attempts).await?;
        if is_done(&value) {
            return Ok(WaitResult::Done { value, attempts });
        }
        last = Some(value);
    }

    Ok(WaitResult::Exhausted { last, attempts })
}
