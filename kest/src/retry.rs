//! Time-budgeted, interval-paced retry of a fallible async operation.
//!
//! Every action runs its body through [`retry_until`], which makes
//! read-after-write against an eventually-consistent cluster practical:
//! the first call happens immediately and silently; only when it fails
//! does the loop start pacing re-invocations and recording retry events.

use std::future::Future;
use std::time::Instant;

use tracing::debug;

use kest_common::{DurationMs, ErrorSummary, Event, RetryReason};

use crate::recorder::Recorder;

/// Time budget and pacing for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Total budget, measured from the first invocation.
    pub timeout: DurationMs,
    /// Pause between attempts.
    pub interval: DurationMs,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            timeout: DurationMs::from_millis(5_000),
            interval: DurationMs::from_millis(200),
        }
    }
}

impl RetryOptions {
    pub fn with_timeout(mut self, timeout: DurationMs) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: DurationMs) -> Self {
        self.interval = interval;
        self
    }
}

/// Invoke `op` until it succeeds or the time budget runs out.
///
/// The operation always runs at least once, with no retry events recorded
/// for a first-call success. On the first failure a `RetryStart` is
/// recorded (lazily, only if a retry will actually happen), then each
/// re-invocation is preceded by a sleep of `min(interval, remaining)` and
/// a `RetryAttempt` record. A sleep that would reach the deadline ends the
/// loop instead.
///
/// `RetryEnd.attempts` counts re-invocations only: the operation runs
/// `attempts + 1` times in total.
///
/// On timeout the last underlying error is raised, wrapped in a
/// `Timed out after <timeout>` context so callers and the report keep the
/// original diagnostic as the cause.
pub async fn retry_until<T, F, Fut>(
    recorder: &Recorder,
    options: RetryOptions,
    mut op: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let deadline = Instant::now() + options.timeout.to_std();

    let mut last_err = match op().await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let mut attempts: u32 = 0;
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let remaining = deadline - now;
        let pause = options.interval.to_std().min(remaining);
        if pause >= remaining {
            break;
        }
        tokio::time::sleep(pause).await;

        if attempts == 0 {
            recorder.record(Event::RetryStart);
        }
        attempts += 1;
        recorder.record(Event::RetryAttempt { attempt: attempts });
        debug!(attempt = attempts, "retrying after failure: {last_err:#}");

        match op().await {
            Ok(value) => {
                recorder.record(Event::RetryEnd {
                    attempts,
                    success: true,
                    reason: RetryReason::Success,
                    error: None,
                });
                return Ok(value);
            }
            Err(err) => last_err = err,
        }
    }

    if attempts > 0 {
        recorder.record(Event::RetryEnd {
            attempts,
            success: false,
            reason: RetryReason::Timeout,
            error: Some(ErrorSummary::from_error(&last_err)),
        });
    }
    Err(last_err.context(format!("Timed out after {}", options.timeout)))
}
