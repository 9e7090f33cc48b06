//! Retry budgets, inter-attempt delays and the cancellable sleep between them.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One unit of the user-facing retry delay.
pub const DELAY_UNIT: Duration = Duration::from_millis(100);

/// Upper bound for exponential back-off.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How many retries may follow the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    Unlimited,
    Limited(u32),
}

impl RetryBudget {
    /// `-1` is unlimited; anything below is treated as no retry.
    pub fn from_limit(limit: i32) -> Self {
        match limit {
            -1 => RetryBudget::Unlimited,
            n => RetryBudget::Limited(u32::try_from(n).unwrap_or(0)),
        }
    }

    /// Whether another attempt may follow `attempts_made` failed ones.
    pub fn allows(&self, attempts_made: u32) -> bool {
        match self {
            RetryBudget::Unlimited => true,
            RetryBudget::Limited(n) => attempts_made <= *n,
        }
    }
}

/// Decides whether a failed attempt is followed by another, and after how long.
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, attempt: u32) -> bool;
    fn delay(&self, attempt: u32) -> Duration;
}

/// Constant spacing between attempts.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    budget: RetryBudget,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(budget: RetryBudget, delay: Duration) -> Self {
        Self { budget, delay }
    }
}

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, attempt: u32) -> bool {
        self.budget.allows(attempt)
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Delay doubles after every failed attempt, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    budget: RetryBudget,
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(budget: RetryBudget, base: Duration) -> Self {
        Self {
            budget,
            base,
            max: MAX_BACKOFF.max(base),
        }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt: u32) -> bool {
        self.budget.allows(attempt)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << shift)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `true` when the full delay elapsed, `false` when cancelled.
pub async fn cancellable_sleep(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
