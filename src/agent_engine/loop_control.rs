use std::time::Duration;

/// Attempt budget for one `predict` call. Transport failures and format failures
/// draw from the same budget.
#[derive(Debug, Clone)]
pub struct AttemptBudget {
    remaining: u32,
    used: u32,
    retry_delay: Duration,
}

impl AttemptBudget {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            remaining: max_attempts,
            used: 0,
            retry_delay,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Attempts consumed so far.
    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Record a failed attempt. Returns true if another attempt is allowed.
    pub fn record_failure(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.used += 1;
        self.remaining > 0
    }

    /// Pause before retrying after a transport failure.
    pub async fn backoff(&self) {
        if !self.retry_delay.is_zero() {
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}
