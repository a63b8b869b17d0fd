//! # Retry Backoff
//!
//! Decides when a mutation that failed to replay may be attempted again.
//! Scheduled drains skip items whose next attempt is still in the future;
//! a manual retry ignores the schedule.

use crate::client::offline::queue::MutationKind;
use crate::shared::config::{AppConfig, BackoffStrategy};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Replay budgets plus the delay between attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub strategy: BackoffStrategy,
    pub max_retries: u32,
    pub delete_max_retries: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            strategy: config.backoff.clone(),
            max_retries: config.max_retries,
            delete_max_retries: config.delete_max_retries,
        }
    }

    /// Deletions get the smaller budget
    pub fn budget_for(&self, kind: MutationKind) -> u32 {
        match kind {
            MutationKind::MachineDelete => self.delete_max_retries,
            _ => self.max_retries,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match &self.strategy {
            BackoffStrategy::Immediate => Duration::ZERO,
            BackoffStrategy::Fixed { interval } => *interval,
            BackoffStrategy::Exponential { base, max, jitter } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                let delay = base.saturating_mul(factor).min(*max);

                let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
                if jitter_ms == 0 {
                    delay
                } else {
                    let extra = rand::thread_rng().gen_range(0..=jitter_ms);
                    delay + Duration::from_millis(extra)
                }
            }
        }
    }

    /// Absolute time of the next attempt after `attempt` failures
    pub fn next_attempt_at(&self, attempt: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = chrono::Duration::from_std(self.delay_for_attempt(attempt)).unwrap_or_else(|_| chrono::Duration::zero());
        now.checked_add_signed(delay).unwrap_or(now)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            max_retries: 5,
            delete_max_retries: 3,
        }
    }
}
