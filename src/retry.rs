//! Bounded retries with exponential backoff.
//!
//! Only errors classified as transient (see [`crate::error::ErrorClass`]) are
//! retried. Transform, validation and configuration errors fail on the first
//! attempt.

use std::thread;
use std::time::Duration;

use log::warn;
use rand::Rng;

use crate::defaults;
use crate::error::Result;

const MAX_BACKOFF_EXPONENT: u32 = 6;

/// How many times, and how patiently, a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Cap applied to every computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_ATTEMPTS,
            base_delay: defaults::RETRY_BASE_DELAY,
            max_delay: defaults::RETRY_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: defaults::RETRY_MAX_DELAY.max(base_delay),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// A policy that retries without sleeping. Useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after `failed_attempt` (1-based) failed.
    ///
    /// attempt=1 -> base, attempt=2 -> base*2, attempt=3 -> base*4, capped,
    /// plus up to 25% jitter.
    pub fn delay_for_retry(&self, failed_attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = failed_attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let backoff = self
            .base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay);
        (backoff + jitter(backoff)).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget
    /// is exhausted. On exhaustion the last transient error is returned.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < attempts => {
                    let delay = self.delay_for_retry(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {} ms.",
                        operation,
                        attempt,
                        attempts,
                        error,
                        delay.as_millis()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Random extra delay of up to a quarter of `backoff`.
fn jitter(backoff: Duration) -> Duration {
    let cap = backoff.as_millis() as u64 / 4;
    if cap == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
}
