//! Retry with exponential backoff
//!
//! Used for collaborator calls (language generator, harvester) and for
//! SQLite writes that hit a transient lock.
//!
//! **Backoff Strategy:**
//! - Initial delay: `initial_delay_ms`
//! - Multiplier: `multiplier` (exponential)
//! - Each delay capped at `max_delay_ms`
//! - At most `max_attempts` calls in total

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// Backoff parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    /// Collaborator defaults: 3 attempts, 200 ms initial, x2, capped at 2 s
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            multiplier: 2.0,
            max_delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// Database lock defaults: 10 ms initial, x2, capped at 1 s
    pub fn database() -> Self {
        Self {
            max_attempts: 8,
            initial_delay_ms: 10,
            multiplier: 2.0,
            max_delay_ms: 1000,
        }
    }

    /// No retries; a single call
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the retry that follows the 1-based `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let delay = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

/// Retry `operation` while `is_transient` accepts its error
///
/// Permanent errors are returned immediately. After `max_attempts` the last
/// transient error is returned.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "generate expansion", "save_session")
/// * `policy` - Backoff parameters
/// * `is_transient` - Classifies an error as retryable
/// * `operation` - Async closure performing one attempt
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let start_time = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_transient(&err) {
                    return Err(err);
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Operation failed: retries exhausted"
                    );
                    return Err(err);
                }

                let backoff = policy.delay_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Whether a common error is a transient SQLite lock
pub fn is_lock_error(err: &scout_common::Error) -> bool {
    match err {
        scout_common::Error::Database(db_err) => {
            let message = db_err.to_string();
            message.contains("database is locked") || message.contains("database is busy")
        }
        _ => false,
    }
}
