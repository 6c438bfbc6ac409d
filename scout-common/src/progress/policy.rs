//! Reconnect policy and channel timing configuration

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with bounded random jitter
///
/// `delay(attempt) = base_interval * 2^(attempt - 1) + jitter`, with jitter
/// drawn uniformly from `[0, max_jitter]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub base_interval_ms: u64,
    pub max_jitter_ms: u64,
    /// Consecutive unexpected closes tolerated before entering `Error`
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_interval_ms: 1000,
            max_jitter_ms: 1000,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Deterministic part of the delay for a 1-based attempt number
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        Duration::from_millis(self.base_interval_ms.saturating_mul(1u64 << exponent))
    }

    /// Full delay with jitter drawn from `rng`
    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=self.max_jitter_ms)
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }

    /// Full delay with jitter from the thread-local RNG
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    /// Whether `attempts` consecutive failures exhaust the policy
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

/// Progress channel timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub reconnect: ReconnectPolicy,
    /// Interval between outbound heartbeats while connected
    pub heartbeat_interval_ms: u64,
    /// Inbound handlers slower than this emit a performance warning
    pub slow_handler_threshold_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval_ms: 30_000,
            slow_handler_threshold_ms: 50,
        }
    }
}

impl ChannelConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn slow_handler_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_handler_threshold_ms)
    }
}
