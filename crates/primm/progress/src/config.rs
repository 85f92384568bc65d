//! Progress core configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When per-stage rewards are credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardPolicy {
    /// Every correct submission earns the stage reward, including correct
    /// resubmissions of modify/make stages.
    #[default]
    EveryCorrectSubmission,
    /// The stage reward is credited once per (user, stage).
    FirstCompletion,
}

/// Configuration of the progress core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Minimum reflection length, in characters after trimming, for an
    /// investigate submission to count as complete.
    pub investigate_min_chars: usize,
    pub reward_policy: RewardPolicy,
    pub reconcile: ReconcileConfig,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            investigate_min_chars: default_investigate_min_chars(),
            reward_policy: RewardPolicy::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

fn default_investigate_min_chars() -> usize {
    20
}

/// Retry settings for course reconciliation that failed inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub queue_capacity: usize,
    /// How long shutdown waits for in-flight retries before abandoning them.
    pub shutdown_grace_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            queue_capacity: 256,
            shutdown_grace_ms: 5000,
        }
    }
}

impl ReconcileConfig {
    /// Delay before retry number `attempt` (1-based), doubling each time and
    /// capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
