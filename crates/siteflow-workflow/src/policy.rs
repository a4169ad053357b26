// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy for orchestrated activities.

use std::time::Duration;

use siteflow_config::model::WorkflowConfig;
use siteflow_core::{ErrorKind, SiteflowError};

/// Error kinds that fail an activity on the first occurrence.
pub const DEFAULT_NON_RETRYABLE: [ErrorKind; 5] = [
    ErrorKind::Validation,
    ErrorKind::NotFound,
    ErrorKind::InvalidCredential,
    ErrorKind::Config,
    ErrorKind::Cancelled,
];

/// Per-attempt timeout, attempt budget, exponential backoff, and the error
/// kinds that are never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub activity_timeout: Duration,
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub max_interval: Duration,
    pub non_retryable: Vec<ErrorKind>,
}

impl RetryPolicy {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            activity_timeout: Duration::from_secs(config.activity_timeout_secs),
            max_attempts: config.max_attempts.max(1),
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            backoff_coefficient: config.backoff_coefficient.max(1.0),
            max_interval: Duration::from_millis(config.max_interval_ms),
            non_retryable: DEFAULT_NON_RETRYABLE.to_vec(),
        }
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based):
    /// `initial * coefficient^(attempt - 1)`, capped at `max_interval`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw_ms = self.initial_interval.as_millis() as f64 * self.backoff_coefficient.powi(exponent);
        let cap_ms = self.max_interval.as_millis() as f64;
        if !raw_ms.is_finite() || raw_ms >= cap_ms {
            return self.max_interval;
        }
        Duration::from_millis(raw_ms.round() as u64)
    }

    pub fn is_retryable(&self, err: &SiteflowError) -> bool {
        !self.non_retryable.contains(&err.kind())
    }

    /// Whether another attempt should follow failed attempt `attempt`.
    pub fn should_retry(&self, attempt: u32, err: &SiteflowError) -> bool {
        attempt < self.max_attempts && self.is_retryable(err)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_workflow_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.activity_timeout, Duration::from_secs(300));
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert_eq!(policy.max_interval, Duration::from_secs(30));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=7).map(|a| policy.backoff(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn credential_and_lookup_errors_are_final() {
        let policy = RetryPolicy::default();
        let invalid = SiteflowError::InvalidCredential {
            site_id: "s1".into(),
        };
        assert!(!policy.should_retry(1, &invalid));
        assert!(!policy.should_retry(1, &SiteflowError::NotFound("s1".into())));
        assert!(!policy.should_retry(1, &SiteflowError::Cancelled));

        let transient = SiteflowError::remote("503");
        assert!(policy.should_retry(1, &transient));
        assert!(policy.should_retry(4, &transient));
        assert!(!policy.should_retry(5, &transient));
        assert!(policy.should_retry(
            1,
            &SiteflowError::Timeout {
                duration: Duration::from_secs(1)
            }
        ));
    }
}
