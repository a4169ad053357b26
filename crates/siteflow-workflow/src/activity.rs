// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executes one activity under a [`RetryPolicy`].
//!
//! Every attempt is bounded by the policy's activity timeout. Failed attempts
//! are retried after an exponential backoff unless the error kind is listed as
//! non-retryable or the attempt budget is spent. Cancellation is observed
//! before each attempt and during backoff.

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use siteflow_core::SiteflowError;

use crate::policy::RetryPolicy;

/// Final failure of an activity after retries.
#[derive(Debug, Error)]
#[error("{source} (after {attempts} attempt(s))")]
pub struct ActivityError {
    pub attempts: u32,
    #[source]
    pub source: SiteflowError,
}

/// Run `attempt_fn` until it succeeds or the policy gives up.
///
/// `attempt_fn` receives the 1-based attempt number. On success returns the
/// value and the number of attempts used.
pub async fn execute_activity<T, F, Fut>(
    policy: &RetryPolicy,
    activity: &str,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> Result<(T, u32), ActivityError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SiteflowError>>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(ActivityError {
                attempts: attempt - 1,
                source: SiteflowError::Cancelled,
            });
        }

        let result = match tokio::time::timeout(policy.activity_timeout, attempt_fn(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(SiteflowError::Timeout {
                duration: policy.activity_timeout,
            }),
        };

        let err = match result {
            Ok(value) => {
                debug!(activity, attempt, "activity succeeded");
                return Ok((value, attempt));
            }
            Err(err) => err,
        };

        if !policy.should_retry(attempt, &err) {
            warn!(activity, attempt, error = %err, kind = %err.kind(), "activity failed");
            return Err(ActivityError {
                attempts: attempt,
                source: err,
            });
        }

        let delay = policy.backoff(attempt);
        warn!(
            activity,
            attempt,
            error = %err,
            retry_in_ms = delay.as_millis() as u64,
            "activity attempt failed, retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                return Err(ActivityError {
                    attempts: attempt,
                    source: SiteflowError::Cancelled,
                });
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use siteflow_core::ErrorKind;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            activity_timeout: Duration::from_secs(5),
            max_attempts: 4,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_secs(3),
            non_retryable: crate::policy::DEFAULT_NON_RETRYABLE.to_vec(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_with_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let (value, attempts) = execute_activity(&policy(), "users", &CancellationToken::new(), |attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Err(SiteflowError::remote("503"))
                } else {
                    Ok(attempt * 10)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 30);
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second.
        assert_eq!(started.elapsed().as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_attempt_budget() {
        let err = execute_activity(&policy(), "orders", &CancellationToken::new(), |_| async {
            Err::<(), _>(SiteflowError::remote("down"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(err.source.kind(), ErrorKind::Remote);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_fails_immediately() {
        let err = execute_activity(&policy(), "users", &CancellationToken::new(), |_| async {
            Err::<(), _>(SiteflowError::InvalidCredential {
                site_id: "s1".into(),
            })
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.source.kind(), ErrorKind::InvalidCredential);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_retries() {
        let (value, attempts) = execute_activity(&policy(), "users", &CancellationToken::new(), |attempt| async move {
            if attempt == 1 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok::<_, SiteflowError>(attempt)
        })
        .await
        .unwrap();
        assert_eq!((value, attempts), (2, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = execute_activity(&policy(), "users", &cancel, |_| async {
            Err::<(), _>(SiteflowError::remote("503"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err.source, SiteflowError::Cancelled));
        assert_eq!(err.attempts, 1);
    }
}
