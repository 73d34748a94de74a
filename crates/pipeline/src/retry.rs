//! Retry accounting and the per-attempt deadline shared by both processors.
//!
//! `retry_count` counts attempts that followed a failure. It is bumped when such
//! an attempt is claimed, never when the failure is recorded. The attempt that
//! just ran has therefore seen `retry_count + 1` failures when it fails, and it
//! is terminal once that reaches `max_retries`.

use std::future::Future;
use std::time::Duration;

use lingoforge_generation::GenerationError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// `retry_count` an attempt carries once claimed.
    pub fn claimed_retry_count(retry_count: u32, follows_failure: bool) -> u32 {
        if follows_failure {
            retry_count.saturating_add(1)
        } else {
            retry_count
        }
    }

    /// Whether another attempt is allowed after an attempt claimed with
    /// `retry_count` has failed.
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count.saturating_add(1) < self.max_retries
    }

    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        !self.should_retry(retry_count)
    }
}

/// Race `fut` against `deadline`. Expiry is reported as [`GenerationError::Timeout`],
/// indistinguishable from any other generation failure for retry purposes.
pub async fn with_timeout<T, F>(deadline: Duration, fut: F) -> Result<T, GenerationError>
where
    F: Future<Output = Result<T, GenerationError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_failures_exhaust_a_budget_of_three() {
        let policy = RetryPolicy::new(3);

        // first attempt
        assert!(policy.should_retry(0));
        // retry after one failure
        assert!(policy.should_retry(RetryPolicy::claimed_retry_count(0, true)));
        // retry after two failures
        assert!(policy.is_exhausted(RetryPolicy::claimed_retry_count(1, true)));
    }

    #[test]
    fn zero_budget_still_allows_one_attempt_and_no_retry() {
        let policy = RetryPolicy::new(0);
        assert!(policy.is_exhausted(0));
    }

    #[test]
    fn claim_only_bumps_after_failure() {
        assert_eq!(RetryPolicy::claimed_retry_count(2, false), 2);
        assert_eq!(RetryPolicy::claimed_retry_count(2, true), 3);
        assert_eq!(RetryPolicy::claimed_retry_count(u32::MAX, true), u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_reports_timeout() {
        let result: Result<(), _> = with_timeout(
            Duration::from_secs(90),
            std::future::pending::<Result<(), GenerationError>>(),
        )
        .await;
        assert_eq!(result, Err(GenerationError::Timeout(Duration::from_secs(90))));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_future_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async {
            Err::<(), _>(GenerationError::Failed("nope".into()))
        })
        .await;
        assert_eq!(result, Err(GenerationError::Failed("nope".into())));
    }
}
