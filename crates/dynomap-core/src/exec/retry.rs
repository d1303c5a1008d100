//! Retry with exponential backoff under a wall-clock budget.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dynomap_model::{DynamoDBError, DynamoDBErrorCode, DynamoDBOperation};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::MapperConfig;
use crate::error::{MapperError, MapperResult};

/// Longest single blocking sleep between cancellation checks.
const BLOCKING_SLICE: Duration = Duration::from_millis(50);

/// Decides which store errors are retried and how long to wait.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total time to keep retrying one call.
    pub timeout: Duration,
    /// Delay before the first retry.
    pub base_backoff: Duration,
    /// Upper bound of a single delay.
    pub max_backoff: Duration,
    /// Client errors that are still retried.
    pub retry_on: Vec<DynamoDBErrorCode>,
}

impl RetryPolicy {
    /// The policy configured on a mapper.
    #[must_use]
    pub fn from_config(config: &MapperConfig) -> Self {
        Self {
            timeout: config.max_retry_timeout,
            base_backoff: config.base_backoff,
            max_backoff: config.max_backoff,
            retry_on: config.retry_on_error_codes.clone(),
        }
    }

    /// Delay before retry number `attempt` (zero based): the base doubled per
    /// attempt, capped at `max_backoff`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// Server errors are always transient. Client errors only when listed.
    #[must_use]
    pub fn is_transient(&self, err: &DynamoDBError) -> bool {
        !err.is_client_error() || self.retry_on.contains(&err.code)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&MapperConfig::default())
    }
}

/// Inspects each failure before it is classified. Returning `false`
/// propagates the error without retrying.
pub type ErrorFilter = Arc<dyn Fn(&DynamoDBError) -> bool + Send + Sync>;

/// Per-call adjustments to the retry loop.
#[derive(Clone, Default)]
pub struct ExecOptions {
    /// Codes propagated on first sight, even when the policy would retry them.
    pub rethrow: Vec<DynamoDBErrorCode>,
    /// Optional inspection hook.
    pub filter: Option<ErrorFilter>,
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("rethrow", &self.rethrow)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl ExecOptions {
    /// Options rethrowing the given codes.
    #[must_use]
    pub fn rethrow(codes: impl IntoIterator<Item = DynamoDBErrorCode>) -> Self {
        Self {
            rethrow: codes.into_iter().collect(),
            filter: None,
        }
    }

    /// Install an inspection hook.
    #[must_use]
    pub fn with_filter(
        mut self,
        filter: impl Fn(&DynamoDBError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    fn propagates(&self, policy: &RetryPolicy, err: &DynamoDBError) -> bool {
        if self.filter.as_ref().is_some_and(|filter| !filter(err)) {
            return true;
        }
        self.rethrow.contains(&err.code) || !policy.is_transient(err)
    }
}

/// Sleep unless the token fires first.
pub async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> MapperResult<()> {
    tokio::select! {
        () = cancel.cancelled() => Err(MapperError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Run `call` until it succeeds, fails with a non-transient error, or the
/// policy's budget is spent.
pub async fn exec<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    options: &ExecOptions,
    op: DynamoDBOperation,
    mut call: F,
) -> MapperResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DynamoDBError>>,
{
    let started = tokio::time::Instant::now();
    let mut attempt = 0_u32;
    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if options.propagates(policy, &err) {
            return Err(MapperError::Store(err));
        }
        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            return Err(MapperError::Timeout {
                elapsed,
                source: err,
            });
        }
        let delay = policy.backoff(attempt).min(policy.timeout - elapsed);
        warn!(operation = %op, attempt, ?delay, error = %err, "retrying transient failure");
        sleep_or_cancel(cancel, delay).await?;
        attempt += 1;
    }
}

/// The blocking twin of [`exec`]. Sleeps on the calling thread and checks the
/// token between slices of the backoff.
pub fn exec_blocking<T, F>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    options: &ExecOptions,
    op: DynamoDBOperation,
    mut call: F,
) -> MapperResult<T>
where
    F: FnMut() -> Result<T, DynamoDBError>,
{
    let started = std::time::Instant::now();
    let mut attempt = 0_u32;
    loop {
        let err = match call() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if options.propagates(policy, &err) {
            return Err(MapperError::Store(err));
        }
        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            return Err(MapperError::Timeout {
                elapsed,
                source: err,
            });
        }
        let delay = policy.backoff(attempt).min(policy.timeout - elapsed);
        warn!(operation = %op, attempt, ?delay, error = %err, "retrying transient failure");
        let wake = std::time::Instant::now() + delay;
        loop {
            if cancel.is_cancelled() {
                return Err(MapperError::Cancelled);
            }
            let now = std::time::Instant::now();
            if now >= wake {
                break;
            }
            std::thread::sleep((wake - now).min(BLOCKING_SLICE));
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn policy(timeout: Duration) -> RetryPolicy {
        RetryPolicy {
            timeout,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            retry_on: crate::config::DEFAULT_RETRY_ON_ERROR_CODES.to_vec(),
        }
    }

    #[test]
    fn test_should_double_backoff_up_to_cap() {
        let policy = policy(Duration::from_secs(60));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(10), Duration::from_secs(2));
        assert_eq!(policy.backoff(40), Duration::from_secs(2));
    }

    #[test]
    fn test_should_classify_transient_errors() {
        let policy = policy(Duration::from_secs(60));
        assert!(policy.is_transient(&DynamoDBError::throttling("slow")));
        assert!(policy.is_transient(&DynamoDBError::resource_in_use("busy")));
        assert!(policy.is_transient(&DynamoDBError::internal_error("boom")));
        assert!(!policy.is_transient(&DynamoDBError::validation("bad")));
        assert!(!policy.is_transient(&DynamoDBError::conditional_check_failed("no")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_not_retry_non_transient_errors() {
        let calls = AtomicUsize::new(0);
        let result: MapperResult<()> = exec(
            &policy(Duration::from_secs(60)),
            &CancellationToken::new(),
            &ExecOptions::default(),
            DynamoDBOperation::PutItem,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DynamoDBError::validation("bad")) }
            },
        )
        .await;
        assert!(matches!(result, Err(MapperError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_time_out_on_persistent_throttling() {
        let calls = AtomicUsize::new(0);
        let result: MapperResult<()> = exec(
            &policy(Duration::from_secs(5)),
            &CancellationToken::new(),
            &ExecOptions::default(),
            DynamoDBOperation::Query,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DynamoDBError::throttling("slow down")) }
            },
        )
        .await;
        let Err(MapperError::Timeout { elapsed, source }) = result else {
            panic!("expected a timeout");
        };
        assert!(elapsed >= Duration::from_secs(5));
        assert_eq!(source.code, DynamoDBErrorCode::ThrottlingException);
        assert!(calls.load(Ordering::SeqCst) > 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_recover_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = exec(
            &policy(Duration::from_secs(60)),
            &CancellationToken::new(),
            &ExecOptions::default(),
            DynamoDBOperation::GetItem,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DynamoDBError::service_unavailable("down"))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_rethrow_listed_codes_and_filtered_errors() {
        let options = ExecOptions::rethrow([DynamoDBErrorCode::ResourceInUseException]);
        let result: MapperResult<()> = exec(
            &policy(Duration::from_secs(60)),
            &CancellationToken::new(),
            &options,
            DynamoDBOperation::CreateTable,
            || async { Err(DynamoDBError::resource_in_use("exists")) },
        )
        .await;
        assert_eq!(
            result.unwrap_err().store_code(),
            Some(DynamoDBErrorCode::ResourceInUseException)
        );

        let options = ExecOptions::default()
            .with_filter(|e| e.code != DynamoDBErrorCode::ThrottlingException);
        let result: MapperResult<()> = exec(
            &policy(Duration::from_secs(60)),
            &CancellationToken::new(),
            &options,
            DynamoDBOperation::Scan,
            || async { Err(DynamoDBError::throttling("slow")) },
        )
        .await;
        assert!(matches!(result, Err(MapperError::Store(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_abort_backoff_on_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: MapperResult<()> = exec(
            &policy(Duration::from_secs(60)),
            &cancel,
            &ExecOptions::default(),
            DynamoDBOperation::Scan,
            || async { Err(DynamoDBError::throttling("slow")) },
        )
        .await;
        assert!(matches!(result, Err(MapperError::Cancelled)));
    }

    #[test]
    fn test_should_retry_blocking_calls_until_success() {
        let mut calls = 0;
        let policy = RetryPolicy {
            base_backoff: Duration::from_millis(1),
            ..policy(Duration::from_secs(5))
        };
        let result = exec_blocking(
            &policy,
            &CancellationToken::new(),
            &ExecOptions::default(),
            DynamoDBOperation::PutItem,
            || {
                calls += 1;
                if calls < 3 {
                    Err(DynamoDBError::throttling("slow"))
                } else {
                    Ok(calls)
                }
            },
        );
        assert_eq!(result.unwrap(), 3);
    }
}
