//! @ai:module:intent Deadline- and jitter-aware retry of transient failures
//! @ai:module:layer infrastructure
//! @ai:module:public_api RetryPolicy, RetryError, RetryClassify, is_transient, parse_retry_after
//! @ai:module:stateless true

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Status codes that indicate rate limiting, overload or a gateway timeout.
pub const TRANSIENT_STATUS_CODES: [u16; 8] = [408, 425, 429, 500, 502, 503, 504, 529];

/// Lowercased message fragments of connect/handshake timeouts.
const TRANSIENT_MESSAGE_MARKERS: [&str; 4] = [
    "headers timeout",
    "cannot connect to api",
    "connect timeout",
    "handshake timeout",
];

const MAX_BACKOFF: Duration = Duration::from_millis(30_000);
const MAX_JITTER_MS: u64 = 250;
const DEADLINE_MARGIN: Duration = Duration::from_millis(100);

/// Obsolete HTTP-date forms still accepted by recipients: RFC 850 and asctime. Both are UTC.
const LEGACY_HTTP_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// @ai:intent Exposes what the transient-error predicate needs from a failure
pub trait RetryClassify: fmt::Display {
    /// @ai:intent HTTP-style status code associated with the failure, if any
    fn status_code(&self) -> Option<u16>;

    /// @ai:intent Raw value of the server's `retry-after` header, if any
    fn retry_after(&self) -> Option<&str> {
        None
    }
}

/// @ai:intent Decide whether a failure is likely to succeed on retry
/// @ai:effects pure
pub fn is_transient<E: RetryClassify + ?Sized>(err: &E) -> bool {
    if err
        .status_code()
        .map(|status| TRANSIENT_STATUS_CODES.contains(&status))
        .unwrap_or(false)
    {
        return true;
    }

    let message = err.to_string().to_lowercase();
    TRANSIENT_MESSAGE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// @ai:intent Parse a Retry-After header value as delay-seconds or an HTTP date (IMF-fixdate, RFC 850 or asctime)
/// @ai:post None when the value is neither form; dates in the past yield zero
/// @ai:effects pure
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let trimmed = value.trim();

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    parse_http_date(trimmed).map(|date| (date - now).to_std().unwrap_or(Duration::ZERO))
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    LEGACY_HTTP_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// @ai:intent Exponential backoff for the given 1-based attempt, capped at 30s
/// @ai:effects pure
pub fn backoff_for(attempt: u32, base: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// @ai:intent Wait before the next attempt, excluding jitter
/// @ai:effects pure
pub fn planned_wait(attempt: u32, base: Duration, server_retry_after: Option<Duration>) -> Duration {
    server_retry_after.unwrap_or_else(|| backoff_for(attempt, base))
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..MAX_JITTER_MS))
}

/// @ai:intent Failure of a retried operation
#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error("timed out before request could start")]
    DeadlineBeforeStart,

    #[error("request aborted after {0:?} deadline")]
    DeadlineExceeded(Duration),

    #[error("{0}")]
    Operation(E),
}

/// @ai:intent Retry settings shared by the deadline-bounded and deadline-free modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// @ai:intent Create a policy
    /// @ai:effects pure
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    fn wait_before_retry<E: RetryClassify>(&self, attempt: u32, err: &E) -> Duration {
        let server = err
            .retry_after()
            .and_then(|value| parse_retry_after(value, Utc::now()));
        planned_wait(attempt, self.base_backoff, server) + jitter()
    }

    /// @ai:intent Run `op` until it succeeds, fails permanently, or the deadline passes
    /// @ai:pre op honors the budget it is given; the attempt is dropped at the deadline regardless
    /// @ai:post at most max_retries + 1 calls; no call is made once the deadline has passed
    /// @ai:effects time
    pub async fn run_with_deadline<T, E, F, Fut>(
        &self,
        label: &str,
        deadline: Instant,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassify,
    {
        let mut attempt: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RetryError::DeadlineBeforeStart);
            }

            // Dropping the attempt future at the deadline cancels the in-flight request.
            let err = match tokio::time::timeout_at(deadline, op(remaining)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => {
                    tracing::warn!(label, attempt = attempt + 1, "attempt hit deadline");
                    return Err(RetryError::DeadlineExceeded(remaining));
                }
            };

            attempt += 1;
            if attempt > self.max_retries || !is_transient(&err) {
                return Err(RetryError::Operation(err));
            }

            let wait = self.wait_before_retry(attempt, &err);
            let remaining_now = deadline.saturating_duration_since(Instant::now());
            if remaining_now.is_zero() {
                return Err(RetryError::Operation(err));
            }
            let wait = wait.min(remaining_now.saturating_sub(DEADLINE_MARGIN));

            tracing::warn!(
                label,
                attempt,
                max_retries = self.max_retries,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );

            tokio::time::sleep(wait).await;
        }
    }

    /// @ai:intent Run `op` with the same classification and backoff but no deadline
    /// @ai:effects time
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassify,
    {
        let mut attempt: u32 = 0;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            attempt += 1;
            if attempt > self.max_retries || !is_transient(&err) {
                return Err(err);
            }

            let wait = self.wait_before_retry(attempt, &err);
            tracing::warn!(
                label,
                attempt,
                max_retries = self.max_retries,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "transient failure, retrying (no deadline)"
            );

            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct StubError {
        status: Option<u16>,
        message: &'static str,
        retry_after: Option<&'static str>,
    }

    impl StubError {
        fn unavailable() -> Self {
            Self {
                status: Some(503),
                message: "service unavailable",
                retry_after: None,
            }
        }

        fn unauthorized() -> Self {
            Self {
                status: Some(401),
                message: "bad key",
                retry_after: None,
            }
        }
    }

    impl fmt::Display for StubError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl RetryClassify for StubError {
        fn status_code(&self) -> Option<u16> {
            self.status
        }

        fn retry_after(&self) -> Option<&str> {
            self.retry_after
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(200))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_k_transient_failures() {
        let k = 3;
        let calls = AtomicU32::new(0);
        let deadline = Instant::now() + Duration::from_secs(60);

        let result = policy(k)
            .run_with_deadline("test", deadline, |_budget| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= k {
                        Err(StubError::unavailable())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), k + 1);
        assert_eq!(calls.load(Ordering::SeqCst), k + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_failure_propagates_when_retries_exhausted() {
        let k = 3;
        let calls = AtomicU32::new(0);
        let deadline = Instant::now() + Duration::from_secs(60);

        let result = policy(k - 1)
            .run_with_deadline("test", deadline, |_budget| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= k {
                        Err(StubError::unavailable())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Operation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), k);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let deadline = Instant::now() + Duration::from_secs(60);

        let result: Result<u32, _> = policy(5)
            .run_with_deadline("test", deadline, |_budget| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StubError::unauthorized()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Operation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_deadline_makes_no_call() {
        let calls = AtomicU32::new(0);
        let deadline = Instant::now();

        let result: Result<u32, RetryError<StubError>> = policy(3)
            .run_with_deadline("test", deadline, |_budget| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::DeadlineBeforeStart)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_is_cancelled_at_deadline() {
        let deadline = Instant::now() + Duration::from_secs(1);

        let result: Result<u32, RetryError<StubError>> = policy(3)
            .run_with_deadline("test", deadline, |budget| async move {
                assert!(budget <= Duration::from_secs(1));
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;

        assert!(matches!(result, Err(RetryError::DeadlineExceeded(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_shrinks_between_attempts() {
        let budgets = std::sync::Mutex::new(Vec::new());
        let deadline = Instant::now() + Duration::from_secs(10);

        let _ = policy(2)
            .run_with_deadline("test", deadline, |budget| {
                budgets.lock().unwrap().push(budget);
                async { Err::<u32, _>(StubError::unavailable()) }
            })
            .await;

        let budgets = budgets.into_inner().unwrap();
        assert_eq!(budgets.len(), 3);
        assert!(budgets[1] < budgets[0]);
        assert!(budgets[2] < budgets[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_free_mode_retries_transient_errors() {
        let calls = AtomicU32::new(0);

        let result = policy(2)
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 2 {
                        Err(StubError::unavailable())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_transient_classification() {
        for status in TRANSIENT_STATUS_CODES {
            let err = StubError {
                status: Some(status),
                message: "x",
                retry_after: None,
            };
            assert!(is_transient(&err), "status {status} should be transient");
        }

        assert!(!is_transient(&StubError::unauthorized()));

        let headers_timeout = StubError {
            status: None,
            message: "fetch failed: Headers Timeout Error",
            retry_after: None,
        };
        assert!(is_transient(&headers_timeout));

        let connect = StubError {
            status: None,
            message: "Cannot connect to API: refused",
            retry_after: None,
        };
        assert!(is_transient(&connect));
    }

    #[test]
    fn test_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("2", now), Some(Duration::from_millis(2000)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2099, 12, 31, 23, 59, 0).unwrap();
        let wait = parse_retry_after("Fri, 01 Jan 2100 00:00:00 GMT", now);
        assert_eq!(wait, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_retry_after_legacy_http_dates() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let rfc850 = parse_retry_after("Monday, 01-Jan-24 00:00:30 GMT", now);
        assert_eq!(rfc850, Some(Duration::from_secs(30)));

        let asctime = parse_retry_after("Mon Jan  1 00:01:00 2024", now);
        assert_eq!(asctime, Some(Duration::from_secs(60)));

        let past = parse_retry_after("Sunday, 06-Nov-94 08:49:37 GMT", now);
        assert_eq!(past, Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_after_past_date_clamps_to_zero() {
        let now = Utc::now();
        let wait = parse_retry_after("Thu, 01 Jan 1970 00:00:00 GMT", now);
        assert_eq!(wait, Some(Duration::ZERO));
    }

    #[test]
    fn test_unparseable_retry_after_falls_back_to_backoff() {
        let base = Duration::from_millis(200);
        let server = parse_retry_after("soon", Utc::now());
        assert_eq!(server, None);
        assert_eq!(planned_wait(3, base, server), Duration::from_millis(800));
        assert_eq!(
            planned_wait(3, base, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let base = Duration::from_millis(200);
        assert_eq!(backoff_for(1, base), Duration::from_millis(200));
        assert_eq!(backoff_for(2, base), Duration::from_millis(400));
        assert_eq!(backoff_for(10, base), Duration::from_millis(30_000));
        assert_eq!(backoff_for(64, base), Duration::from_millis(30_000));
    }
}
