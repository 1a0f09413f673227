use std::future::Future;
use std::time::Duration;

use patchwise_core::ReviewerError;

/// Bounded exponential backoff for transient API failures.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use patchwise_core::ReviewerError;
/// use patchwise_review::retry::RetryPolicy;
///
/// let policy = RetryPolicy::new(3);
/// let err = ReviewerError::Network("reset".into());
/// assert_eq!(policy.delay_for(0, &err), Duration::from_millis(500));
/// assert_eq!(policy.delay_for(2, &err), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further one.
    pub base_delay: Duration,
    /// Ceiling for any single wait, including server-requested ones.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy with the default delays: 500ms doubling, capped at one minute.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }

    /// Policy that retries without sleeping.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// How long to wait before retry number `attempt` (zero-based).
    ///
    /// A `Retry-After` hint replaces the computed backoff.
    pub fn delay_for(&self, attempt: u32, err: &ReviewerError) -> Duration {
        let wanted = match err {
            ReviewerError::RateLimited {
                retry_after: Some(secs),
            } => Duration::from_secs(*secs),
            _ => self.base_delay.saturating_mul(2u32.saturating_pow(attempt)),
        };
        wanted.min(self.max_delay)
    }
}

/// Run `op`, retrying transient failures per `policy`.
///
/// Non-transient errors return immediately. After the budget is spent the
/// last error is returned.
///
/// # Errors
///
/// Whatever `op` last returned.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ReviewerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReviewerError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let wait = policy.delay_for(attempt, &err);
                tracing::warn!(
                    operation = what,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Map a non-success HTTP status to an error kind.
///
/// 401/403 are auth failures, 429 is rate limiting, 408 and 5xx are
/// transient; everything else goes through `other`.
///
/// # Examples
///
/// ```
/// use patchwise_core::ReviewerError;
/// use patchwise_review::retry::classify_status;
///
/// let err = classify_status(503, None, "unavailable".into(), ReviewerError::Llm);
/// assert!(err.is_transient());
/// let err = classify_status(400, None, "bad request".into(), ReviewerError::Llm);
/// assert!(matches!(err, ReviewerError::Llm(_)));
/// ```
pub fn classify_status(
    status: u16,
    retry_after: Option<u64>,
    detail: String,
    other: impl FnOnce(String) -> ReviewerError,
) -> ReviewerError {
    match status {
        401 | 403 => ReviewerError::Auth(format!("HTTP {status}: {detail}")),
        429 => ReviewerError::RateLimited { retry_after },
        408 | 500..=599 => ReviewerError::Network(format!("HTTP {status}: {detail}")),
        _ => other(format!("HTTP {status}: {detail}")),
    }
}

/// Read a `Retry-After` header given in seconds.
pub fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Classify a transport-level `reqwest` failure.
pub fn classify_transport(
    err: &reqwest::Error,
    other: impl FnOnce(String) -> ReviewerError,
) -> ReviewerError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ReviewerError::Network(err.to_string())
    } else {
        other(err.to_string())
    }
}
