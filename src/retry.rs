//! Retrying calls the platform rejects while a resource is busy.
//!
//! Creating or attaching a resource often fails with a conflict while a
//! dependency is still being provisioned, or with throttling under load.
//! [`retry_until_available`] repeats such a call until it goes through.

use std::future::Future;

use thiserror::Error;
use tokio::time::timeout_at;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::clock::{after, pause_until, Pause};
use crate::config::WaitConfig;
use crate::error::{BoxError, WaitError};

/// Errors that may succeed if the call is repeated.
pub trait Transient {
    /// Whether repeating the call could succeed.
    fn is_transient(&self) -> bool;
}

/// A non-success response from the platform's HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("API returned status {status}: {message}")]
pub struct ApiError {
    /// The HTTP status code.
    pub status: u16,
    /// The error message from the response body.
    pub message: String,
}

impl ApiError {
    /// Create an API error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Whether the API reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl Transient for ApiError {
    fn is_transient(&self) -> bool {
        matches!(self.status, 409 | 429 | 500 | 502 | 503 | 504)
    }
}

/// Call `op` until it succeeds, retrying transient failures.
///
/// Transient errors are retried every `config.poll_interval` until
/// `config.timeout` elapses, after which the last one is returned as
/// [`WaitError::RetriesExhausted`]. Any other error is returned as
/// [`WaitError::Read`] straight away.
#[instrument(skip(config, cancel, op))]
pub async fn retry_until_available<T, E, F, Fut>(
    resource: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Into<BoxError>,
{
    config.validate()?;
    let deadline = after(config.timeout);
    let cancelled = || WaitError::Cancelled {
        resource: resource.to_string(),
    };
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            result = timeout_at(deadline, op()) => match result {
                Ok(result) => result,
                Err(_) => {
                    return Err(WaitError::Timeout {
                        resource: resource.to_string(),
                        timeout: config.timeout,
                        last_state: None,
                        attempts,
                    })
                },
            },
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => err,
            Err(err) => {
                return Err(WaitError::Read {
                    resource: resource.to_string(),
                    source: err.into(),
                })
            },
        };

        let source: BoxError = err.into();
        debug!(attempt = attempts, error = %source, "Transient failure, retrying");

        match pause_until(cancel, after(config.poll_interval), deadline).await {
            Pause::Resume => {},
            Pause::Cancelled => return Err(cancelled()),
            Pause::Expired => {
                warn!(attempts, error = %source, "Giving up after repeated transient failures");
                return Err(WaitError::RetriesExhausted {
                    resource: resource.to_string(),
                    attempts,
                    source,
                });
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn config() -> WaitConfig {
        WaitConfig::new(Duration::from_secs(2), Duration::from_secs(10))
    }

    #[test]
    fn test_transient_statuses() {
        for status in [409, 429, 500, 502, 503, 504] {
            assert!(ApiError::new(status, "busy").is_transient(), "{}", status);
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!ApiError::new(status, "no").is_transient(), "{}", status);
        }
        assert!(ApiError::new(404, "gone").is_not_found());
        assert_eq!(
            ApiError::new(409, "conflict").to_string(),
            "API returned status 409: conflict"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let value = assert_ok!(
            retry_until_available("nat gateway", &config(), &CancellationToken::new(), || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call < 3 {
                        Err(ApiError::new(409, "subnet is not available yet"))
                    } else {
                        Ok("nat-1")
                    }
                }
            })
            .await
        );

        assert_eq!(value, "nat-1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let err = assert_err!(
            retry_until_available("volume", &config(), &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::new(400, "invalid size")) }
            })
            .await
        );

        assert!(err.is_read_error());
        assert!(err.to_string().contains("invalid size"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_timeout() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let err = assert_err!(
            retry_until_available("volume", &config(), &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::new(503, "maintenance")) }
            })
            .await
        );

        match err {
            WaitError::RetriesExhausted {
                attempts, source, ..
            } => {
                assert_eq!(attempts, 5);
                assert!(source.to_string().contains("maintenance"));
            },
            other => panic!("expected retries exhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_is_cut_off_at_deadline() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let err = assert_err!(
            retry_until_available("volume", &config(), &CancellationToken::new(), || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call == 1 {
                        Err(ApiError::new(429, "slow down"))
                    } else {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(())
                    }
                }
            })
            .await
        );

        match err {
            WaitError::Timeout {
                attempts,
                last_state,
                ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_state, None);
            },
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_is_rejected() {
        let config = config().with_timeout(Duration::MAX);

        let err = assert_err!(
            retry_until_available("volume", &config, &CancellationToken::new(), || async {
                Ok::<_, ApiError>(())
            })
            .await
        );
        assert!(matches!(err, WaitError::Configuration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        let err = assert_err!(
            retry_until_available("volume", &config(), &token, || async {
                Ok::<_, ApiError>(())
            })
            .await
        );
        assert!(err.is_cancelled());
    }
}
