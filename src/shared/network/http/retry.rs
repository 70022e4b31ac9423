use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

use super::config::RetryArgs;
use crate::shared::network::TransportFailure;

/// Retries an HTTP round-trip when it fails below the HTTP layer.
///
/// Attempts are counted locally per call, so one instance can be shared by
/// any number of concurrent segment workers. Retries happen immediately,
/// there is no backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryTransport {
    max_attempts: u32,
}

impl RetryTransport {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Runs `attempt` until it succeeds, fails with a non-transport error, or
    /// `max_attempts` additional attempts have failed. The last error is returned.
    pub async fn execute<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransportFailure + Display,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(retries, "Request succeeded after retrying.");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transport() && retries < self.max_attempts => {
                    retries += 1;
                    warn!(
                        error = %err,
                        "Network error, retrying HTTP request {retries}/{}...",
                        self.max_attempts
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl From<RetryArgs> for RetryTransport {
    fn from(args: RetryArgs) -> Self {
        Self::new(args.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Refused(u32),
        Status(u16),
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl TransportFailure for FakeError {
        fn is_transport(&self) -> bool {
            matches!(self, FakeError::Refused(_))
        }
    }

    #[tokio::test]
    async fn test_persistent_transport_failure_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let transport = RetryTransport::new(3);
        let result: Result<(), FakeError> = transport
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(FakeError::Refused(n))
            })
            .await;
        // one initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result, Err(FakeError::Refused(4)));
    }

    #[tokio::test]
    async fn test_success_on_second_attempt_stops_retrying() {
        let calls = AtomicU32::new(0);
        let transport = RetryTransport::new(3);
        let result = transport
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 { Err(FakeError::Refused(n)) } else { Ok(n) }
            })
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_status_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let transport = RetryTransport::new(3);
        let result: Result<(), FakeError> = transport
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Status(500))
            })
            .await;
        assert_eq!(result, Err(FakeError::Status(500)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_means_single_try() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = RetryTransport::new(0)
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Refused(1))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
