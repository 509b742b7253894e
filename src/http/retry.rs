//! Retry policy for network operations and HTTP error classification.

use reqwest::StatusCode;
use std::time::Duration;

/// Maximum number of attempts for one network operation.
pub const MAX_RETRIES: usize = 3;

/// Delay before the first retry; doubled for every later one.
pub const BASE_DELAY_MS: u64 = 500;

/// Errors that should not be retried.
#[derive(Debug)]
pub enum NonRetryableError {
    /// Rate limit exceeded (HTTP 403 with rate limit message or 429)
    RateLimitExceeded(String),
    /// Authentication failed (HTTP 401)
    AuthenticationFailed(String),
    /// Resource not found (HTTP 404)
    NotFound(String),
    /// Forbidden access (HTTP 403 non-rate-limit)
    Forbidden(String),
    /// Other client errors that won't succeed on retry
    ClientError(String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::RateLimitExceeded(msg) => write!(
                f,
                "Rate limit exceeded: {}. Try again later or set GITHUB_TOKEN.",
                msg
            ),
            NonRetryableError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}. Check your GITHUB_TOKEN.", msg)
            }
            NonRetryableError::NotFound(msg) => write!(f, "Not found: {}", msg),
            NonRetryableError::Forbidden(msg) => {
                write!(f, "Access forbidden: {}. You may need authentication.", msg)
            }
            NonRetryableError::ClientError(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Delay to wait after the failed attempt number `attempt` (1-based):
/// `base`, `2 * base`, `4 * base`, ...
pub fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    base.saturating_mul(1u32 << exponent)
}

/// Classifies a status code as retryable (`Ok`) or not (`Err`).
pub fn classify_status(status: StatusCode) -> Result<(), NonRetryableError> {
    match status {
        StatusCode::UNAUTHORIZED => Err(NonRetryableError::AuthenticationFailed(
            "Invalid or missing authentication token".to_string(),
        )),
        StatusCode::FORBIDDEN => Err(NonRetryableError::Forbidden(
            "Access to this resource is forbidden".to_string(),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(NonRetryableError::RateLimitExceeded(
            "Too many requests".to_string(),
        )),
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(
            "The requested resource was not found".to_string(),
        )),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(format!(
            "HTTP {} error",
            s.as_u16()
        ))),
        // 5xx server errors are retryable
        _ => Ok(()),
    }
}

/// Classifies an error as retryable or non-retryable.
/// Errors without a status (connect failures, timeouts) are retryable.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    match error.status() {
        Some(StatusCode::FORBIDDEN) if error.to_string().contains("rate limit") => Err(
            NonRetryableError::RateLimitExceeded("API rate limit exceeded".to_string()),
        ),
        Some(status) => classify_status(status),
        None => Ok(()),
    }
}

/// Checks if an error from `error_for_status()` should be retried.
/// Returns the original error if retryable, or a user-friendly NonRetryableError if not.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_retryable_error_display() {
        let err = NonRetryableError::RateLimitExceeded("test".to_string());
        assert!(err.to_string().contains("Rate limit"));
        assert!(err.to_string().contains("GITHUB_TOKEN"));

        let err = NonRetryableError::NotFound("test".to_string());
        assert!(err.to_string().contains("Not found"));

        let err = NonRetryableError::ClientError("HTTP 400".to_string());
        assert!(err.to_string().contains("HTTP 400"));
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(2000));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            Err(NonRetryableError::NotFound(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED),
            Err(NonRetryableError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST),
            Err(NonRetryableError::ClientError(_))
        ));
        assert!(classify_status(StatusCode::BAD_GATEWAY).is_ok());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR).is_ok());
    }

    #[tokio::test]
    async fn test_classify_error_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(401)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let response = client.get(server.url()).send().await.unwrap();
        let err = response.error_for_status().unwrap_err();

        assert!(matches!(
            classify_error(&err),
            Err(NonRetryableError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_check_retryable_server_error_keeps_reqwest_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let response = client.get(server.url()).send().await.unwrap();
        let err = check_retryable(response.error_for_status().unwrap_err());

        assert!(err.downcast_ref::<NonRetryableError>().is_none());
        assert!(err.downcast_ref::<reqwest::Error>().is_some());
    }
}
