//! HTTP client with built-in retry logic and error handling.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::retry::{BASE_DELAY_MS, MAX_RETRIES, NonRetryableError, backoff_delay, check_retryable};

/// HTTP client with built-in retry logic for network operations.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_delay: Duration,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    /// Request timeouts are whatever the wrapped client was built with.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }

    /// Overrides the first backoff delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Performs a GET request and returns the body as text.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}...", url);

        self.with_retry("GET", || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .context("Failed to send request")?;

            let response = response.error_for_status().map_err(check_retryable)?;

            response.text().await.context("Failed to read response body")
        })
        .await
    }

    /// Like [`HttpClient::get_text`], but a 404 yields `Ok(None)`.
    #[tracing::instrument(skip(self))]
    pub async fn get_text_optional(&self, url: &str) -> Result<Option<String>> {
        debug!("GET (optional) {}...", url);

        self.with_retry("GET optional", || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .context("Failed to send request")?;

            if response.status() == StatusCode::NOT_FOUND {
                debug!("{} does not exist", url);
                return Ok(None);
            }

            let response = response.error_for_status().map_err(check_retryable)?;
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;
            Ok(Some(body))
        })
        .await
    }

    /// Executes an async operation with retry and exponential backoff.
    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable_error(&e) {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }

                    if attempt < MAX_RETRIES {
                        let delay = backoff_delay(self.base_delay, attempt);
                        warn!(
                            "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                            operation_name,
                            attempt,
                            MAX_RETRIES,
                            e,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("{}: failed after {} attempts", operation_name, MAX_RETRIES)
        }))
    }
}

fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_client() -> HttpClient {
        HttpClient::new(Client::new()).with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_get_text_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/registry.json")
            .with_status(200)
            .with_body(r#"{"packages": {}}"#)
            .create_async()
            .await;

        let body = fast_client()
            .get_text(&format!("{}/registry.json", server.url()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body, r#"{"packages": {}}"#);
    }

    #[tokio::test]
    async fn test_get_text_not_found_fails_fast() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/registry.json")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let err = fast_client()
            .get_text(&format!("{}/registry.json", server.url()))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(err.downcast_ref::<NonRetryableError>().is_some());
    }

    #[tokio::test]
    async fn test_get_text_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/registry.json")
            .with_status(503)
            .expect(MAX_RETRIES)
            .create_async()
            .await;

        let result = fast_client()
            .get_text(&format!("{}/registry.json", server.url()))
            .await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_text_optional_missing() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/pkg/metadata.json")
            .with_status(404)
            .create_async()
            .await;

        let body = fast_client()
            .get_text_optional(&format!("{}/pkg/metadata.json", server.url()))
            .await
            .unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_get_text_optional_present() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/pkg/metadata.json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let body = fast_client()
            .get_text_optional(&format!("{}/pkg/metadata.json", server.url()))
            .await
            .unwrap();
        assert_eq!(body.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_with_retry_immediate_failure_on_non_retryable() {
        let client = fast_client();
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let result = client
            .with_retry("test", || {
                let count = call_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow::Error::from(NonRetryableError::NotFound(
                        "not found".to_string(),
                    )))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_retries_on_network_error() {
        let client = fast_client();
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let result = client
            .with_retry("test", || {
                let count = call_count_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst);
                    if current < 2 {
                        Err::<&str, _>(anyhow::anyhow!("connection reset"))
                    } else {
                        Ok("success after retries")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success after retries");
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }
}
