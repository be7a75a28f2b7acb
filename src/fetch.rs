//! Page fetching with timeout and optional exponential backoff.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`PageSource`]: Core trait returning the raw HTML behind a URL
//! - [`HttpFetcher`]: reqwest-backed implementation with a request timeout
//! - [`RetryFetch`]: Decorator that adds retry logic to any `PageSource`
//!
//! # Retry Strategy
//!
//! - Only network failures are retried; an unusable body is not
//! - Exponential backoff starting at the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::ScrapeError;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Anything that can turn a URL into HTML text.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the document at `url`.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::Network`] when the host is unreachable, the request
    ///   times out or the response status is not a success
    /// - [`ScrapeError::Parse`] when the body is empty or not UTF-8
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// Fetches pages over HTTP(S) with a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ScrapeError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Source returned non-success status");
            return Err(ScrapeError::Network(format!("{url} returned HTTP {status}")));
        }

        let bytes = response.bytes().await?;
        let body = String::from_utf8(bytes.to_vec())
            .map_err(|e| ScrapeError::Parse(format!("{url} returned a non-UTF-8 body: {e}")))?;
        if body.trim().is_empty() {
            return Err(ScrapeError::Parse(format!("{url} returned an empty body")));
        }

        info!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched source page"
        );
        debug!(preview = %truncate_for_log(&body, 200), "Body preview");
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`PageSource`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// With `max_retries = 0` the wrapper makes exactly one attempt.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: PageSource,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> PageSource for RetryFetch<T>
where
    T: PageSource,
{
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch() exhausted retries"
                        );
                        return Err(e);
                    }

                    let shift = (attempt - 1).min(16) as u32;
                    let delay = self
                        .base_delay
                        .saturating_mul(1u32 << shift)
                        .min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve;
    use axum::{Router, http::StatusCode, routing::get};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5), "scrape_headlines-test").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let page = get(|| async { "<html><body>hi</body></html>" });
        let base = serve(Router::new().route("/", page)).await;
        let body = fetcher().fetch(&format!("{base}/")).await.unwrap();
        assert!(body.contains("hi"));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_network_error() {
        let base = serve(Router::new().route(
            "/",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        ))
        .await;
        let err = fetcher().fetch(&format!("{base}/")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Network(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn test_fetch_empty_body_is_parse_error() {
        let base = serve(Router::new().route("/", get(|| async { "   " }))).await;
        let err = fetcher().fetch(&format!("{base}/")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_invalid_utf8_is_parse_error() {
        let base = serve(Router::new().route(
            "/",
            get(|| async { b"<p>\xff\xfe</p>".to_vec() }),
        ))
        .await;
        let err = fetcher().fetch(&format!("{base}/")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(ref m) if m.contains("UTF-8")));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_network_error() {
        let err = fetcher().fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Network(_)));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let base = serve(Router::new().route(
            "/",
            get(|| async {
                sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;
        let slow = HttpFetcher::new(Duration::from_millis(100), "test").unwrap();
        let err = slow.fetch(&format!("{base}/")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Network(_)));
    }

    /// Fails with the given error for the first `failures` calls.
    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
        error: ScrapeError,
    }

    #[async_trait]
    impl PageSource for Flaky {
        async fn fetch(&self, _url: &str) -> Result<String, ScrapeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok("<p>ok</p>".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_network_errors() {
        let flaky = Flaky {
            calls: AtomicUsize::new(0),
            failures: 2,
            error: ScrapeError::Network("reset".into()),
        };
        let retry = RetryFetch::new(flaky, 3, Duration::from_millis(1));
        assert_eq!(retry.fetch("http://x/").await.unwrap(), "<p>ok</p>");
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let flaky = Flaky {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
            error: ScrapeError::Network("refused".into()),
        };
        let retry = RetryFetch::new(flaky, 1, Duration::from_millis(1));
        assert!(retry.fetch("http://x/").await.is_err());
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_parse_errors() {
        let flaky = Flaky {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
            error: ScrapeError::Parse("empty".into()),
        };
        let retry = RetryFetch::new(flaky, 5, Duration::from_millis(1));
        assert!(matches!(retry.fetch("http://x/").await, Err(ScrapeError::Parse(_))));
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 1);
    }
}
