//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Per-host concurrency limits
//! - Byte ceilings enforced while streaming
//! - Retry logic for transient failures
//! - Error classification

use crate::config::{Config, UserAgentConfig};
use crate::crawler::limiter::HostLimiter;
use crate::crawler::signal::StopSignal;
use crate::url::extract_host;
use reqwest::header::LOCATION;
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Redirect hops followed by one attempt
pub const MAX_REDIRECTS: usize = 5;

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("unexpected HTTP status {0}")]
    BadStatus(u16),

    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether another attempt may succeed
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Timeout | Retry |
    /// | Connection failure | Retry |
    /// | Other transport error | Retry |
    /// | HTTP 5xx | Retry |
    /// | HTTP 4xx and other statuses | Immediate |
    /// | Body over the byte ceiling | Immediate |
    /// | Cancelled | Immediate |
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::ConnectionFailed(_) | FetchError::Request(_) => true,
            FetchError::BadStatus(code) => (500..600).contains(code),
            FetchError::TooLarge { .. } | FetchError::Cancelled => false,
        }
    }

    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else if error.is_connect() {
            FetchError::ConnectionFailed(error.to_string())
        } else {
            FetchError::Request(error.to_string())
        }
    }
}

/// Limits applied to every fetch
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Concurrent requests allowed against one host
    pub max_host_conns: usize,
    /// Total attempts per fetch, including the first
    pub attempts: u32,
    /// Wait between attempts
    pub retry_backoff: Duration,
    /// Largest body accepted
    pub max_bytes: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_host_conns: 4,
            attempts: 3,
            retry_backoff: Duration::from_secs(5),
            max_bytes: 1024 * 1024,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total time allowed for one request, body included
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use fundwatch::config::UserAgentConfig;
/// use fundwatch::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "Fundwatch".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        // Redirects are followed by `Fetcher` so each hop takes its host's permit
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Bounded HTTP retrieval shared by the crawl workers and the ownership check
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    limiter: HostLimiter,
    options: FetchOptions,
    stop: StopSignal,
}

impl Fetcher {
    pub fn new(client: Client, options: FetchOptions, stop: StopSignal) -> Self {
        Self {
            client,
            limiter: HostLimiter::new(options.max_host_conns),
            options,
            stop,
        }
    }

    /// Builds a fetcher from the `[crawl]` and `[user-agent]` sections
    pub fn from_config(config: &Config, stop: StopSignal) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, config.crawl.request_timeout())?;
        let options = FetchOptions {
            max_host_conns: config.crawl.max_host_conns as usize,
            attempts: config.crawl.attempts,
            retry_backoff: config.crawl.retry_backoff(),
            max_bytes: config.crawl.max_bytes,
        };
        Ok(Self::new(client, options, stop))
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn limiter(&self) -> &HostLimiter {
        &self.limiter
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// Every request, redirect hops included, holds a permit for the host
    /// it is sent to. Permits are released before the backoff wait.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - The response body, at most `max_bytes` long
    /// * `Err(FetchError)` - The terminal error, or the last one once the
    ///   attempt budget is spent
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let attempts = self.options.attempts.max(1);
        let mut attempt = 1;

        loop {
            if self.stop.is_stopped() {
                return Err(FetchError::Cancelled);
            }

            let error = match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= attempts {
                return Err(error);
            }

            tracing::debug!(
                "Fetch attempt {}/{} for {} failed: {}",
                attempt,
                attempts,
                url,
                error
            );

            if !self.stop.sleep(self.options.retry_backoff).await {
                return Err(FetchError::Cancelled);
            }
            attempt += 1;
        }
    }

    async fn attempt(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut current = url.clone();

        for _ in 0..=MAX_REDIRECTS {
            let host = extract_host(&current)
                .ok_or_else(|| FetchError::Request(format!("{} has no host", current)))?;
            let Some(_permit) = self.limiter.acquire(&host).await else {
                return Err(FetchError::Cancelled);
            };

            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(FetchError::from_reqwest)?;

            let status = response.status();
            if status.is_redirection() {
                match redirect_target(&current, &response)? {
                    Some(next) => {
                        tracing::debug!("{} redirected to {}", current, next);
                        current = next;
                        continue;
                    }
                    None => return Err(FetchError::BadStatus(status.as_u16())),
                }
            }

            if !status.is_success() {
                return Err(FetchError::BadStatus(status.as_u16()));
            }

            return self.read_body(response).await;
        }

        Err(FetchError::Request(format!(
            "more than {} redirects from {}",
            MAX_REDIRECTS, url
        )))
    }

    async fn read_body(&self, mut response: Response) -> Result<Vec<u8>, FetchError> {
        let limit = self.options.max_bytes;

        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(FetchError::from_reqwest)? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

/// Resolves the `Location` of a redirect response against `from`
///
/// # Returns
///
/// * `Ok(Some(Url))` - The next http(s) URL to request
/// * `Ok(None)` - The response carries no `Location`
/// * `Err(FetchError)` - The location is unusable
fn redirect_target(from: &Url, response: &Response) -> Result<Option<Url>, FetchError> {
    let Some(location) = response.headers().get(LOCATION) else {
        return Ok(None);
    };

    let location = location
        .to_str()
        .map_err(|_| FetchError::Request(format!("unreadable redirect from {}", from)))?;
    let next = from
        .join(location)
        .map_err(|e| FetchError::Request(format!("bad redirect '{}': {}", location, e)))?;

    match next.scheme() {
        "http" | "https" => Ok(Some(next)),
        scheme => Err(FetchError::Request(format!(
            "redirect to unsupported scheme '{}'",
            scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        let client = build_http_client(&config, Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::ConnectionFailed("refused".into()).is_retryable());
        assert!(FetchError::Request("reset".into()).is_retryable());
        assert!(FetchError::BadStatus(500).is_retryable());
        assert!(FetchError::BadStatus(503).is_retryable());
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        assert!(!FetchError::BadStatus(404).is_retryable());
        assert!(!FetchError::BadStatus(429).is_retryable());
        assert!(!FetchError::TooLarge { limit: 10 }.is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_after_stop_is_cancelled() {
        let stop = StopSignal::new();
        stop.stop();
        let client = build_http_client(&create_test_config(), Duration::from_secs(1)).unwrap();
        let fetcher = Fetcher::new(client, FetchOptions::default(), stop);
        let url = Url::parse("http://127.0.0.1:9/funding.json").unwrap();
        assert_eq!(fetcher.fetch(&url).await, Err(FetchError::Cancelled));
    }
}
