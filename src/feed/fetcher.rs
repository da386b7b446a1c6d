use crate::feed::document::DocumentError;
use crate::feed::parser::{parse_feed, ParseResult};
use crate::feed::types::FeedItem;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Longest free-form error text shown in a one-line diagnostic.
const MAX_DIAGNOSTIC_CHARS: usize = 30;

/// Browser-like identification; several publishers reject default client agents.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that can occur while fetching a single feed.
///
/// None of these are fatal to an aggregation run: [`FeedIngestor::fetch`]
/// turns every one of them into an empty item list plus a log line.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, invalid URL, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests
    #[error("Rate limited (HTTP 429)")]
    RateLimited,
    /// Server returned 404 Not Found
    #[error("Feed not found (HTTP 404)")]
    NotFound,
    /// Any other non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body was not well-formed XML
    #[error("Malformed feed: {0}")]
    Malformed(#[from] DocumentError),
}

impl FetchError {
    /// Short human-readable reason for progress output.
    ///
    /// Rate limiting and 404 get their own wording; free-form errors are cut
    /// to 30 characters.
    pub fn diagnostic(&self) -> String {
        match self {
            FetchError::Timeout => "Timeout".to_string(),
            FetchError::RateLimited => "Rate limited".to_string(),
            FetchError::NotFound => "404".to_string(),
            FetchError::HttpStatus(code) => format!("HTTP {code}"),
            FetchError::ResponseTooLarge => "Response too large".to_string(),
            FetchError::Malformed(_) => "Malformed XML".to_string(),
            FetchError::Network(e) => e.to_string().chars().take(MAX_DIAGNOSTIC_CHARS).collect(),
        }
    }

    /// True for failures worth retrying on a later run (timeouts, 429, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::RateLimited => true,
            FetchError::HttpStatus(code) => *code >= 500,
            _ => false,
        }
    }
}

/// HTTP client settings for [`FeedIngestor`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Fetches feeds and normalizes them into [`FeedItem`]s.
///
/// Holds no per-feed state: fetching the same document twice yields the same
/// items. Each call makes a single attempt; there are no retries.
#[derive(Debug, Clone)]
pub struct FeedIngestor {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedIngestor {
    /// Builds an ingestor with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Fails only if the client cannot be constructed, e.g. when the
    /// configured user agent is not a valid header value.
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()?;
        Ok(Self::with_client(client, settings.timeout))
    }

    /// Uses an existing client (allows custom configuration in tests).
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetches up to 10 normalized items from `url`. Never fails.
    ///
    /// `max_age_hours` is accepted for symmetry with the aggregation options
    /// but is not applied here; see [`crate::aggregate::filter_recent`].
    ///
    /// Every failure (timeout, HTTP error, malformed XML, network error)
    /// yields an empty list and a single warning log line.
    pub async fn fetch(&self, url: &str, max_age_hours: u64) -> Vec<FeedItem> {
        tracing::trace!(url = %url, max_age_hours, "Age cutoff is left to the caller");

        match self.try_fetch(url).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Feed skipped: {}", e.diagnostic());
                Vec::new()
            }
        }
    }

    /// Same pipeline as [`fetch`](Self::fetch), but reports why it failed.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] - No complete response within the timeout
    /// - [`FetchError::RateLimited`] - HTTP 429
    /// - [`FetchError::NotFound`] - HTTP 404
    /// - [`FetchError::HttpStatus`] - Any other non-2xx response
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded 10MB
    /// - [`FetchError::Malformed`] - Body is not well-formed XML
    /// - [`FetchError::Network`] - Connection, TLS or URL errors
    pub async fn try_fetch(&self, url: &str) -> Result<Vec<FeedItem>, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let ParseResult { shape, items } = parse_feed(&bytes)?;

        tracing::debug!(
            url = %url,
            shape = ?shape,
            items = items.len(),
            bytes = bytes.len(),
            "Feed parsed"
        );

        Ok(items)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    }
}

fn classify_request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify_request_error)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
