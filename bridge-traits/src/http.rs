//! HTTP Client Abstraction
//!
//! Provides async HTTP operations with byte-range requests and streaming
//! bodies, which the caching data source uses to pull media into the disk
//! cache.

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// Inclusive-start byte range for a `Range` request.
///
/// `length == None` requests everything from `start` to the end of the
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, length: Option<u64>) -> Self {
        Self { start, length }
    }

    /// Open-ended range starting at `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            start,
            length: None,
        }
    }

    /// Render as an HTTP `Range` header value (`bytes=start-end`).
    pub fn header_value(&self) -> String {
        match self.length {
            Some(len) if len > 0 => format!("bytes={}-{}", self.start, self.start + len - 1),
            _ => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length {
            Some(len) => write!(f, "[{}, {})", self.start, self.start + len),
            None => write!(f, "[{}, ..)", self.start),
        }
    }
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub range: Option<ByteRange>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            range: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response with a fully buffered body
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Streaming response handed out by [`HttpClient::download_stream`].
pub struct HttpStream {
    /// HTTP status code (`200` or `206` for a usable body).
    pub status: u16,
    /// Length of this body, when the server announced it.
    pub content_length: Option<u64>,
    /// Length of the whole resource, from `Content-Range` or, for a `200`,
    /// from `Content-Length`.
    pub total_length: Option<u64>,
    /// Body reader.
    pub body: Box<dyn AsyncRead + Send + Unpin>,
}

impl HttpStream {
    /// `true` when the server honoured the `Range` header.
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for HttpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStream")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("total_length", &self.total_length)
            .finish()
    }
}

/// Extract the total resource length from a `Content-Range` header value
/// such as `bytes 0-1199999/5000000`. Returns `None` for `*` totals.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Async HTTP client trait
///
/// Implementations should follow redirects (including http to https and
/// back), apply connect and read timeouts, and translate a `Range` on the
/// request into the matching header.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{ByteRange, HttpClient, HttpRequest};
///
/// async fn head_of_track(client: &dyn HttpClient, url: &str) -> Result<HttpStream> {
///     let request = HttpRequest::get(url).range(ByteRange::new(0, Some(1_200_000)));
///     client.download_stream(request).await
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute a request and buffer the full body.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute a request with a custom retry policy
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }

    /// Open a streaming body for `request`.
    ///
    /// Non-2xx statuses are reported as [`BridgeError::Http`].
    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStream>;
}
