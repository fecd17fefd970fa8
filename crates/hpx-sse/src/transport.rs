//! HTTP transport abstraction for opening event streams.
//!
//! The connection driver only needs one capability from the network: send a
//! GET and hand back status, content type and a body stream as soon as the
//! headers arrive. [`SseTransport`] captures that; [`HttpTransport`] is the
//! default implementation on top of `reqwest`.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt, stream::BoxStream};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use url::Url;

use crate::{
    config::SseConfig,
    error::{BoxError, SseError, SseResult},
};

/// Media type every SSE response must carry.
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Body of a streaming response.
pub type ByteStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// A request for an event stream.
#[derive(Clone, Debug)]
pub struct StreamRequest {
    /// Target URL.
    pub url: Url,
    /// Request headers, including `Accept` and `Cache-Control`.
    pub headers: HeaderMap,
}

impl StreamRequest {
    /// Build a request with the SSE headers set.
    pub fn new(url: Url) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(EVENT_STREAM_MIME));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        Self { url, headers }
    }

    /// Merge extra headers. The SSE `Accept` and `Cache-Control` values are
    /// kept even if `extra` overrides them.
    #[must_use]
    pub fn with_headers(mut self, extra: &HeaderMap) -> Self {
        for (name, value) in extra {
            if name == header::ACCEPT || name == header::CACHE_CONTROL {
                continue;
            }
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }
}

/// Response returned once headers have been received.
pub struct StreamResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Raw `Content-Type` header value, if present.
    pub content_type: Option<String>,
    /// Response body, read incrementally.
    pub body: ByteStream,
}

impl StreamResponse {
    /// Create a response.
    pub fn new(status: StatusCode, content_type: Option<String>, body: ByteStream) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    /// Returns `true` if the content type is `text/event-stream`.
    pub fn is_event_stream(&self) -> bool {
        is_event_stream(self.content_type.as_deref())
    }
}

impl fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Compare the media type of a `Content-Type` value, ignoring parameters and
/// ASCII case.
pub(crate) fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(EVENT_STREAM_MIME))
}

/// Capability to open a streaming HTTP response.
#[async_trait]
pub trait SseTransport: Send + Sync + 'static {
    /// Send the request and return as soon as response headers are available.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached. Timeouts should be
    /// reported so that [`SseError::is_timeout`] returns `true`.
    async fn open(&self, request: StreamRequest) -> SseResult<StreamResponse>;
}

/// [`SseTransport`] backed by a `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from the client configuration.
    ///
    /// The underlying client has no overall request timeout, since event
    /// streams stay open indefinitely; the header wait is bounded by the
    /// connection driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SseConfig) -> SseResult<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| SseError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SseTransport for HttpTransport {
    async fn open(&self, request: StreamRequest) -> SseResult<StreamResponse> {
        let resp = self
            .client
            .get(request.url)
            .headers(request.headers)
            .send()
            .await?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp
            .bytes_stream()
            .map_err(|e| Box::new(e) as BoxError)
            .boxed();

        Ok(StreamResponse::new(status, content_type, body))
    }
}
