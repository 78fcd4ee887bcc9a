//! HTTP response wrapper.
//!
//! Every body received from a transport is wrapped in a [`ResponseBody`]. It
//! remembers whether the stream reached its end, and [`ResponseBody::close`]
//! drains a bounded amount of unread data so the connection can go back to
//! the pool instead of being torn down.

use crate::context::Context as CallContext;
use crate::error::{ContentError, STATUS_ERROR_DATA_LIMIT, StatusError};
use crate::retry_after::{RetryAfterError, parse_retry_after};
use crate::transport::BodyStream;
use crate::Result;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use http::{HeaderMap, HeaderName, StatusCode, Version};
use serde::de::DeserializeOwned;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Maximum number of unread bytes drained when a body is closed early.
///
/// Chunks are pulled whole, so the chunk that crosses the limit is the last
/// one read.
pub const DRAIN_LIMIT: usize = 16 * 1024;

/// A response body stream that tracks end-of-stream.
pub struct ResponseBody {
    inner: Option<BodyStream>,
    eof: bool,
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("eof", &self.eof)
            .field("closed", &self.inner.is_none())
            .finish()
    }
}

impl ResponseBody {
    /// Wrap a body stream.
    pub fn new(stream: BodyStream) -> Self {
        Self {
            inner: Some(stream),
            eof: false,
        }
    }

    /// A body with no content.
    pub fn empty() -> Self {
        Self {
            inner: None,
            eof: true,
        }
    }

    /// Whether the end of the stream has been observed.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read the next chunk, or `None` at end of stream.
    pub async fn chunk(&mut self) -> io::Result<Option<Bytes>> {
        self.next().await.transpose()
    }

    /// Read the remaining body into memory.
    pub async fn bytes(mut self) -> io::Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Read the remaining body as UTF-8 text, replacing invalid sequences.
    pub async fn text(self) -> io::Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Deserialize the remaining body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Release the body.
    ///
    /// When the end of the stream was not observed, chunks are read and
    /// discarded until [`DRAIN_LIMIT`] bytes have been seen. Errors while
    /// draining are ignored; the stream is dropped either way.
    pub async fn close(&mut self) {
        let Some(mut stream) = self.inner.take() else {
            return;
        };
        if self.eof {
            return;
        }

        let mut drained = 0usize;
        while drained < DRAIN_LIMIT {
            match stream.next().await {
                Some(Ok(chunk)) => drained += chunk.len(),
                Some(Err(_)) => break,
                None => {
                    self.eof = true;
                    break;
                }
            }
        }
        trace!(drained, eof = self.eof, "Closed response body");
    }

    /// Drop the stream without draining it.
    pub(crate) fn discard(&mut self) {
        self.inner = None;
    }
}

impl Stream for ResponseBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(stream) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match stream.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.eof = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// HTTP response.
///
/// The caller owns the response and should call [`close`](Self::close) or
/// consume the body when done with it.
///
/// A response returned by the client keeps the request's context: once it is
/// done, [`close`](Self::close) and the status error helpers stop reading.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    url: Url,
    body: ResponseBody,
    context: CallContext,
}

impl Response {
    /// Build a response from a transport response.
    ///
    /// The final URL is taken from the response extensions when the transport
    /// recorded one, otherwise `url` is used.
    pub fn from_http(response: http::Response<BodyStream>, url: &Url) -> Self {
        let (mut parts, body) = response.into_parts();
        let url = parts.extensions.remove::<Url>().unwrap_or_else(|| url.clone());
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            url,
            body: ResponseBody::new(body),
            context: CallContext::new(),
        }
    }

    /// Bound body reads made through this response by `context`.
    pub(crate) fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    /// The context bounding [`close`](Self::close).
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response was a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Check if the response was a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the final response URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the content length if available.
    pub fn content_length(&self) -> Option<u64> {
        self.header(CONTENT_LENGTH).and_then(|v| v.parse().ok())
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    /// The delay requested by the `Retry-After` header.
    ///
    /// A missing header yields a zero delay.
    pub fn retry_after(&self) -> std::result::Result<Duration, RetryAfterError> {
        match self.headers.get(RETRY_AFTER) {
            None => Ok(Duration::ZERO),
            Some(value) => match value.to_str() {
                Ok(value) => parse_retry_after(value),
                Err(_) => Err(RetryAfterError::InvalidDate {
                    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                }),
            },
        }
    }

    /// Borrow the body.
    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    /// Consume the response, returning the body.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Read the body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        Ok(self.body.bytes().await?)
    }

    /// Read the body as text.
    pub async fn text(self) -> Result<String> {
        Ok(self.body.text().await?)
    }

    /// Deserialize the body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        self.body.json().await
    }

    /// Drain and release the body.
    ///
    /// Draining stops early when the response's context is done.
    pub async fn close(&mut self) {
        tokio::select! {
            _ = self.body.close() => {}
            _ = self.context.done() => {}
        }
        self.body.discard();
    }

    /// Read up to `limit` leading body bytes, giving up with what was read
    /// so far when the context is done.
    pub(crate) async fn leading_bytes(&mut self, limit: usize) -> Bytes {
        let mut buf = BytesMut::new();
        while buf.len() < limit {
            let next = tokio::select! {
                chunk = self.body.chunk() => chunk,
                _ = self.context.done() => break,
            };
            match next {
                Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                Ok(None) | Err(_) => break,
            }
        }
        buf.truncate(limit);
        buf.freeze()
    }

    /// Turn a 4xx or 5xx response into a [`StatusError`].
    ///
    /// The error carries the leading bytes of the body. The response is closed
    /// before the error is returned.
    pub async fn error_for_status(self) -> Result<Self> {
        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(self.into_status_error(None).await.into());
        }
        Ok(self)
    }

    /// Turn any response whose status is not `expected` into a
    /// [`StatusError`].
    pub async fn expect_status(self, expected: StatusCode) -> Result<Self> {
        if self.status != expected {
            return Err(self.into_status_error(Some(expected)).await.into());
        }
        Ok(self)
    }

    /// Build a [`StatusError`] from this response and close it.
    pub async fn into_status_error(mut self, expected: Option<StatusCode>) -> StatusError {
        let data = self.leading_bytes(STATUS_ERROR_DATA_LIMIT).await;
        self.close().await;
        StatusError::new(self.status, expected).with_data(data)
    }

    /// Check a `Content-*` header against a list of allowed media values.
    ///
    /// Only the part before any `;` parameter is compared, case-insensitively.
    /// An empty `allowed` list requires the header to be absent.
    pub fn ensure_header(
        &self,
        header: HeaderName,
        allowed: &[&str],
    ) -> std::result::Result<(), ContentError> {
        let value = self.header(&header).unwrap_or_default();
        let media = value.split(';').next().unwrap_or_default().trim();

        let ok = if allowed.is_empty() {
            media.is_empty()
        } else {
            allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(media))
        };

        if ok {
            Ok(())
        } else {
            Err(ContentError::new(header, value, allowed.iter().copied()))
        }
    }
}
