//! HTTP client error types.

use crate::ContextError;
use bytes::Bytes;
use http::{HeaderName, StatusCode};
use std::error::Error as StdError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Boxed error used at the transport and hook boundaries.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Upper bound on the response body captured by a [`StatusError`].
pub const STATUS_ERROR_DATA_LIMIT: usize = 4 * 1024;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The request context was already done before the first attempt.
    #[error("context already has an error: {0}")]
    Context(#[source] ContextError),

    /// The request body could not be reopened for an attempt.
    #[error("failed to open request body on attempt {attempt}: {source}")]
    OpenBody {
        /// Attempt that needed the body (1-based).
        attempt: u32,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Body(#[source] BoxError),

    /// The request never reached the server.
    #[error("{0}")]
    Request(#[from] RequestError),

    /// The response had an unexpected status code.
    #[error("{0}")]
    Status(#[from] StatusError),

    /// The response had an unexpected `Content-*` header.
    #[error("{0}")]
    Content(#[from] ContentError),

    /// Attempts ran out after the error hook suppressed the last error.
    #[error("request failed after {attempts} attempts: {message}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message.
        message: String,
    },

    /// A transport could not be built.
    #[error("failed to build transport: {0}")]
    Transport(#[source] BoxError),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading a response body.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error produced by a caller-supplied hook.
    #[error("{0}")]
    Hook(#[source] BoxError),
}

/// Walk an error and its sources, descending into `io::Error` payloads.
fn chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    let mut next = Some(err);
    std::iter::from_fn(move || {
        let current = next?;
        next = match current.downcast_ref::<io::Error>().and_then(|e| e.get_ref()) {
            Some(inner) => Some(inner as &(dyn StdError + 'static)),
            None => current.source(),
        };
        Some(current)
    })
}

impl Error {
    /// Wrap a caller error, typically returned from a hook.
    pub fn hook(err: impl Into<BoxError>) -> Self {
        Self::Hook(err.into())
    }

    /// Check if this error was caused by a timeout.
    ///
    /// Recognizes context deadlines, elapsed tokio timers, `TimedOut` I/O
    /// errors, and transport timeouts anywhere in the source chain.
    pub fn is_timeout(&self) -> bool {
        chain(self).any(|err| {
            if let Some(ctx) = err.downcast_ref::<ContextError>() {
                return *ctx == ContextError::DeadlineExceeded;
            }
            if err.is::<tokio::time::error::Elapsed>() {
                return true;
            }
            if let Some(io) = err.downcast_ref::<io::Error>() {
                return io.kind() == io::ErrorKind::TimedOut;
            }
            if let Some(transport) = err.downcast_ref::<reqwest::Error>() {
                return transport.is_timeout();
            }
            if let Some(dial) = err.downcast_ref::<rebound_dial::DialError>() {
                return dial.is_timeout();
            }
            false
        })
    }

    /// Check if the connection was refused by the restricted dialer.
    pub fn is_restricted(&self) -> bool {
        chain(self).any(|err| {
            err.downcast_ref::<rebound_dial::DialError>()
                .is_some_and(|dial| dial.is_internal_resolution())
        })
    }

    /// The status error carried by this error, even when wrapped.
    pub fn status_error(&self) -> Option<&StatusError> {
        StatusError::find(self)
    }

    /// The HTTP status code, if this is a status error.
    pub fn status(&self) -> Option<StatusCode> {
        self.status_error().map(|e| e.status)
    }
}

/// Returned when the request fails to be done, i.e. the server is never
/// reached.
#[derive(Debug, Error)]
#[error("request failed: {source}")]
pub struct RequestError {
    source: BoxError,
}

impl RequestError {
    /// Wrap a transport error.
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self { source: err.into() }
    }

    /// The underlying transport error.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.source
    }

    /// Consume the error, returning the transport error.
    pub fn into_inner(self) -> BoxError {
        self.source
    }
}

/// An HTTP response carried a status code other than the one expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    /// Status code of the response.
    pub status: StatusCode,
    /// Status code that was expected, if a specific one was.
    pub expected: Option<StatusCode>,
    /// Leading bytes of the response body, whitespace-trimmed.
    pub data: Bytes,
}

impl StatusError {
    /// Create a status error without body data.
    pub fn new(status: StatusCode, expected: Option<StatusCode>) -> Self {
        Self {
            status,
            expected,
            data: Bytes::new(),
        }
    }

    /// Attach diagnostic body data, trimmed and capped at
    /// [`STATUS_ERROR_DATA_LIMIT`].
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        let mut data: Bytes = data.into();
        data.truncate(STATUS_ERROR_DATA_LIMIT);
        let start = data
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(data.len());
        let end = data
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(start, |i| i + 1);
        self.data = data.slice(start..end);
        self
    }

    /// Find a status error in `err` or anywhere in its source chain.
    pub fn find<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a StatusError> {
        chain(err).find_map(|e| e.downcast_ref::<StatusError>())
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = String::from_utf8_lossy(&self.data);
        match self.expected {
            Some(expected) => write!(
                f,
                "expected {} status code, but got {} ({:?})",
                expected.as_u16(),
                self.status.as_u16(),
                data
            ),
            None => write!(
                f,
                "unexpected {} status code ({:?})",
                self.status.as_u16(),
                data
            ),
        }
    }
}

impl StdError for StatusError {}

/// An HTTP response contained an unexpected `Content-*` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentError {
    /// Header that triggered the error.
    pub header: HeaderName,
    /// Value of the header in the response.
    pub value: String,
    /// Allowed or expected values for the header.
    pub allowed: Vec<String>,
}

impl ContentError {
    /// Create a content error. An empty `allowed` list means the header was
    /// expected to be absent.
    pub fn new<I, S>(header: HeaderName, value: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed: Vec<String> = allowed.into_iter().map(Into::into).collect();
        if allowed.is_empty() {
            allowed.push(String::new());
        }
        Self {
            header,
            value: value.into(),
            allowed,
        }
    }

    /// Find a content error in `err` or anywhere in its source chain.
    pub fn find<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a ContentError> {
        chain(err).find_map(|e| e.downcast_ref::<ContentError>())
    }
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.allowed.as_slice() {
            [only] => write!(
                f,
                "expected '{}' header to match '{}', but got '{}' instead",
                self.header, only, self.value
            ),
            allowed => write!(
                f,
                "expected '{}' header to match one of {:?}, but got '{}' instead",
                self.header, allowed, self.value
            ),
        }
    }
}

impl StdError for ContentError {}
