//! Caller hooks invoked by the executor.

use crate::context::Context;
use crate::{Error, Response};
use async_trait::async_trait;
use http::Method;
use std::sync::Arc;
use url::Url;

/// What a hook knows about the attempt that triggered it.
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Request method.
    pub method: &'a Method,
    /// Request URL.
    pub url: &'a Url,
    /// Cancellation context of the call.
    pub context: &'a Context,
}

/// Called with every transport error before retry classification.
///
/// Returning `None` suppresses the error and the attempt is retried.
/// Returning an error (the original or a replacement) lets the executor
/// classify it: timeouts are retried, anything else ends the call.
pub type ErrorHook = Arc<dyn Fn(&AttemptContext<'_>, Error) -> Option<Error> + Send + Sync>;

/// Called with every non-2xx response before status-based retry
/// classification.
///
/// Returning an error ends the call with that error; the response is closed
/// by the executor. Returning `None` lets normal classification continue.
#[async_trait]
pub trait ErrorResponseHook: Send + Sync {
    /// Inspect a non-2xx response.
    async fn on_error_response(
        &self,
        attempt: &AttemptContext<'_>,
        response: &mut Response,
    ) -> Option<Error>;
}

#[async_trait]
impl<F> ErrorResponseHook for F
where
    F: Fn(&AttemptContext<'_>, &Response) -> Option<Error> + Send + Sync,
{
    async fn on_error_response(
        &self,
        attempt: &AttemptContext<'_>,
        response: &mut Response,
    ) -> Option<Error> {
        self(attempt, response)
    }
}

/// An error-response hook that turns every non-2xx response into a
/// [`StatusError`](crate::StatusError) carrying the leading body bytes.
///
/// Reading stops early when the call's context is done.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusErrorHook;

#[async_trait]
impl ErrorResponseHook for StatusErrorHook {
    async fn on_error_response(
        &self,
        _attempt: &AttemptContext<'_>,
        response: &mut Response,
    ) -> Option<Error> {
        let data = response
            .leading_bytes(crate::error::STATUS_ERROR_DATA_LIMIT)
            .await;
        Some(crate::StatusError::new(response.status(), None).with_data(data).into())
    }
}
