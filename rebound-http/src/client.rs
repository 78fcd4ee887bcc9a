//! HTTP client and the retrying executor.

use crate::config::{ClientConfig, TransportConfig};
use crate::error::{BoxError, RequestError};
use crate::hooks::AttemptContext;
use crate::request::{Request, RequestBuilder};
use crate::transport::{self, Transport, TransportLayer};
use crate::{Error, Response, Result};
use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP client with replayable bodies and `Retry-After` aware retries.
///
/// Cloning is cheap and clones share the transport and its connection pool.
/// A single client can serve concurrent calls; each call gets its own retry
/// policy.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Per-call overrides for [`Client::execute_with`].
#[derive(Clone, Default)]
pub struct RequestOptions {
    configure_transport: Option<Arc<dyn Fn(&mut TransportConfig) + Send + Sync>>,
    layer: Option<TransportLayer>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("configure_transport", &self.configure_transport.is_some())
            .field("layer", &self.layer.is_some())
            .finish()
    }
}

impl RequestOptions {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a private transport for this call from a copy of the client's
    /// transport settings, adjusted by `f`.
    pub fn configure_transport<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut TransportConfig) + Send + Sync + 'static,
    {
        self.configure_transport = Some(Arc::new(f));
        self
    }

    /// Wrap the transport used for this call.
    pub fn layer<F>(mut self, layer: F) -> Self
    where
        F: Fn(Arc<dyn Transport>) -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        self.layer = Some(Arc::new(layer));
        self
    }
}

impl Client {
    /// Create a client, building its transport from `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = transport::build(&config.transport)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client around an existing transport.
    ///
    /// The configured layer, if any, is applied to `transport`.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let transport = transport::layered(transport, config.layer.as_ref());
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, url.into())
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, url.into())
    }

    /// Create a PUT request builder.
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PUT, url.into())
    }

    /// Create a PATCH request builder.
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PATCH, url.into())
    }

    /// Create a DELETE request builder.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::DELETE, url.into())
    }

    /// Create a HEAD request builder.
    pub fn head(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::HEAD, url.into())
    }

    /// Create a request builder with a custom method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    /// Execute a request, retrying transient failures.
    ///
    /// A 2xx response is returned as soon as it arrives. Other responses are
    /// returned as `Ok` too, once they are not retryable or attempts run out;
    /// inspect the status or use [`Response::error_for_status`]. The caller
    /// owns the returned response and should close or consume it.
    pub async fn execute(&self, request: &Request) -> Result<Response> {
        self.run(request, Arc::clone(&self.transport)).await
    }

    /// Execute a request with per-call transport overrides.
    ///
    /// The client's own transport is never modified.
    pub async fn execute_with(&self, request: &Request, options: RequestOptions) -> Result<Response> {
        let transport = self.resolve(&options)?;
        self.run(request, transport).await
    }

    fn resolve(&self, options: &RequestOptions) -> Result<Arc<dyn Transport>> {
        let transport = match &options.configure_transport {
            Some(configure) => {
                let mut config = self.config.transport.clone();
                configure(&mut config);
                transport::layered(transport::build(&config)?, self.config.layer.as_ref())
            }
            None => Arc::clone(&self.transport),
        };
        Ok(transport::layered(transport, options.layer.as_ref()))
    }

    async fn run(&self, request: &Request, transport: Arc<dyn Transport>) -> Result<Response> {
        let ctx = request.context();
        if let Some(err) = ctx.err() {
            return Err(Error::Context(err));
        }

        let mut policy = self.config.new_policy();
        let mut held: Option<Result<Response>> = None;
        let mut attempt: u32 = 0;

        loop {
            if let Some(err) = ctx.err() {
                return held.unwrap_or(Err(Error::Context(err)));
            }
            // Release the pooled connection of a discarded response. The
            // drain stops when the context is done.
            if let Some(Ok(previous)) = held.as_mut() {
                previous.close().await;
                if let Some(err) = ctx.err() {
                    return Err(Error::Context(err));
                }
            }
            attempt += 1;

            let body = tokio::select! {
                opened = request.body().open() => {
                    opened.map_err(|source| Error::OpenBody { attempt, source })?
                }
                err = ctx.done() => {
                    return match held {
                        Some(Err(held)) => Err(held),
                        _ => Err(Error::Context(err)),
                    };
                }
            };
            let sent = tokio::select! {
                result = transport.send(request.to_http(body, &self.config.default_headers)) => result,
                err = ctx.done() => Err(Box::new(err) as BoxError),
            };

            let info = AttemptContext {
                attempt,
                method: request.method(),
                url: request.url(),
                context: ctx,
            };

            let outcome = match sent {
                Err(source) => {
                    let err = Error::Request(RequestError::new(source));
                    let err = match &self.config.on_error {
                        Some(hook) => hook(&info, err),
                        None => Some(err),
                    };
                    match err {
                        None => {
                            debug!(attempt, "Transport error suppressed by hook");
                            Err(Error::RetryExhausted {
                                attempts: attempt,
                                message: "last error was suppressed by the error hook".to_string(),
                            })
                        }
                        Some(err) if err.is_timeout() => {
                            debug!(attempt, error = %err, "Transport timeout");
                            Err(err)
                        }
                        Some(err) => return Err(err),
                    }
                }
                Ok(res) => {
                    let mut response =
                        Response::from_http(res, request.url()).with_context(ctx.clone());
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if let Some(hook) = &self.config.on_error_response
                        && let Some(err) = hook.on_error_response(&info, &mut response).await
                    {
                        response.close().await;
                        return Err(err);
                    }

                    if !self.config.retry.should_retry_status(status) {
                        return Ok(response);
                    }

                    match response.retry_after() {
                        Ok(delay) => {
                            if let Some(delay) = self.config.retry.clamp_retry_after(delay) {
                                policy.override_next_delay(delay);
                            }
                        }
                        Err(error) => {
                            warn!(attempt, %error, "Ignoring malformed Retry-After header");
                        }
                    }
                    Ok(response)
                }
            };

            if !policy.has_attempts_remaining() {
                debug!(attempt, "Retry attempts exhausted");
                return outcome;
            }
            held = Some(outcome);

            let delay = policy.next_delay();
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying request"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.done() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, RequestBody};
    use crate::context::{Context, ContextError};
    use crate::retry::{BackoffStrategy, Retrier, RetryConfig};
    use crate::transport::mock::{MockTransport, Reply};
    use http::StatusCode;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const URL: &str = "http://example.com/resource";

    fn client(config: ClientConfig, replies: Vec<Reply>) -> (Client, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new(replies));
        let transport: Arc<dyn Transport> = mock.clone();
        (Client::with_transport(config, transport), mock)
    }

    fn gaps(mock: &MockTransport) -> Vec<Duration> {
        mock.requests()
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect()
    }

    fn timed_out() -> BoxError {
        io::Error::new(io::ErrorKind::TimedOut, "timed out").into()
    }

    fn refused() -> BoxError {
        io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused").into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_attempts_exhausted() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![Reply::status(StatusCode::SERVICE_UNAVAILABLE)],
        );

        let response = client.get(URL).send().await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(mock.attempts(), 3);
        assert_eq!(gaps(&mock), [Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_respected() {
        for max in [1, 2, 5] {
            let config = ClientConfig::builder().max_attempts(max).build().unwrap();
            let (client, mock) = client(config, vec![Reply::status(StatusCode::BAD_GATEWAY)]);

            client.get(URL).send().await.unwrap();

            assert_eq!(mock.attempts(), max as usize);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_short_circuits() {
        let config = ClientConfig::builder().max_attempts(5).build().unwrap();
        let (client, mock) = client(
            config,
            vec![
                Reply::status(StatusCode::SERVICE_UNAVAILABLE),
                Reply::status(StatusCode::OK).body("done"),
                Reply::status(StatusCode::SERVICE_UNAVAILABLE),
            ],
        );

        let response = client.get(URL).send().await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "done");
        assert_eq!(mock.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_status_is_terminal() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![Reply::status(StatusCode::NOT_FOUND)],
        );

        let response = client.get(URL).send().await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_retry_status_codes() {
        let config = ClientConfig::builder()
            .retry(RetryConfig::immediate(3).with_status_codes(vec![409]))
            .build()
            .unwrap();
        let (client, mock) = client(config, vec![Reply::status(StatusCode::CONFLICT)]);

        client.get(URL).send().await.unwrap();
        assert_eq!(mock.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_above_minimum_overrides_backoff() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![
                Reply::status(StatusCode::TOO_MANY_REQUESTS).header("retry-after", "5"),
                Reply::status(StatusCode::OK),
            ],
        );

        client.get(URL).send().await.unwrap();

        assert_eq!(gaps(&mock), [Duration::from_secs(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_below_minimum_uses_backoff() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![
                Reply::status(StatusCode::TOO_MANY_REQUESTS).header("retry-after", "1"),
                Reply::status(StatusCode::OK),
            ],
        );

        client.get(URL).send().await.unwrap();

        assert_eq!(gaps(&mock), [Duration::from_secs(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_clamped() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![
                Reply::status(StatusCode::SERVICE_UNAVAILABLE).header("retry-after", "3600"),
                Reply::status(StatusCode::OK),
            ],
        );

        client.get(URL).send().await.unwrap();

        assert_eq!(gaps(&mock), [Duration::from_secs(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_retry_after_is_ignored() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![
                Reply::status(StatusCode::SERVICE_UNAVAILABLE).header("retry-after", "soon"),
                Reply::status(StatusCode::OK),
            ],
        );

        let response = client.get(URL).send().await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(gaps(&mock), [Duration::from_secs(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discarded_responses_are_drained() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![Reply::status(StatusCode::SERVICE_UNAVAILABLE).body("busy")],
        );

        let mut response = client.get(URL).send().await.unwrap();
        assert_eq!(mock.finished_bodies(), 2);

        response.close().await;
        assert_eq!(mock.finished_bodies(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_is_replayed_on_every_attempt() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![
                Reply::status(StatusCode::INTERNAL_SERVER_ERROR),
                Reply::status(StatusCode::GATEWAY_TIMEOUT),
                Reply::status(StatusCode::CREATED),
            ],
        );

        let response = client.post(URL).text("payload").send().await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let bodies: Vec<_> = mock.requests().into_iter().map(|r| r.body).collect();
        assert_eq!(bodies, ["payload", "payload", "payload"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_body_failure_is_permanent() {
        let (client, mock) = client(ClientConfig::default(), vec![Reply::status(StatusCode::OK)]);

        let body = Body::from_fn(None, || Err(io::Error::other("stale handle")));
        let err = client.post(URL).body(body).send().await.unwrap_err();

        assert!(matches!(err, Error::OpenBody { attempt: 1, .. }));
        assert_eq!(mock.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_permanent() {
        let (client, mock) = client(ClientConfig::default(), vec![Reply::error(refused)]);

        let err = client.get(URL).send().await.unwrap_err();

        assert!(matches!(err, Error::Request(_)));
        assert!(!err.is_timeout());
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_retried() {
        let (client, mock) = client(ClientConfig::default(), vec![Reply::error(timed_out)]);

        let err = client.get(URL).send().await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(mock.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![Reply::error(timed_out), Reply::status(StatusCode::OK)],
        );

        let response = client.get(URL).send().await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(mock.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_hook_suppression_retries() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let config = ClientConfig::builder()
            .on_error(move |info, _err| {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(info.url.as_str(), URL);
                None
            })
            .build()
            .unwrap();
        let (client, mock) = client(config, vec![Reply::error(refused)]);

        let err = client.get(URL).send().await.unwrap_err();

        assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
        assert_eq!(mock.attempts(), 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_hook_can_replace_error() {
        let config = ClientConfig::builder()
            .on_error(|_, _| Some(Error::hook(io::Error::other("replaced"))))
            .build()
            .unwrap();
        let (client, mock) = client(config, vec![Reply::error(refused)]);

        let err = client.get(URL).send().await.unwrap_err();

        assert_eq!(err.to_string(), "replaced");
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_response_hook_stops_and_closes() {
        let config = ClientConfig::builder()
            .on_error_response(|info, response| {
                assert_eq!(info.attempt, 1);
                Some(Error::hook(format!("rejected {}", response.status().as_u16())))
            })
            .build()
            .unwrap();
        let (client, mock) = client(
            config,
            vec![Reply::status(StatusCode::SERVICE_UNAVAILABLE).body("busy")],
        );

        let err = client.get(URL).send().await.unwrap_err();

        assert_eq!(err.to_string(), "rejected 503");
        assert_eq!(mock.attempts(), 1);
        assert_eq!(mock.finished_bodies(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_error_hook() {
        let config = ClientConfig::builder()
            .error_response_hook(crate::hooks::StatusErrorHook)
            .build()
            .unwrap();
        let (client, _mock) = client(
            config,
            vec![Reply::status(StatusCode::BAD_REQUEST).body("  missing field\n")],
        );

        let err = client.get(URL).send().await.unwrap_err();
        let status = err.status_error().unwrap();

        assert_eq!(status.status, StatusCode::BAD_REQUEST);
        assert_eq!(&status.data[..], b"missing field");
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_response_hook_may_pass() {
        let config = ClientConfig::builder()
            .on_error_response(|_, _| None)
            .build()
            .unwrap();
        let (client, mock) = client(config, vec![Reply::status(StatusCode::BAD_GATEWAY)]);

        client.get(URL).send().await.unwrap();
        assert_eq!(mock.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_canceled_context_fails_fast() {
        let (client, mock) = client(ClientConfig::default(), vec![Reply::status(StatusCode::OK)]);
        let ctx = Context::new();
        ctx.cancel();

        let err = client.get(URL).context(ctx).send().await.unwrap_err();

        assert!(matches!(err, Error::Context(ContextError::Canceled)));
        assert_eq!(mock.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_all_attempts() {
        let config = ClientConfig::builder()
            .max_attempts(0)
            .backoff(BackoffStrategy::Constant(Duration::from_secs(1)))
            .build()
            .unwrap();
        let (client, mock) = client(config, vec![Reply::status(StatusCode::SERVICE_UNAVAILABLE)]);

        let response = client
            .get(URL)
            .timeout(Duration::from_millis(3500))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(mock.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_hung_transport() {
        let (client, mock) = client(ClientConfig::default(), vec![Reply::Hang]);

        let err = client
            .get(URL)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_stalled_drain() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![Reply::status(StatusCode::SERVICE_UNAVAILABLE).body("busy").stall()],
        );
        let start = tokio::time::Instant::now();

        let err = client
            .get(URL)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Context(ContextError::DeadlineExceeded)));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_status_error_data() {
        let config = ClientConfig::builder()
            .error_response_hook(crate::hooks::StatusErrorHook)
            .build()
            .unwrap();
        let (client, _mock) = client(
            config,
            vec![Reply::status(StatusCode::SERVICE_UNAVAILABLE).body("busy").stall()],
        );
        let start = tokio::time::Instant::now();

        let err = client
            .get(URL)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .unwrap_err();

        let status = err.status_error().unwrap();
        assert_eq!(status.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(&status.data[..], b"busy");
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_blocked_body_open() {
        let (client, mock) = client(ClientConfig::default(), vec![Reply::status(StatusCode::OK)]);
        let body = Body::from_seekable(io::Cursor::new(b"payload".to_vec()))
            .await
            .unwrap();
        // Holds the handle until dropped.
        let in_flight = body.open().await.unwrap();

        let err = client
            .put(URL)
            .body(body)
            .timeout(Duration::from_secs(1))
            .send()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Context(ContextError::DeadlineExceeded)));
        assert_eq!(mock.attempts(), 0);
        drop(in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returned_response_close_respects_deadline() {
        let (client, _mock) = client(
            ClientConfig::default(),
            vec![Reply::status(StatusCode::NOT_FOUND).body("gone").stall()],
        );
        let start = tokio::time::Instant::now();

        let mut response = client
            .get(URL)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        response.close().await;

        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(response.body_mut().chunk().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_headers_do_not_override_request() {
        let config = ClientConfig::builder()
            .default_header("x-api-key", "default")
            .default_header("accept", "application/json")
            .build()
            .unwrap();
        let (client, mock) = client(config, vec![Reply::status(StatusCode::OK)]);

        client.get(URL).header("accept", "text/csv").send().await.unwrap();

        let recorded = &mock.requests()[0];
        assert_eq!(recorded.headers["x-api-key"], "default");
        assert_eq!(recorded.headers["accept"], "text/csv");
        assert_eq!(recorded.method, Method::GET);
        assert_eq!(recorded.uri, URL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy() {
        let config = ClientConfig::builder()
            .policy(|| Retrier::new(BackoffStrategy::Constant(Duration::from_millis(10)), 6))
            .build()
            .unwrap();
        let (client, mock) = client(config, vec![Reply::status(StatusCode::BAD_GATEWAY)]);

        client.get(URL).send().await.unwrap();

        assert_eq!(mock.attempts(), 6);
        assert!(gaps(&mock).iter().all(|gap| *gap == Duration::from_millis(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_layer_wraps_only_that_call() {
        let layered = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&layered);
        let (client, mock) = client(ClientConfig::default(), vec![Reply::status(StatusCode::OK)]);

        let options = RequestOptions::new().layer(move |inner| {
            calls.fetch_add(1, Ordering::SeqCst);
            inner
        });
        client.get(URL).send_with(options).await.unwrap();
        client.get(URL).send().await.unwrap();

        assert_eq!(layered.load(Ordering::SeqCst), 1);
        assert_eq!(mock.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_layer_applies_to_every_call() {
        let layered = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&layered);
        let config = ClientConfig::builder()
            .layer(move |inner| {
                calls.fetch_add(1, Ordering::SeqCst);
                inner
            })
            .build()
            .unwrap();
        let (client, mock) = client(config, vec![Reply::status(StatusCode::OK)]);

        client.get(URL).send().await.unwrap();
        client.get(URL).send().await.unwrap();

        assert_eq!(layered.load(Ordering::SeqCst), 1);
        assert_eq!(mock.attempts(), 2);
    }

    #[tokio::test]
    async fn test_transport_override_leaves_client_untouched() {
        let client = Client::new(ClientConfig::default()).unwrap();

        let options = RequestOptions::new().configure_transport(|config| {
            config.timeout = Some(Duration::from_millis(1));
        });
        let transport = client.resolve(&options).unwrap();

        assert!(!Arc::ptr_eq(&transport, &client.transport));
        assert!(client.config().transport.timeout.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_body_is_sent_for_every_attempt() {
        let (client, mock) = client(
            ClientConfig::default(),
            vec![Reply::status(StatusCode::SERVICE_UNAVAILABLE)],
        );

        let request = Request::new(Method::DELETE, URL).unwrap();
        client.execute(&request).await.unwrap();

        assert!(mock.requests().iter().all(|r| r.body.is_empty()));
        assert_eq!(RequestBody::empty().size(), Some(0));
    }
}
