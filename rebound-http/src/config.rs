//! HTTP client configuration.

use crate::hooks::{AttemptContext, ErrorHook, ErrorResponseHook};
use crate::retry::{BackoffStrategy, PolicyFactory, RetryConfig, RetryPolicy};
use crate::transport::{Transport, TransportLayer};
use crate::{Error, Response};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use rebound_dial::RestrictedDialer;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Settings used to build a transport.
///
/// Cloned for per-request overrides, so the client's own copy is never
/// mutated.
#[derive(Clone)]
pub struct TransportConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// TCP keepalive interval.
    pub tcp_keepalive: Option<Duration>,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Timeout for each round trip. `None` disables it.
    pub timeout: Option<Duration>,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip decompression.
    pub gzip: bool,
    /// Enable brotli decompression.
    pub brotli: bool,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
    /// Cookie store shared by every transport built from this config.
    pub cookie_store: Option<Arc<dyn reqwest::cookie::CookieStore>>,
    /// Verify the peer of every new connection.
    pub dialer: Option<RestrictedDialer>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            tcp_keepalive: Some(Duration::from_secs(30)),
            pool_idle_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 4,
            timeout: None,
            user_agent: format!("rebound/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
            follow_redirects: true,
            max_redirects: 10,
            cookie_store: None,
            dialer: None,
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("tcp_keepalive", &self.tcp_keepalive)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("gzip", &self.gzip)
            .field("brotli", &self.brotli)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .field("cookie_store", &self.cookie_store.is_some())
            .field("dialer", &self.dialer)
            .finish()
    }
}

/// HTTP client configuration.
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Headers added to every request that does not already set them.
    pub default_headers: HeaderMap,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Custom retry policy, replacing the one derived from `retry`.
    pub policy: Option<PolicyFactory>,
    /// Hook for transport errors.
    pub on_error: Option<ErrorHook>,
    /// Hook for non-2xx responses.
    pub on_error_response: Option<Arc<dyn ErrorResponseHook>>,
    /// Transport settings.
    pub transport: TransportConfig,
    /// Layer wrapped around every transport the client uses.
    pub layer: Option<TransportLayer>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("default_headers", &self.default_headers)
            .field("retry", &self.retry)
            .field("policy", &self.policy.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_error_response", &self.on_error_response.is_some())
            .field("transport", &self.transport)
            .field("layer", &self.layer.is_some())
            .finish()
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// A fresh retry policy for one call.
    pub(crate) fn new_policy(&self) -> Box<dyn RetryPolicy> {
        match &self.policy {
            Some(factory) => factory(),
            None => self.retry.policy(),
        }
    }
}

/// Builder for HTTP client configuration.
///
/// Header values that fail to parse are reported by [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    error: Option<Error>,
}

impl ClientConfigBuilder {
    /// Add a default header for all requests.
    ///
    /// Repeated calls with the same name add further values.
    pub fn default_header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        if self.error.is_some() {
            return self;
        }
        let name = match name.try_into() {
            Ok(name) => name,
            Err(e) => {
                self.error = Some(Error::InvalidRequest(format!("invalid header name: {e}")));
                return self;
            }
        };
        match value.try_into() {
            Ok(value) => {
                self.config.default_headers.append(name, value);
            }
            Err(e) => {
                self.error = Some(Error::InvalidRequest(format!(
                    "invalid value for header {name}: {e}"
                )));
            }
        }
        self
    }

    /// Replace the default headers.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.config.default_headers = headers;
        self
    }

    /// Set retry configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.config.retry = config;
        self
    }

    /// Set the maximum number of attempts. `0` means unlimited.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.config.retry.max_attempts = max;
        self
    }

    /// Set the backoff strategy.
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.retry.backoff = backoff;
        self
    }

    /// Set the `Retry-After` bounds.
    pub fn retry_after(mut self, min: Duration, max: Duration) -> Self {
        self.config.retry.min_retry_after = min;
        self.config.retry.max_retry_after = max;
        self
    }

    /// Use a custom retry policy for every call.
    pub fn policy<F, P>(mut self, factory: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: RetryPolicy + 'static,
    {
        self.config.policy = Some(Arc::new(move || Box::new(factory()) as Box<dyn RetryPolicy>));
        self
    }

    /// Set the transport error hook.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptContext<'_>, Error) -> Option<Error> + Send + Sync + 'static,
    {
        self.config.on_error = Some(Arc::new(hook));
        self
    }

    /// Set the error-response hook from a closure.
    pub fn on_error_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptContext<'_>, &Response) -> Option<Error> + Send + Sync + 'static,
    {
        self.config.on_error_response = Some(Arc::new(hook));
        self
    }

    /// Set the error-response hook.
    pub fn error_response_hook(mut self, hook: impl ErrorResponseHook + 'static) -> Self {
        self.config.on_error_response = Some(Arc::new(hook));
        self
    }

    /// Replace the transport settings.
    pub fn transport(mut self, config: TransportConfig) -> Self {
        self.config.transport = config;
        self
    }

    /// Adjust the transport settings in place.
    pub fn configure_transport(mut self, f: impl FnOnce(&mut TransportConfig)) -> Self {
        f(&mut self.config.transport);
        self
    }

    /// Set the per round trip timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.connect_timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.transport.user_agent = user_agent.into();
        self
    }

    /// Share a cookie store between requests.
    pub fn cookie_store(mut self, store: Arc<dyn reqwest::cookie::CookieStore>) -> Self {
        self.config.transport.cookie_store = Some(store);
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.transport.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.transport.max_redirects = max;
        self
    }

    /// Verify every new connection against `dialer`.
    pub fn restrict(mut self, dialer: RestrictedDialer) -> Self {
        self.config.transport.dialer = Some(dialer);
        self
    }

    /// Wrap every transport the client uses.
    pub fn layer<F>(mut self, layer: F) -> Self
    where
        F: Fn(Arc<dyn Transport>) -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        self.config.layer = Some(Arc::new(layer));
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ClientConfig, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.config),
        }
    }
}
