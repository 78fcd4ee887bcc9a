//! Connector integration for hyper-based HTTP clients.

use crate::RestrictedDialer;
use http::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::net::TcpStream;
use tower_service::Service;

/// Boxed error type produced by [`RestrictedConnector`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Connecting = Pin<Box<dyn Future<Output = Result<TokioIo<TcpStream>, BoxError>> + Send>>;

/// A [`Service<Uri>`] connector that runs every established connection
/// through a [`RestrictedDialer`] before handing it to the HTTP client.
///
/// Name resolution and address fallback are delegated to the inner connector,
/// [`HttpConnector`] by default. Rejected connections are closed and surfaced
/// as a [`DialError`](crate::DialError) inside the boxed error.
#[derive(Debug, Clone)]
pub struct RestrictedConnector<C = HttpConnector> {
    inner: C,
    dialer: Arc<RestrictedDialer>,
}

impl RestrictedConnector {
    /// Create a connector for the given dialer.
    ///
    /// The inner connector accepts any URI scheme so it can be wrapped by a
    /// TLS connector.
    pub fn new(dialer: RestrictedDialer) -> Self {
        let mut inner = HttpConnector::new();
        inner.enforce_http(false);
        inner.set_nodelay(true);
        inner.set_connect_timeout(dialer.connect_timeout);
        Self::with_inner(dialer, inner)
    }
}

impl<C> RestrictedConnector<C> {
    /// Create a connector around a preconfigured inner connector.
    pub fn with_inner(dialer: RestrictedDialer, inner: C) -> Self {
        Self {
            inner,
            dialer: Arc::new(dialer),
        }
    }

    /// The policy applied to each connection.
    pub fn dialer(&self) -> &RestrictedDialer {
        &self.dialer
    }
}

impl<C> Service<Uri> for RestrictedConnector<C>
where
    C: Service<Uri, Response = TokioIo<TcpStream>>,
    C::Error: Into<BoxError>,
    C::Future: Send + 'static,
{
    type Response = TokioIo<TcpStream>;
    type Error = BoxError;
    type Future = Connecting;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connecting = self.inner.call(dst);
        let dialer = Arc::clone(&self.dialer);

        Box::pin(async move {
            let io = connecting.await.map_err(Into::<BoxError>::into)?;
            match dialer.verify(io.into_inner()) {
                Ok(conn) => Ok(TokioIo::new(conn)),
                Err(err) => Err(err.without_conn().into()),
            }
        })
    }
}

impl RestrictedDialer {
    /// Build a [`RestrictedConnector`] enforcing this policy.
    pub fn connector(&self) -> RestrictedConnector {
        RestrictedConnector::new(self.clone())
    }
}
