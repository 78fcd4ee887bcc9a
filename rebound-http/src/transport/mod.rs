//! Pluggable transports.
//!
//! A [`Transport`] sends one request and returns the response head with a
//! streaming body. The executor only ever talks to this trait, so transports
//! can be swapped or wrapped with a [`TransportLayer`] without touching the
//! retry loop.

mod connector;
mod logging;
#[cfg(test)]
pub(crate) mod mock;
mod pooled;

pub use connector::ConnectorTransport;
pub use logging::{LoggingTransport, logging_layer};
pub use pooled::ReqwestTransport;

use crate::body::{ChunkStream, RequestBody};
use crate::config::TransportConfig;
use crate::error::BoxError;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Streaming response body produced by a transport.
pub type BodyStream = ChunkStream;

/// Wraps a transport, e.g. to add logging or request rewriting.
pub type TransportLayer = Arc<dyn Fn(Arc<dyn Transport>) -> Arc<dyn Transport> + Send + Sync>;

/// Sends a single HTTP request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the response head with a streaming body.
    ///
    /// A returned error means the server was never reached or the exchange
    /// failed before a response head arrived.
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> std::result::Result<http::Response<BodyStream>, BoxError>;
}

/// Build the transport described by `config`.
///
/// A configured [`RestrictedDialer`](rebound_dial::RestrictedDialer) selects
/// the [`ConnectorTransport`], otherwise the [`ReqwestTransport`] is used.
pub fn build(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match &config.dialer {
        Some(dialer) => Arc::new(ConnectorTransport::new(config, dialer)?),
        None => Arc::new(ReqwestTransport::new(config)?),
    };
    Ok(transport)
}

/// Apply an optional layer.
pub(crate) fn layered(
    transport: Arc<dyn Transport>,
    layer: Option<&TransportLayer>,
) -> Arc<dyn Transport> {
    match layer {
        Some(layer) => layer(transport),
        None => transport,
    }
}
