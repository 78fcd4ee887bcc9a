//! Round trip logging.

use super::{BodyStream, Transport, TransportLayer};
use crate::body::RequestBody;
use crate::error::BoxError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Logs every round trip through `tracing`.
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
}

impl LoggingTransport {
    /// Wrap a transport.
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> Result<http::Response<BodyStream>, BoxError> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        let start = Instant::now();

        let result = self.inner.send(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => debug!(
                %method,
                %uri,
                status = response.status().as_u16(),
                elapsed_ms,
                "HTTP round trip"
            ),
            Err(error) => debug!(%method, %uri, %error, elapsed_ms, "HTTP round trip failed"),
        }

        result
    }
}

/// A [`TransportLayer`] adding [`LoggingTransport`].
pub fn logging_layer() -> TransportLayer {
    Arc::new(|inner: Arc<dyn Transport>| -> Arc<dyn Transport> {
        Arc::new(LoggingTransport::new(inner))
    })
}
