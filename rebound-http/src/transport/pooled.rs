//! Default transport backed by a pooled `reqwest` client.

use super::{BodyStream, Transport};
use crate::body::RequestBody;
use crate::config::TransportConfig;
use crate::error::BoxError;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use http::header::CONTENT_LENGTH;
use http::HeaderValue;
use reqwest::cookie::CookieStore;
use std::io;
use std::sync::Arc;
use url::Url;

/// Transport backed by [`reqwest::Client`].
///
/// Handles redirects, decompression, cookies, and the round trip timeout
/// as configured.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport from `config`.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .tcp_keepalive(config.tcp_keepalive)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(config.user_agent.as_str())
            .gzip(config.gzip)
            .brotli(config.brotli);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }
        if let Some(store) = &config.cookie_store {
            builder = builder.cookie_provider(Arc::new(SharedJar(Arc::clone(store))));
        }

        let client = builder.build().map_err(|e| Error::Transport(Box::new(e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> std::result::Result<http::Response<BodyStream>, BoxError> {
        let (mut parts, body) = request.into_parts();
        let url = match parts.extensions.remove::<Url>() {
            Some(url) => url,
            None => Url::parse(&parts.uri.to_string())?,
        };

        if let Some(size) = body.size()
            && size > 0
            && !parts.headers.contains_key(CONTENT_LENGTH)
        {
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        }

        let mut req = reqwest::Request::new(parts.method, url);
        *req.headers_mut() = parts.headers;
        *req.body_mut() = Some(body.into());

        let mut res = self.client.execute(req).await?;

        let url = res.url().clone();
        let status = res.status();
        let version = res.version();
        let headers = std::mem::take(res.headers_mut());
        let stream: BodyStream = Box::pin(res.bytes_stream().map_err(io::Error::other));

        let mut response = http::Response::new(stream);
        *response.status_mut() = status;
        *response.version_mut() = version;
        *response.headers_mut() = headers;
        response.extensions_mut().insert(url);
        Ok(response)
    }
}

/// Adapts a shared `dyn CookieStore` to the sized provider reqwest expects.
struct SharedJar(Arc<dyn CookieStore>);

impl CookieStore for SharedJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.0.set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.0.cookies(url)
    }
}
