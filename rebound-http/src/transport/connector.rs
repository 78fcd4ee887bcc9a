//! Pooled hyper transport whose connections pass through a
//! [`RestrictedDialer`].

use super::{BodyStream, Transport};
use crate::body::RequestBody;
use crate::config::TransportConfig;
use crate::error::BoxError;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use http::header::{COOKIE, SET_COOKIE, USER_AGENT};
use http::HeaderValue;
use http_body_util::BodyExt;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rebound_dial::{RestrictedConnector, RestrictedDialer};
use reqwest::cookie::CookieStore;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

type HttpsClient = Client<HttpsConnector<RestrictedConnector>, RequestBody>;

/// Transport over a hyper-util connection pool, with TLS from rustls and
/// every new connection checked by a [`RestrictedDialer`].
///
/// The user agent, cookie store, and round trip timeout are applied here.
/// Redirects are not followed and bodies are not decompressed.
#[derive(Clone)]
pub struct ConnectorTransport {
    client: HttpsClient,
    user_agent: Option<HeaderValue>,
    timeout: Option<Duration>,
    cookie_store: Option<Arc<dyn CookieStore>>,
}

impl fmt::Debug for ConnectorTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorTransport")
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("cookie_store", &self.cookie_store.is_some())
            .finish_non_exhaustive()
    }
}

impl ConnectorTransport {
    /// Build a transport from `config`, restricted by `dialer`.
    pub fn new(config: &TransportConfig, dialer: &RestrictedDialer) -> Result<Self> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_keepalive(config.tcp_keepalive);
        http.set_connect_timeout(Some(dialer.connect_timeout.unwrap_or(config.connect_timeout)));

        let connector = RestrictedConnector::with_inner(dialer.clone(), http);
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| Error::Transport(Box::new(e)))?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(https);

        let user_agent = match config.user_agent.as_str() {
            "" => None,
            agent => Some(HeaderValue::from_str(agent).map_err(|e| Error::Transport(Box::new(e)))?),
        };

        Ok(Self {
            client,
            user_agent,
            timeout: config.timeout,
            cookie_store: config.cookie_store.clone(),
        })
    }
}

#[async_trait]
impl Transport for ConnectorTransport {
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> std::result::Result<http::Response<BodyStream>, BoxError> {
        let (mut parts, body) = request.into_parts();
        let url = match parts.extensions.remove::<Url>() {
            Some(url) => url,
            None => Url::parse(&parts.uri.to_string())?,
        };

        if let Some(agent) = &self.user_agent
            && !parts.headers.contains_key(USER_AGENT)
        {
            parts.headers.insert(USER_AGENT, agent.clone());
        }
        if let Some(store) = &self.cookie_store
            && !parts.headers.contains_key(COOKIE)
            && let Some(cookies) = store.cookies(&url)
        {
            parts.headers.insert(COOKIE, cookies);
        }

        let pending = self.client.request(http::Request::from_parts(parts, body));
        let res = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending).await??,
            None => pending.await?,
        };

        if let Some(store) = &self.cookie_store {
            let mut set_cookies = res.headers().get_all(SET_COOKIE).iter();
            store.set_cookies(&mut set_cookies, &url);
        }

        let mut response =
            res.map(|body| Box::pin(body.into_data_stream().map_err(io::Error::other)) as BodyStream);
        response.extensions_mut().insert(url);
        Ok(response)
    }
}
