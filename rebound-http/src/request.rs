//! Requests and the request builder.

use crate::body::{Body, RequestBody};
use crate::client::{Client, RequestOptions};
use crate::context::Context;
use crate::{Error, Response, Result};
use futures::StreamExt;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

/// An HTTP request that can be sent any number of times.
///
/// The body is a replayable [`Body`], so every attempt made by the executor
/// sends the same bytes.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
    context: Context,
}

impl Request {
    /// Create a request with an empty body.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidRequest(format!("invalid URL: {e}")))?;
        Self::from_url(method, url)
    }

    /// Create a request for an already parsed URL.
    pub fn from_url(method: Method, url: Url) -> Result<Self> {
        let uri = url
            .as_str()
            .parse::<Uri>()
            .map_err(|e| Error::InvalidRequest(format!("invalid URI: {e}")))?;
        Ok(Self {
            method,
            url,
            uri,
            headers: HeaderMap::new(),
            body: Body::Empty,
            context: Context::new(),
        })
    }

    /// Get the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get the body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Replace the body, builder style.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Get the cancellation context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Replace the cancellation context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Write a fresh copy of the body to `writer`, returning the number of
    /// bytes written.
    pub async fn write_body_to<W>(&self, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut stream = self.body.open().await?.into_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    /// Build the `http::Request` sent for one attempt.
    ///
    /// Default headers are added only for names the request does not set.
    pub(crate) fn to_http(&self, body: RequestBody, defaults: &HeaderMap) -> http::Request<RequestBody> {
        let mut request = http::Request::new(body);
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();

        let headers = request.headers_mut();
        *headers = self.headers.clone();
        for name in defaults.keys() {
            if headers.contains_key(name) {
                continue;
            }
            for value in defaults.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        request.extensions_mut().insert(self.url.clone());
        request
    }
}

/// HTTP request builder.
///
/// Errors found while building are reported by [`build`](Self::build) and
/// [`send`](Self::send).
pub struct RequestBuilder<'a> {
    client: &'a Client,
    method: Method,
    url: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Body,
    context: Option<Context>,
    timeout: Option<Duration>,
    error: Option<Error>,
}

impl fmt::Debug for RequestBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl<'a> RequestBuilder<'a> {
    /// Create a new request builder.
    pub(crate) fn new(client: &'a Client, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: Body::Empty,
            context: None,
            timeout: None,
            error: None,
        }
    }

    /// Add a header to the request.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        if self.error.is_some() {
            return self;
        }
        match (name.try_into(), value.try_into()) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => {
                self.error = Some(Error::InvalidRequest(format!("invalid header name: {e}")));
            }
            (_, Err(e)) => {
                self.error = Some(Error::InvalidRequest(format!("invalid header value: {e}")));
            }
        }
        self
    }

    /// Add multiple headers to the request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add multiple query parameters.
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in params {
            self.query.push((k.into(), v.into()));
        }
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the request body as text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = Body::text(text);
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        match Body::json(json) {
            Ok(body) => {
                self.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                self.body = body;
            }
            Err(e) => self.error = self.error.or(Some(e)),
        }
        self
    }

    /// Set the request body as form data.
    pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Self {
        match Body::form(form) {
            Ok(body) => {
                self.headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                self.body = body;
            }
            Err(e) => self.error = self.error.or(Some(e)),
        }
        self
    }

    /// Bound the whole call, across all attempts.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a cancellation context.
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Set bearer authentication.
    pub fn bearer_auth(self, token: impl fmt::Display) -> Self {
        self.header(AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Set basic authentication.
    pub fn basic_auth(
        self,
        username: impl fmt::Display,
        password: Option<impl fmt::Display>,
    ) -> Self {
        use base64::Engine;
        let credentials = match password {
            Some(p) => format!("{username}:{p}"),
            None => format!("{username}:"),
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        self.header(AUTHORIZATION, format!("Basic {encoded}"))
    }

    /// Build the request.
    pub fn build(self) -> Result<Request> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::InvalidRequest(format!("invalid URL: {e}")))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        let mut context = self.context.unwrap_or_default();
        if let Some(timeout) = self.timeout {
            context = context.with_timeout(timeout);
        }

        let mut request = Request::from_url(self.method, url)?;
        request.headers = self.headers;
        request.body = self.body;
        request.context = context;
        Ok(request)
    }

    /// Send the request.
    pub async fn send(self) -> Result<Response> {
        let client = self.client;
        let request = self.build()?;
        client.execute(&request).await
    }

    /// Send the request with per-call overrides.
    pub async fn send_with(self, options: RequestOptions) -> Result<Response> {
        let client = self.client;
        let request = self.build()?;
        client.execute_with(&request, options).await
    }
}
