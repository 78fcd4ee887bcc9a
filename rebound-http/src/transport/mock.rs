//! In-process transport for executor tests.

use super::{BodyStream, Transport};
use crate::body::RequestBody;
use crate::error::BoxError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::Poll;
use tokio::time::Instant;

/// A scripted reply.
pub(crate) enum Reply {
    Response {
        status: StatusCode,
        headers: Vec<(&'static str, String)>,
        body: Bytes,
        /// Never end the body after `body` is read.
        stall: bool,
    },
    Error(Box<dyn Fn() -> BoxError + Send + Sync>),
    /// Never resolves.
    Hang,
}

impl Reply {
    pub(crate) fn status(status: StatusCode) -> Self {
        Reply::Response {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            stall: false,
        }
    }

    pub(crate) fn error(f: impl Fn() -> BoxError + Send + Sync + 'static) -> Self {
        Reply::Error(Box::new(f))
    }

    pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        if let Reply::Response { headers, .. } = &mut self {
            headers.push((name, value.into()));
        }
        self
    }

    pub(crate) fn body(mut self, data: impl Into<Bytes>) -> Self {
        if let Reply::Response { body, .. } = &mut self {
            *body = data.into();
        }
        self
    }

    pub(crate) fn stall(mut self) -> Self {
        if let Reply::Response { stall, .. } = &mut self {
            *stall = true;
        }
        self
    }
}

/// What the transport saw for one attempt.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) at: Instant,
}

/// Replays scripted replies in order, repeating the last one.
pub(crate) struct MockTransport {
    replies: Vec<Reply>,
    requests: Mutex<Vec<Recorded>>,
    finished_bodies: Arc<AtomicUsize>,
}

impl MockTransport {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            requests: Mutex::new(Vec::new()),
            finished_bodies: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of response bodies read to the end, by the caller or a drain.
    pub(crate) fn finished_bodies(&self) -> usize {
        self.finished_bodies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> Result<http::Response<BodyStream>, BoxError> {
        let (parts, body) = request.into_parts();
        let body = body.bytes().await?;

        let index = {
            let mut requests = self.requests.lock();
            requests.push(Recorded {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
                at: Instant::now(),
            });
            requests.len() - 1
        };

        let Some(reply) = self.replies.get(index).or(self.replies.last()) else {
            return Err("no scripted reply".into());
        };

        match reply {
            Reply::Response {
                status,
                headers,
                body,
                stall,
            } => {
                let finished = Arc::clone(&self.finished_bodies);
                let chunks = futures::stream::iter(
                    Some(body.clone())
                        .filter(|b| !b.is_empty())
                        .map(Ok::<_, io::Error>),
                );
                let end = futures::stream::poll_fn(move |_| {
                    finished.fetch_add(1, Ordering::SeqCst);
                    Poll::<Option<io::Result<Bytes>>>::Ready(None)
                });
                let tail: BodyStream = if *stall {
                    Box::pin(futures::stream::pending::<io::Result<Bytes>>())
                } else {
                    Box::pin(end)
                };
                let stream: BodyStream = Box::pin(chunks.chain(tail));

                let mut response = http::Response::new(stream);
                *response.status_mut() = *status;
                for (name, value) in headers {
                    response.headers_mut().append(*name, value.parse()?);
                }
                Ok(response)
            }
            Reply::Error(make) => Err(make()),
            Reply::Hang => std::future::pending().await,
        }
    }
}
