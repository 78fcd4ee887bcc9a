//! Replayable request bodies.
//!
//! A [`Body`] is resolved once, when the request is built, and can then be
//! opened any number of times. Every call to [`Body::open`] yields an
//! independent [`RequestBody`] positioned at the start of the same logical
//! content, so the executor can resend the exact same payload on each attempt.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http_body::{Frame, SizeHint};
use serde::Serialize;
use std::fmt;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, ReadBuf};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::io::ReaderStream;

/// Stream of request body chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A seekable reader that can back a [`Body`].
pub trait SeekRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T> SeekRead for T where T: AsyncRead + AsyncSeek + Send + Unpin {}

/// Source of fresh request body streams.
///
/// Every call to [`open`](Opener::open) must return an independent stream
/// over the same logical content.
#[async_trait]
pub trait Opener: Send + Sync {
    /// Open a fresh stream over the content.
    async fn open(&self) -> io::Result<RequestBody>;

    /// Total size of the content, `None` when unknown.
    ///
    /// `Some(0)` means the content is genuinely empty.
    fn size(&self) -> Option<u64>;
}

/// A replayable request body.
#[derive(Clone, Default)]
pub enum Body {
    /// No content.
    #[default]
    Empty,

    /// In-memory content.
    Bytes(Bytes),

    /// A seekable handle, rewound to offset 0 on every open.
    ///
    /// Every open holds the handle's lock until its stream is dropped. Opens
    /// from clones of the same body therefore run one after another, and an
    /// open waits while a transport is still holding the previous stream.
    Seekable {
        /// Shared handle; each open holds the lock until its stream is dropped.
        handle: Arc<Mutex<Box<dyn SeekRead>>>,
        /// Total size reported by [`Body::size`].
        size: Option<u64>,
        /// Maximum number of bytes read per open.
        limit: Option<u64>,
    },

    /// A caller-supplied opener.
    Opener(Arc<dyn Opener>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(bytes) => f.debug_tuple("Body::Bytes").field(&bytes.len()).finish(),
            Body::Seekable { size, limit, .. } => f
                .debug_struct("Body::Seekable")
                .field("size", size)
                .field("limit", limit)
                .finish(),
            Body::Opener(opener) => f
                .debug_struct("Body::Opener")
                .field("size", &opener.size())
                .finish(),
        }
    }
}

impl Body {
    /// An empty body.
    pub fn empty() -> Self {
        Body::Empty
    }

    /// A UTF-8 text body.
    pub fn text(text: impl Into<String>) -> Self {
        Body::Bytes(Bytes::from(text.into()))
    }

    /// A JSON-encoded body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value).map_err(|e| Error::Body(Box::new(e)))?;
        Ok(Body::Bytes(Bytes::from(encoded)))
    }

    /// A URL-encoded form body.
    pub fn form<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(value).map_err(|e| Error::Body(Box::new(e)))?;
        Ok(Body::Bytes(Bytes::from(encoded)))
    }

    /// A body backed by an open file.
    ///
    /// The file is stat'ed once. Each open seeks to the start and reads at most
    /// the size observed here, so a concurrently growing file cannot make the
    /// body longer than its declared size.
    pub async fn from_file(file: tokio::fs::File) -> io::Result<Self> {
        let size = file.metadata().await?.len();
        Ok(Body::Seekable {
            handle: Arc::new(Mutex::new(Box::new(file))),
            size: Some(size),
            limit: Some(size),
        })
    }

    /// Open the file at `path` and use it as the body.
    pub async fn open_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Self::from_file(file).await
    }

    /// A body backed by any seekable reader.
    ///
    /// The size is the total size of the underlying resource, measured by
    /// seeking to its end, not the bytes remaining from the current position.
    pub async fn from_seekable<R>(mut reader: R) -> io::Result<Self>
    where
        R: SeekRead + 'static,
    {
        let size = reader.seek(SeekFrom::End(0)).await?;
        reader.seek(SeekFrom::Start(0)).await?;
        Ok(Body::Seekable {
            handle: Arc::new(Mutex::new(Box::new(reader))),
            size: Some(size),
            limit: None,
        })
    }

    /// A body produced by a function that returns a fresh stream per call.
    pub fn from_fn<F>(size: Option<u64>, open: F) -> Self
    where
        F: Fn() -> io::Result<RequestBody> + Send + Sync + 'static,
    {
        Body::Opener(Arc::new(FnOpener { open, size }))
    }

    /// A body backed by a caller-supplied [`Opener`], used as-is.
    pub fn from_opener(opener: impl Opener + 'static) -> Self {
        Body::Opener(Arc::new(opener))
    }

    /// Total size of the content, `None` when unknown.
    pub fn size(&self) -> Option<u64> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(bytes) => Some(bytes.len() as u64),
            Body::Seekable { size, .. } => *size,
            Body::Opener(opener) => opener.size(),
        }
    }

    /// Check if the body is known to be empty.
    pub fn is_empty(&self) -> bool {
        self.size() == Some(0)
    }

    /// Open a fresh stream over the content.
    pub async fn open(&self) -> io::Result<RequestBody> {
        match self {
            Body::Empty => Ok(RequestBody::empty()),
            Body::Bytes(bytes) => Ok(RequestBody::full(bytes.clone())),
            Body::Seekable {
                handle,
                size,
                limit,
            } => {
                let mut guard = Arc::clone(handle).lock_owned().await;
                guard.seek(SeekFrom::Start(0)).await?;
                let reader = LockedReader(guard);
                let stream: ChunkStream = match limit {
                    Some(limit) => Box::pin(ReaderStream::new(reader.take(*limit))),
                    None => Box::pin(ReaderStream::new(reader)),
                };
                Ok(RequestBody::stream(stream, *size))
            }
            Body::Opener(opener) => opener.open().await,
        }
    }
}

#[async_trait]
impl Opener for Body {
    async fn open(&self) -> io::Result<RequestBody> {
        Body::open(self).await
    }

    fn size(&self) -> Option<u64> {
        Body::size(self)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(bytes))
    }
}

struct FnOpener<F> {
    open: F,
    size: Option<u64>,
}

#[async_trait]
impl<F> Opener for FnOpener<F>
where
    F: Fn() -> io::Result<RequestBody> + Send + Sync,
{
    async fn open(&self) -> io::Result<RequestBody> {
        (self.open)()
    }

    fn size(&self) -> Option<u64> {
        self.size
    }
}

/// Reader that holds the handle lock for as long as the stream lives.
struct LockedReader(OwnedMutexGuard<Box<dyn SeekRead>>);

impl AsyncRead for LockedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let reader: &mut dyn SeekRead = &mut **self.get_mut().0;
        Pin::new(reader).poll_read(cx, buf)
    }
}

enum Inner {
    Full(Option<Bytes>),
    Stream(ChunkStream),
}

/// A single opened request body stream.
pub struct RequestBody {
    inner: Inner,
    size: Option<u64>,
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl RequestBody {
    /// An empty body.
    pub fn empty() -> Self {
        Self {
            inner: Inner::Full(None),
            size: Some(0),
        }
    }

    /// A body over in-memory bytes.
    pub fn full(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            size: Some(bytes.len() as u64),
            inner: Inner::Full(Some(bytes)),
        }
    }

    /// A body over a chunk stream with a known or unknown size.
    pub fn stream(stream: ChunkStream, size: Option<u64>) -> Self {
        Self {
            inner: Inner::Stream(stream),
            size,
        }
    }

    /// Wrap any chunk stream.
    pub fn wrap_stream<S>(stream: S, size: Option<u64>) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::stream(Box::pin(stream), size)
    }

    /// Declared size, `None` when unknown.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Convert into a chunk stream.
    pub fn into_stream(self) -> ChunkStream {
        match self.inner {
            Inner::Full(bytes) => Box::pin(futures::stream::iter(
                bytes.filter(|b| !b.is_empty()).map(Ok::<_, io::Error>),
            )),
            Inner::Stream(stream) => stream,
        }
    }

    /// Read the whole body into memory.
    pub async fn bytes(self) -> io::Result<Bytes> {
        match self.inner {
            Inner::Full(bytes) => Ok(bytes.unwrap_or_default()),
            Inner::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl http_body::Body for RequestBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Frame<Bytes>>>> {
        match &mut self.get_mut().inner {
            Inner::Full(bytes) => Poll::Ready(
                bytes
                    .take()
                    .filter(|b| !b.is_empty())
                    .map(|b| Ok(Frame::data(b))),
            ),
            Inner::Stream(stream) => stream
                .as_mut()
                .poll_next(cx)
                .map(|chunk| chunk.map(|r| r.map(Frame::data))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Inner::Full(bytes) => bytes.as_ref().is_none_or(|b| b.is_empty()),
            Inner::Stream(_) => self.size == Some(0),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Inner::Full(bytes) => {
                SizeHint::with_exact(bytes.as_ref().map_or(0, |b| b.len() as u64))
            }
            Inner::Stream(_) => match self.size {
                Some(size) => SizeHint::with_exact(size),
                None => SizeHint::default(),
            },
        }
    }
}

impl From<RequestBody> for reqwest::Body {
    fn from(body: RequestBody) -> Self {
        match body.inner {
            Inner::Full(bytes) => reqwest::Body::from(bytes.unwrap_or_default()),
            Inner::Stream(stream) => reqwest::Body::wrap_stream(stream),
        }
    }
}
