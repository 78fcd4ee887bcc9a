//! # Rebound HTTP Client
//!
//! An HTTP client whose requests survive retries.
//!
//! ## Features
//!
//! - **Replayable Bodies**: Request bodies are reopened from the start for every attempt
//! - **Retry-After**: Throttling responses set the next delay, within configurable bounds
//! - **Backoff**: Configurable retry strategies (exponential, linear, constant)
//! - **Bounded Draining**: Closing a response reads at most 16 KiB of the remaining body
//! - **Restricted Connections**: Optional peer verification against a [`RestrictedDialer`]
//! - **Hooks**: Inspect or replace transport errors and error responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rebound_http::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientConfig::default())?;
//!
//!     let mut response = client
//!         .get("https://api.example.com/users")
//!         .send()
//!         .await?;
//!
//!     println!("Status: {}", response.status());
//!     response.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Retries and Restricted Connections
//!
//! ```rust,no_run
//! use rebound_http::{BackoffStrategy, Client, ClientConfig, RestrictedDialer};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .max_attempts(5)
//!         .backoff(BackoffStrategy::Exponential {
//!             initial: Duration::from_millis(200),
//!             max: Duration::from_secs(10),
//!             multiplier: 2.0,
//!         })
//!         .retry_after(Duration::from_secs(1), Duration::from_secs(60))
//!         .restrict(RestrictedDialer::new())
//!         .build()?;
//!
//!     let client = Client::new(config)?;
//!
//!     // The JSON body is replayed on every attempt.
//!     let response = client
//!         .post("https://api.example.com/orders")
//!         .json(&serde_json::json!({"item": "widget", "quantity": 5}))
//!         .send()
//!         .await?
//!         .error_for_status()
//!         .await?;
//!
//!     let order: serde_json::Value = response.json().await?;
//!     println!("{order}");
//!     Ok(())
//! }
//! ```

mod body;
mod client;
mod config;
mod context;
mod error;
mod hooks;
mod request;
mod response;
mod retry;
mod retry_after;
mod settings;
pub mod transport;

pub use body::{Body, ChunkStream, Opener, RequestBody, SeekRead};
pub use client::{Client, RequestOptions};
pub use config::{ClientConfig, ClientConfigBuilder, TransportConfig};
pub use context::{Context, ContextError};
pub use error::{
    BoxError, ContentError, Error, RequestError, Result, STATUS_ERROR_DATA_LIMIT, StatusError,
};
pub use hooks::{AttemptContext, ErrorHook, ErrorResponseHook, StatusErrorHook};
pub use request::{Request, RequestBuilder};
pub use response::{DRAIN_LIMIT, Response, ResponseBody};
pub use retry::{
    BackoffStrategy, DEFAULT_RETRY_STATUS_CODES, PolicyFactory, Retrier, RetryConfig,
    RetryPolicy,
};
pub use retry_after::{RetryAfterError, parse_retry_after, parse_retry_after_at};
pub use settings::{Settings, SettingsError};
pub use transport::{Transport, TransportLayer};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use rebound_dial::{DialError, IpNet, RestrictedDialer};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use rebound_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::body::Body;
    pub use crate::client::{Client, RequestOptions};
    pub use crate::config::{ClientConfig, ClientConfigBuilder, TransportConfig};
    pub use crate::context::Context;
    pub use crate::error::{Error, Result};
    pub use crate::request::{Request, RequestBuilder};
    pub use crate::response::Response;
    pub use crate::retry::{BackoffStrategy, RetryConfig, RetryPolicy};
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
    pub use rebound_dial::RestrictedDialer;
}
