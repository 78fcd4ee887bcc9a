// Rebound - an HTTP client whose requests survive retries
//
// This library re-exports the client, the restricted dialer, and (with the
// `log` feature) the tracing setup used by both.

// Re-export the client
pub use rebound_http::*;

// Re-export the dialer crate
pub use rebound_dial;

// Re-export optional crates
#[cfg(feature = "log")]
pub use rebound_log;

// Prelude for common imports
pub mod prelude {
    pub use rebound_http::prelude::*;
    pub use rebound_http::{Body, Response, StatusErrorHook};
}
