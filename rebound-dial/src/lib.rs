//! Destination-restricting TCP dialer.
//!
//! [`RestrictedDialer`] connects first and then checks the peer address of the
//! established socket against an allow/deny policy. Because the decision is
//! made on the address that was actually connected to, a hostname that
//! resolves to a public address during validation and to an internal one
//! during the connect (DNS rebinding) is still refused.
//!
//! # Example
//!
//! ```no_run
//! use rebound_dial::RestrictedDialer;
//!
//! # async fn example() -> Result<(), rebound_dial::DialError> {
//! let dialer = RestrictedDialer::new();
//! let conn = dialer.dial("example.com:80").await?;
//! # drop(conn);
//! # Ok(())
//! # }
//! ```
//!
//! For hyper-based clients, [`RestrictedDialer::connector`] produces a
//! [`RestrictedConnector`] that applies the same policy to every connection
//! the client pool opens.

mod connector;
mod dialer;
mod error;
pub mod ip;

pub use connector::{BoxError, RestrictedConnector};
pub use dialer::RestrictedDialer;
pub use error::DialError;
pub use ipnet::IpNet;
