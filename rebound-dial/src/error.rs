//! Dialer error types.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

/// Errors returned by [`RestrictedDialer::dial`](crate::RestrictedDialer::dial).
///
/// When the connection was established but then refused by the policy (or its
/// peer address could not be read), the live [`TcpStream`] travels with the
/// error so the caller decides when to release it. Use [`DialError::take_conn`]
/// to claim it; dropping the error closes it.
#[derive(Debug, Error)]
pub enum DialError {
    /// The underlying connect failed; no connection exists.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The connect did not finish within the configured timeout.
    #[error("timed out after {timeout:?} connecting to {addr}")]
    Timeout {
        /// Address that was dialed.
        addr: String,
        /// Configured connect timeout.
        timeout: Duration,
    },

    /// The connected peer is a restricted destination.
    #[error("destination {peer} resolves to an internal network location")]
    InternalResolution {
        /// Peer address of the established connection.
        peer: SocketAddr,
        /// The established connection, if not yet taken.
        conn: Option<TcpStream>,
    },

    /// The peer address of the established connection could not be read.
    #[error("failed to parse remote address: {source}")]
    RemoteAddr {
        /// Underlying I/O error.
        source: io::Error,
        /// The established connection, if not yet taken.
        conn: Option<TcpStream>,
    },
}

impl DialError {
    /// Take the established connection out of the error, if there is one.
    pub fn take_conn(&mut self) -> Option<TcpStream> {
        match self {
            Self::InternalResolution { conn, .. } | Self::RemoteAddr { conn, .. } => conn.take(),
            Self::Connect { .. } | Self::Timeout { .. } => None,
        }
    }

    /// Check if the connection was refused because of the destination policy.
    pub fn is_internal_resolution(&self) -> bool {
        matches!(self, Self::InternalResolution { .. })
    }

    /// Check if this is a connect timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Connect { source, .. } => source.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Drop any connection carried by the error, closing it.
    pub(crate) fn without_conn(mut self) -> Self {
        drop(self.take_conn());
        self
    }
}
