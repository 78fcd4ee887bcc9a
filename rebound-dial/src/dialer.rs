//! The restricted dialer.

use crate::{DialError, ip};
use ipnet::IpNet;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, warn};

/// A TCP dialer that restricts the IP addresses it is allowed to connect to.
///
/// It is designed for untrusted (user-provided) hostnames such as webhook
/// targets or remote file downloads, and avoids unintended internal access or
/// information disclosure.
///
/// The check runs against the peer address of the *connected* socket rather
/// than a DNS answer obtained before connecting, which makes it safe against
/// DNS rebinding. Redirects can be followed freely while it is in use.
///
/// Evaluation order is: [`allowed_prefixes`](Self::allowed_prefixes), then
/// [`blocked_prefixes`](Self::blocked_prefixes), then the boolean toggles,
/// and finally allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedDialer {
    /// Prefixes that are always allowed, no matter what other options are
    /// configured, including [`blocked_prefixes`](Self::blocked_prefixes).
    pub allowed_prefixes: Vec<IpNet>,

    /// Prefixes that are blocked unless an allowed prefix also matches.
    pub blocked_prefixes: Vec<IpNet>,

    /// Block private addresses (RFC 1918, RFC 4193).
    pub private: bool,

    /// Block loopback addresses (127.0.0.0/8, ::1/128).
    pub loopback: bool,

    /// Block link-local unicast addresses (169.254.0.0/16, fe80::/10).
    pub link_local_unicast: bool,

    /// Block link-local multicast addresses (224.0.0.0/24, ff02::/16).
    pub link_local_multicast: bool,

    /// Block IPv6 interface-local multicast addresses (ff01::/16).
    pub interface_local_multicast: bool,

    /// Optional timeout for [`dial`](Self::dial).
    pub connect_timeout: Option<Duration>,
}

impl Default for RestrictedDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl RestrictedDialer {
    /// Create a dialer with every predefined restriction enabled.
    ///
    /// Callers may adjust the returned dialer to carve out exceptions.
    pub fn new() -> Self {
        Self {
            allowed_prefixes: Vec::new(),
            blocked_prefixes: Vec::new(),
            private: true,
            loopback: true,
            link_local_unicast: true,
            link_local_multicast: true,
            interface_local_multicast: true,
            connect_timeout: None,
        }
    }

    /// Create a dialer with no restrictions enabled.
    pub fn permissive() -> Self {
        Self {
            private: false,
            loopback: false,
            link_local_unicast: false,
            link_local_multicast: false,
            interface_local_multicast: false,
            ..Self::new()
        }
    }

    /// Always allow addresses within `prefix`.
    pub fn allow(mut self, prefix: IpNet) -> Self {
        self.allowed_prefixes.push(prefix);
        self
    }

    /// Block addresses within `prefix` unless explicitly allowed.
    pub fn block(mut self, prefix: IpNet) -> Self {
        self.blocked_prefixes.push(prefix);
        self
    }

    /// Enable or disable blocking of private addresses.
    pub fn private(mut self, block: bool) -> Self {
        self.private = block;
        self
    }

    /// Enable or disable blocking of loopback addresses.
    pub fn loopback(mut self, block: bool) -> Self {
        self.loopback = block;
        self
    }

    /// Enable or disable blocking of link-local unicast addresses.
    pub fn link_local_unicast(mut self, block: bool) -> Self {
        self.link_local_unicast = block;
        self
    }

    /// Enable or disable blocking of link-local multicast addresses.
    pub fn link_local_multicast(mut self, block: bool) -> Self {
        self.link_local_multicast = block;
        self
    }

    /// Enable or disable blocking of interface-local multicast addresses.
    pub fn interface_local_multicast(mut self, block: bool) -> Self {
        self.interface_local_multicast = block;
        self
    }

    /// Set the timeout used by [`dial`](Self::dial).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Check if `addr` may be connected to.
    pub fn is_allowed(&self, addr: IpAddr) -> bool {
        let addr = addr.to_canonical();

        if self.allowed_prefixes.iter().any(|p| p.contains(&addr)) {
            return true;
        }

        if self.blocked_prefixes.iter().any(|p| p.contains(&addr)) {
            return false;
        }

        if self.private && ip::is_private(addr) {
            return false;
        }

        if self.loopback && ip::is_loopback(addr) {
            return false;
        }

        if self.link_local_unicast && ip::is_link_local_unicast(addr) {
            return false;
        }

        if self.link_local_multicast && ip::is_link_local_multicast(addr) {
            return false;
        }

        if self.interface_local_multicast && ip::is_interface_local_multicast(addr) {
            return false;
        }

        true
    }

    /// Validate the peer of an established connection.
    ///
    /// On rejection the connection is handed back inside the error.
    pub fn verify(&self, conn: TcpStream) -> Result<TcpStream, DialError> {
        let peer = match conn.peer_addr() {
            Ok(peer) => peer,
            Err(source) => {
                return Err(DialError::RemoteAddr {
                    source,
                    conn: Some(conn),
                });
            }
        };

        if !self.is_allowed(peer.ip()) {
            warn!(%peer, "Refusing connection to restricted destination");
            return Err(DialError::InternalResolution {
                peer,
                conn: Some(conn),
            });
        }

        debug!(%peer, "Connection passed destination policy");
        Ok(conn)
    }

    /// Connect to `addr` and validate the resolved peer address.
    ///
    /// The real connection is made first; the policy is evaluated against the
    /// connected socket. A refused connection is returned inside the error,
    /// never silently retried against another destination.
    pub async fn dial<A>(&self, addr: A) -> Result<TcpStream, DialError>
    where
        A: ToSocketAddrs + ToString,
    {
        let label = addr.to_string();
        let connecting = TcpStream::connect(addr);

        let connected = match self.connect_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(DialError::Timeout {
                        addr: label,
                        timeout,
                    });
                }
            },
            None => connecting.await,
        };

        let conn = connected.map_err(|source| DialError::Connect {
            addr: label,
            source,
        })?;

        self.verify(conn)
    }
}
