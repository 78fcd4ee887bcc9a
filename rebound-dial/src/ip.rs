//! Address classification used by the dialer policy.
//!
//! All predicates expect a canonical address: IPv4-mapped IPv6 addresses must
//! be converted with [`IpAddr::to_canonical`] first.

use std::net::IpAddr;

/// Private address space.
///
/// - 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16 (RFC 1918)
/// - fc00::/7 (RFC 4193)
pub fn is_private(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

/// Loopback addresses: 127.0.0.0/8 and ::1/128.
pub fn is_loopback(addr: IpAddr) -> bool {
    addr.is_loopback()
}

/// Link-local unicast: 169.254.0.0/16 (RFC 3927) and fe80::/10 (RFC 4291).
pub fn is_link_local_unicast(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// Link-local multicast: 224.0.0.0/24 and ff02::/16 (any flags).
pub fn is_link_local_multicast(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            a == 224 && b == 0 && c == 0
        }
        IpAddr::V6(v6) => (v6.segments()[0] & 0xff0f) == 0xff02,
    }
}

/// Interface-local multicast: ff01::/16 (any flags). IPv4 has no equivalent.
pub fn is_interface_local_multicast(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(_) => false,
        IpAddr::V6(v6) => (v6.segments()[0] & 0xff0f) == 0xff01,
    }
}
