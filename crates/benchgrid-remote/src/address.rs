//! Node address normalization.

use std::net::{IpAddr, SocketAddr};

/// Default SSH port appended to bare host names.
pub const SSH_PORT: u16 = 22;

/// Return `address` with an explicit port, adding the SSH port if missing.
///
/// Accepts `host`, `host:port`, `ip`, `ip:port`, `[v6]:port` and bare IPv6.
pub fn ensure_port(address: &str) -> String {
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return SocketAddr::new(ip, SSH_PORT).to_string();
    }
    if let Some((host, port)) = address.rsplit_once(':') {
        if !host.contains(':') && port.parse::<u16>().is_ok() {
            return address.to_string();
        }
    }
    format!("{address}:{SSH_PORT}")
}
