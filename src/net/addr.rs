//! Address helpers shared by client and server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use crate::codec::envelope::LOCALHOST;

/// Best-effort outbound IPv4 of this host.
///
/// Connecting a UDP socket sends nothing; it only asks the OS which local
/// interface would route to a public address. Falls back to loopback.
pub fn detect_local_ip() -> String {
    let local_ip = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };
    match local_ip() {
        Ok(ip) if !ip.is_unspecified() => ip.to_string(),
        _ => LOCALHOST.to_string(),
    }
}

/// URL clients should use to reach a listener bound at `addr`.
///
/// A wildcard bind is reported as loopback.
pub fn public_url(addr: SocketAddr, tls: bool) -> String {
    let scheme = if tls { "https" } else { "http" };
    let ip = if addr.ip().is_unspecified() {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        addr.ip()
    };
    match ip {
        IpAddr::V4(v4) => format!("{scheme}://{v4}:{}", addr.port()),
        IpAddr::V6(v6) => format!("{scheme}://[{v6}]:{}", addr.port()),
    }
}
