use std::net::{IpAddr, SocketAddr};

use http::HeaderMap;

use hookgate_common::net;

/// Identity used when the connection carries no peer address at all.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client identity used as the rate-limit key.
///
/// `peer` is the raw remote address of the connection (`ip:port` or a bare
/// IP). Forwarding headers are honoured only when the peer itself is a
/// loopback or private address, i.e. a reverse proxy we control; otherwise a
/// client could pick its own identity.
pub fn client_identity(peer: &str, headers: &HeaderMap) -> String {
    let peer_ip = parse_peer(peer);

    let trusted_proxy = peer_ip.is_some_and(|ip| net::is_loopback(ip) || net::is_private(ip));
    if trusted_proxy {
        if let Some(forwarded) = forwarded_for(headers) {
            return forwarded;
        }
        if let Some(real_ip) = header_str(headers, "x-real-ip") {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return real_ip.to_string();
            }
        }
    }

    match peer_ip {
        Some(ip) => ip.to_string(),
        None => peer.to_string(),
    }
}

fn parse_peer(peer: &str) -> Option<IpAddr> {
    if let Ok(addr) = peer.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    peer.parse::<IpAddr>().ok()
}

/// First entry of `X-Forwarded-For`, if non-empty.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, "x-forwarded-for")?;
    let first = value.split(',').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
