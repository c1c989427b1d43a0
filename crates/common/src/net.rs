//! Address classification shared by client identification and outbound
//! request validation.

use std::net::IpAddr;

use ipnet::IpNet;

const PRIVATE_RANGES: [&str; 4] = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "fc00::/7"];
const LINK_LOCAL_RANGES: [&str; 2] = ["169.254.0.0/16", "fe80::/10"];
const LINK_LOCAL_MULTICAST_RANGES: [&str; 2] = ["224.0.0.0/24", "ff02::/16"];

/// Unwrap IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) so that range checks
/// see the embedded IPv4 address.
pub fn canonical(addr: IpAddr) -> IpAddr {
    addr.to_canonical()
}

pub fn is_loopback(addr: IpAddr) -> bool {
    canonical(addr).is_loopback()
}

/// RFC 1918 and RFC 4193 (unique local) ranges.
pub fn is_private(addr: IpAddr) -> bool {
    in_any(addr, &PRIVATE_RANGES)
}

pub fn is_link_local(addr: IpAddr) -> bool {
    in_any(addr, &LINK_LOCAL_RANGES)
}

pub fn is_link_local_multicast(addr: IpAddr) -> bool {
    in_any(addr, &LINK_LOCAL_MULTICAST_RANGES)
}

pub fn is_unspecified(addr: IpAddr) -> bool {
    canonical(addr).is_unspecified()
}

fn in_any(addr: IpAddr, ranges: &[&str]) -> bool {
    let addr = canonical(addr);
    ranges
        .iter()
        .filter_map(|cidr| cidr.parse::<IpNet>().ok())
        .any(|net| net.contains(&addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_private_ranges() {
        assert!(is_private(ip("10.1.2.3")));
        assert!(is_private(ip("172.16.0.1")));
        assert!(is_private(ip("172.31.255.255")));
        assert!(is_private(ip("192.168.0.10")));
        assert!(is_private(ip("fd12::1")));

        assert!(!is_private(ip("172.32.0.1")));
        assert!(!is_private(ip("8.8.8.8")));
        assert!(!is_private(ip("2001:db8::1")));
    }

    #[test]
    fn test_mapped_ipv4_is_unwrapped() {
        assert!(is_private(ip("::ffff:10.0.0.1")));
        assert!(is_loopback(ip("::ffff:127.0.0.1")));
    }

    #[test]
    fn test_link_local_and_loopback() {
        assert!(is_link_local(ip("169.254.169.254")));
        assert!(is_link_local(ip("fe80::1")));
        assert!(is_link_local_multicast(ip("224.0.0.251")));
        assert!(is_loopback(ip("127.0.0.1")));
        assert!(is_loopback(ip("::1")));
        assert!(is_unspecified(ip("0.0.0.0")));
        assert!(!is_link_local(ip("1.1.1.1")));
    }
}
