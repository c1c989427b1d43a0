use std::net::IpAddr;

use url::{Host, Url};

use hookgate_common::net;

/// Check an outbound URL against internal targets.
///
/// Rejects non-HTTP schemes, missing hosts, `localhost` names and any
/// loopback, private, link-local or unspecified address. Hostnames are
/// resolved and every returned address is checked; a failed lookup is let
/// through since the request itself will fail.
pub async fn validate_url(raw: &str) -> Result<Url, String> {
    let url = parse_http_url(raw)?;

    match url.host() {
        None => Err("URL must have a host".to_string()),
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip)).map(|_| url.clone()),
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip)).map(|_| url.clone()),
        Some(Host::Domain(domain)) => {
            let lower = domain.to_ascii_lowercase();
            if lower.is_empty() {
                return Err("URL must have a host".to_string());
            }
            if lower == "localhost" || lower == "localhost.localdomain" {
                return Err("requests to localhost are not allowed".to_string());
            }

            let port = url.port_or_known_default().unwrap_or(80);
            if let Ok(addrs) = tokio::net::lookup_host((lower.as_str(), port)).await {
                for addr in addrs {
                    check_ip(addr.ip())
                        .map_err(|e| format!("hostname resolves to blocked address: {}", e))?;
                }
            }
            Ok(url.clone())
        }
    }
}

/// Parse `raw` and require an http or https scheme, without looking at the
/// target address.
pub fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid URL: {}", e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("URL scheme must be http or https, got \"{}\"", url.scheme()));
    }
    Ok(url)
}

pub fn check_ip(ip: IpAddr) -> Result<(), String> {
    if net::is_loopback(ip) {
        return Err("requests to loopback addresses are not allowed".to_string());
    }
    if net::is_private(ip) {
        return Err("requests to private network addresses are not allowed".to_string());
    }
    if net::is_link_local(ip) || net::is_link_local_multicast(ip) {
        return Err("requests to link-local addresses are not allowed".to_string());
    }
    if net::is_unspecified(ip) {
        return Err("requests to unspecified addresses are not allowed".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_internal_targets() {
        for url in [
            "http://localhost/x",
            "http://LOCALHOST.localdomain/x",
            "http://127.0.0.1:8080/",
            "http://[::1]/",
            "http://10.0.0.5/",
            "http://192.168.1.1/",
            "http://169.254.169.254/latest/meta-data",
            "http://[fe80::1]/",
            "http://0.0.0.0/",
            "http://[::ffff:127.0.0.1]/",
        ] {
            assert!(validate_url(url).await.is_err(), "{} should be blocked", url);
        }
    }

    #[tokio::test]
    async fn rejects_bad_scheme_and_garbage() {
        assert!(validate_url("ftp://8.8.8.8/file").await.is_err());
        assert!(validate_url("file:///etc/passwd").await.is_err());
        assert!(validate_url("not a url").await.is_err());
    }

    #[tokio::test]
    async fn allows_public_addresses() {
        assert!(validate_url("https://8.8.8.8/hook").await.is_ok());
        assert!(validate_url("http://[2606:4700:4700::1111]/").await.is_ok());
    }

    #[tokio::test]
    async fn unresolvable_host_is_allowed() {
        assert!(validate_url("https://does-not-exist.invalid/hook").await.is_ok());
    }
}
