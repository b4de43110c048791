//! Client IP extraction from HTTP headers
//!
//! The first source present wins, in priority order:
//! - `Client-IP`
//! - `X-Forwarded-For` (leftmost address of the list)
//! - the socket remote address
//!
//! A present source that does not hold a well-formed address yields the
//! [`UNKNOWN_IP`] sentinel instead of falling through to the next source.

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr};

pub const UNKNOWN_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

const CLIENT_IP_HEADER: &str = "client-ip";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Extract the client IP address for an ingestion request
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `socket_addr` - The socket remote address, when the server recorded one
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: Option<IpAddr>) -> IpAddr {
    let candidate = headers
        .get(CLIENT_IP_HEADER)
        .or_else(|| headers.get(FORWARDED_FOR_HEADER))
        .map(|value| value.to_str().ok().map(str::to_string));

    let raw = match candidate {
        Some(Some(raw)) => raw,
        Some(None) => return UNKNOWN_IP,
        None => return socket_addr.unwrap_or(UNKNOWN_IP),
    };

    raw.split(',')
        .next()
        .map(str::trim)
        .and_then(|first| first.parse::<IpAddr>().ok())
        .unwrap_or(UNKNOWN_IP)
}

/// Anonymize an IP address by truncating to network prefix
///
/// - IPv4: Truncate to /24 (zero last octet)
/// - IPv6: Truncate to /48 (zero last 80 bits)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    let prefix_len = match ip {
        IpAddr::V4(_) => 24,
        IpAddr::V6(_) => 48,
    };

    IpNet::new(ip, prefix_len)
        .map(|net| net.network())
        .unwrap_or(ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn socket() -> Option<IpAddr> {
        Some("192.168.1.1".parse().unwrap())
    }

    #[test]
    fn test_socket_address_without_headers() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, socket()), socket().unwrap());
    }

    #[test]
    fn test_missing_everything_is_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, None), UNKNOWN_IP);
    }

    #[test]
    fn test_client_ip_header_takes_priority() {
        let mut headers = HeaderMap::new();
        headers.insert("client-ip", HeaderValue::from_static("203.0.113.9"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.1"),
        );

        let result = extract_client_ip(&headers, socket());
        assert_eq!(result, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_x_forwarded_for_uses_first_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );

        let result = extract_client_ip(&headers, socket());
        assert_eq!(result, "203.0.113.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_ipv6_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("2001:db8::7"));

        let result = extract_client_ip(&headers, socket());
        assert_eq!(result, "2001:db8::7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_malformed_header_yields_sentinel() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));

        assert_eq!(extract_client_ip(&headers, socket()), UNKNOWN_IP);
    }

    #[test]
    fn test_anonymize_ipv4() {
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        let anonymized = anonymize_ip(ip);
        assert_eq!(anonymized, "192.168.1.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_anonymize_ipv6() {
        let ip: IpAddr = "2001:db8::1234:5678".parse().unwrap();
        let anonymized = anonymize_ip(ip);
        // Should zero out everything after first 48 bits (3 segments)
        assert_eq!(anonymized, "2001:db8::".parse::<IpAddr>().unwrap());
    }
}
