//! Resolve the caller's public IP from proxy headers.

use std::net::IpAddr;
use std::sync::LazyLock;

use axum::http::HeaderMap;
use ipnet::IpNet;
use tracing::debug;

/// Headers consulted in order. `X-Forwarded-For` contributes its first entry only.
pub const CLIENT_IP_HEADERS: [&str; 4] = [
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip",
    "x-client-ip",
];

/// Ranges that cannot be geolocated.
static NON_PUBLIC_RANGES: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "::/128",
        "::1/128",
        "fc00::/7",
        "fe80::/10",
    ]
    .iter()
    .filter_map(|cidr| cidr.parse().ok())
    .collect()
});

/// True when `ip` is routable on the public internet.
pub fn is_public_ip(ip: &IpAddr) -> bool {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(*ip),
        IpAddr::V4(_) => *ip,
    };
    !NON_PUBLIC_RANGES.iter().any(|range| range.contains(&ip))
}

fn parse_public(value: &str) -> Option<IpAddr> {
    let ip = value.trim().parse::<IpAddr>().ok()?;
    if is_public_ip(&ip) {
        Some(ip)
    } else {
        debug!(%ip, "Skipping private/local IP");
        None
    }
}

/// First public address among the proxy headers, then the socket peer.
///
/// Returns `None` when nothing usable is found, which callers treat as
/// "use the fallback location".
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    for name in CLIENT_IP_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let candidate = if name == "x-forwarded-for" {
            value.split(',').next().unwrap_or_default()
        } else {
            value
        };
        if let Some(ip) = parse_public(candidate) {
            debug!(header = name, %ip, "Using client IP from header");
            return Some(ip);
        }
    }

    peer.filter(is_public_ip)
}
