use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;

/// Resolve the client address used for rate limiting.
///
/// `X-Forwarded-For` is honoured only when the socket peer is a trusted proxy.
/// Hops are read right to left, since each proxy appends the address it saw,
/// and the first one outside the trusted ranges is the client. Everything left
/// of it was supplied by the client and is ignored.
pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[IpNet]) -> IpAddr {
    let peer = peer.unwrap_or(IpAddr::from([127, 0, 0, 1]));
    let is_trusted = |ip: &IpAddr| trusted_proxies.iter().any(|net| net.contains(ip));

    if !is_trusted(&peer) {
        return peer;
    }

    let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) else {
        return peer;
    };

    let mut client = peer;
    for hop in xff.rsplit(',').map(str::trim) {
        // An unparseable hop ends the trusted chain.
        let Ok(ip) = hop.parse::<IpAddr>() else {
            break;
        };
        client = ip;
        if !is_trusted(&ip) {
            break;
        }
    }
    client
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn xff(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn untrusted_peer_ignores_forwarded_header() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        assert_eq!(resolve(&xff("1.2.3.4"), Some(peer), &[]), peer);
    }

    #[test]
    fn trusted_peer_uses_rightmost_untrusted_hop() {
        let proxies: Vec<IpNet> = vec!["10.0.0.0/8".parse().unwrap()];
        let peer: IpAddr = "10.0.0.2".parse().unwrap();
        assert_eq!(
            resolve(&xff("10.1.1.1, 198.51.100.7, 10.0.0.3"), Some(peer), &proxies),
            "198.51.100.7".parse::<IpAddr>().unwrap()
        );
        assert_eq!(resolve(&HeaderMap::new(), Some(peer), &proxies), peer);
    }

    #[test]
    fn client_supplied_hops_are_ignored() {
        let proxies: Vec<IpNet> = vec!["127.0.0.0/8".parse().unwrap()];
        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        let real: IpAddr = "203.0.113.7".parse().unwrap();

        assert_eq!(resolve(&xff("198.51.100.1, 203.0.113.7"), Some(peer), &proxies), real);
        assert_eq!(resolve(&xff("198.51.100.2, 203.0.113.7"), Some(peer), &proxies), real);
        assert_eq!(resolve(&xff("garbage, 203.0.113.7, 127.0.0.5"), Some(peer), &proxies), real);
    }

    #[test]
    fn unparseable_or_all_trusted_chain() {
        let proxies: Vec<IpNet> = vec!["10.0.0.0/8".parse().unwrap()];
        let peer: IpAddr = "10.0.0.2".parse().unwrap();

        assert_eq!(resolve(&xff("198.51.100.7, junk"), Some(peer), &proxies), peer);
        assert_eq!(
            resolve(&xff("10.9.9.9, 10.0.0.3"), Some(peer), &proxies),
            "10.9.9.9".parse::<IpAddr>().unwrap()
        );
    }
}
