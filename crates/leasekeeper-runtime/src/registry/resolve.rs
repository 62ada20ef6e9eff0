use std::net::{IpAddr, Ipv4Addr};

/// Address advertised when the host name cannot be resolved.
pub const FALLBACK_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Resolve the address advertised as `ipAddr`.
///
/// IPv4 results are preferred. Resolution failure falls back to the
/// loopback address and never fails the registration.
pub async fn resolve_ip(host: &str) -> IpAddr {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip;
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => {
            let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
            addrs
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| addrs.first())
                .copied()
                .unwrap_or_else(|| {
                    tracing::warn!(host = %host, "No address for host, using {}", FALLBACK_IP);
                    FALLBACK_IP
                })
        }
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "Could not resolve host, using {}", FALLBACK_IP);
            FALLBACK_IP
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_literal_address_is_returned() {
        assert_eq!(resolve_ip("10.1.2.3").await, "10.1.2.3".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_localhost_resolves() {
        assert!(resolve_ip("localhost").await.is_loopback());
    }

    #[tokio::test]
    async fn test_unresolvable_host_falls_back() {
        assert_eq!(resolve_ip("no-such-host.invalid").await, FALLBACK_IP);
    }
}
