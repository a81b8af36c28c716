// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::IpAddr;
use tokio::net::lookup_host;
use url::{Host, Url};

use crate::engines::traits::EngineError;

/// 验证 URL 是否安全 (防止 SSRF)
///
/// 检查主机解析出的所有 IP，拒绝私有、环回、链路本地和组播地址。
/// `allow_private_networks` 为 true 时跳过检查。
pub async fn validate_url(url: &Url, allow_private_networks: bool) -> Result<(), EngineError> {
    if allow_private_networks {
        return Ok(());
    }

    let host = url
        .host()
        .ok_or_else(|| EngineError::Blocked("URL has no host".to_string()))?;

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<IpAddr> = match host {
        Host::Ipv4(ip) => vec![IpAddr::V4(ip)],
        Host::Ipv6(ip) => vec![IpAddr::V6(ip)],
        Host::Domain(domain) => {
            if domain.eq_ignore_ascii_case("localhost") {
                return Err(EngineError::Blocked("localhost is not allowed".to_string()));
            }
            lookup_host(format!("{}:{}", domain, port))
                .await
                .map_err(|e| EngineError::Other(format!("DNS lookup failed for {}: {}", domain, e)))?
                .map(|addr| addr.ip())
                .collect()
        }
    };

    for ip in addrs {
        if is_private_ip(ip) {
            return Err(EngineError::Blocked(format!(
                "private address {} is not allowed",
                ip
            )));
        }
    }

    Ok(())
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_multicast()
                || ipv4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        }
        IpAddr::V6(ipv6) => {
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(mapped));
            }
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique Local Address (fc00::/7)
                || (first & 0xfe00) == 0xfc00
                // Link-local (fe80::/10)
                || (first & 0xffc0) == 0xfe80
                // Multicast (ff00::/8)
                || (first & 0xff00) == 0xff00
        }
    }
}
