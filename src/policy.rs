use crate::error::PreviewError;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::Url;

/// Which links a network is allowed to fetch for previews.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkPolicyConfig {
    /// Allowed URL schemes (default: ["http", "https"])
    pub allowed_schemes: HashSet<String>,
    /// Refuse loopback, private, link-local and other reserved addresses
    /// when the host is an IP literal or `localhost` (default: false)
    pub block_private_addresses: bool,
    /// Domains (and their subdomains) never fetched
    pub blocked_domains: HashSet<String>,
}

impl Default for LinkPolicyConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: ["http", "https"].iter().map(|s| s.to_string()).collect(),
            block_private_addresses: false,
            blocked_domains: HashSet::new(),
        }
    }
}

/// Checks a URL against a [`LinkPolicyConfig`] before anything is fetched.
#[derive(Debug, Clone, Default)]
pub struct LinkPolicy {
    config: LinkPolicyConfig,
}

impl LinkPolicy {
    pub fn new(config: LinkPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LinkPolicyConfig {
        &self.config
    }

    pub fn check_str(&self, url: &str) -> Result<Url, PreviewError> {
        let url = Url::parse(url)?;
        self.check(&url)?;
        Ok(url)
    }

    pub fn check(&self, url: &Url) -> Result<(), PreviewError> {
        if !self.config.allowed_schemes.contains(url.scheme()) {
            return Err(PreviewError::DisallowedScheme(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .ok_or(PreviewError::UrlParseError(url::ParseError::EmptyHost))?;

        if self.is_domain_blocked(host) {
            return Err(PreviewError::DomainBlocked(host.to_string()));
        }

        if self.config.block_private_addresses {
            if host.eq_ignore_ascii_case("localhost") {
                return Err(PreviewError::BlockedAddress(host.to_string()));
            }

            let ip_str = host.trim_start_matches('[').trim_end_matches(']');
            if let Ok(ip) = ip_str.parse::<IpAddr>() {
                if is_private_ip(&ip) {
                    return Err(PreviewError::BlockedAddress(ip.to_string()));
                }
            }
        }

        Ok(())
    }

    fn is_domain_blocked(&self, host: &str) -> bool {
        self.config
            .blocked_domains
            .iter()
            .any(|blocked| host == blocked || host.ends_with(&format!(".{blocked}")))
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_unspecified()
                || is_ipv4_reserved(ipv4)
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || is_ipv6_link_local(ipv6)
                || is_ipv6_unique_local(ipv6)
        }
    }
}

fn is_ipv4_reserved(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();

    // 0.0.0.0/8
    octets[0] == 0
        // 100.64.0.0/10 (Carrier-grade NAT)
        || (octets[0] == 100 && (octets[1] & 0b11000000) == 0b01000000)
        // 224.0.0.0/4 (Multicast)
        || (octets[0] & 0b11110000) == 0b11100000
        // 240.0.0.0/4 (Reserved)
        || (octets[0] & 0b11110000) == 0b11110000
}

fn is_ipv6_link_local(ip: &Ipv6Addr) -> bool {
    // fe80::/10
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

fn is_ipv6_unique_local(ip: &Ipv6Addr) -> bool {
    // fc00::/7
    (ip.segments()[0] & 0xfe00) == 0xfc00
}
