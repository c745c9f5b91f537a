// ============================================
// File: crates/meshtun-client/src/dns.rs
// ============================================
//! # DNS Base Configuration
//!
//! ## Main Functionality
//! - `DnsConfig`: nameservers and search domains handed to the VPN
//! - `parse_platform_dns_config`: decodes the platform's two-line format
//! - `base_dns_config`: platform config plus fallback nameservers
//!
//! ## Platform Format
//! ```text
//! 192.168.1.1 2001:db8::1
//! corp.example.com home.arpa
//! ```
//! First line nameservers, second line search domains, space separated.
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::net::IpAddr;

use tracing::{debug, info};

use crate::bridge::AppContext;

/// Maximum length of a DNS name without the trailing dot.
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

/// DNS settings applied to a tunnel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsConfig {
    /// Nameserver addresses.
    pub nameservers: Vec<IpAddr>,
    /// Search domains, fully qualified (trailing dot).
    pub search_domains: Vec<String>,
}

impl DnsConfig {
    /// Search domains without the trailing dot.
    pub fn search_domains_without_dot(&self) -> impl Iterator<Item = &str> {
        self.search_domains
            .iter()
            .map(|d| d.strip_suffix('.').unwrap_or(d))
    }
}

/// Parses the platform DNS configuration.
///
/// Invalid nameserver entries are skipped silently; invalid search
/// domains are logged and skipped.
#[must_use]
pub fn parse_platform_dns_config(text: &str) -> DnsConfig {
    let mut lines = text.split('\n');
    let mut config = DnsConfig::default();

    if let Some(first) = lines.next() {
        config.nameservers = first
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
    }

    if let Some(second) = lines.next() {
        for domain in second.split_whitespace() {
            match to_fqdn(domain) {
                Some(fqdn) => config.search_domains.push(fqdn),
                None => debug!(domain, "Skipping invalid search domain"),
            }
        }
    }

    config
}

/// Reads the platform DNS configuration, falling back to `fallback`
/// nameservers on store builds when the platform reports none.
pub fn base_dns_config(ctx: &dyn AppContext, fallback: &[IpAddr]) -> DnsConfig {
    let mut config = parse_platform_dns_config(&ctx.platform_dns_config());

    if config.nameservers.is_empty() && ctx.is_play_version() {
        info!("No platform nameservers found; using fallback nameservers");
        config.nameservers.extend_from_slice(fallback);
    }

    config
}

/// Validates `name` and returns it with a trailing dot.
fn to_fqdn(name: &str) -> Option<String> {
    let bare = name.strip_suffix('.').unwrap_or(name);
    if bare.is_empty() || bare.len() > MAX_NAME_LEN {
        return None;
    }

    if !bare.split('.').all(is_valid_label) {
        return None;
    }

    Some(format!("{bare}."))
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// ============================================
// Tests
// ============================================
