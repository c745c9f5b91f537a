// ============================================
// File: crates/meshtun-client/src/config.rs
// ============================================
//! # Client Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the meshtun client, loaded
//! from TOML.
//!
//! ## Main Functionality
//! - `ClientConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Conversion to the multiplexer configuration
//!
//! ## Configuration Sections
//! - `tun`: Default MTU, handover mode, request queue depth
//! - `dns`: Empty-DNS avoidance and fallback nameservers
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [tun]
//! default_mtu = 1280
//! seamless_handover = true
//! queue_depth = 64
//!
//! [dns]
//! avoid_empty_dns = false
//! fallback_nameservers = ["8.8.8.8", "8.8.4.4"]
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `seamless_handover = false` closes the old tunnel before the new
//!   one is requested; ChromeOS always behaves this way
//! - `RUST_LOG` overrides `logging.level`
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use meshtun_transport::traits::{DEFAULT_MTU, DEFAULT_QUEUE_DEPTH};
use meshtun_transport::MultiTunConfig;

use crate::error::{ClientError, Result};

// ============================================
// ClientConfig
// ============================================

/// Main client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Tunnel and handover configuration.
    #[serde(default)]
    pub tun: TunnelConfig,

    /// DNS configuration.
    #[serde(default)]
    pub dns: DnsSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.tun.validate()?;
        self.dns.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Builds the multiplexer configuration.
    #[must_use]
    pub fn multi_tun_config(&self) -> MultiTunConfig {
        MultiTunConfig::default()
            .with_default_mtu(self.tun.default_mtu)
            .with_queue_depth(self.tun.queue_depth)
    }
}

// ============================================
// TunnelConfig
// ============================================

/// Tunnel configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// MTU requested from the platform and reported with no device attached.
    #[serde(default = "default_mtu")]
    pub default_mtu: u16,

    /// Keep the old tunnel alive until the new one is established.
    #[serde(default = "default_seamless_handover")]
    pub seamless_handover: bool,

    /// Depth of the multiplexer request queues.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_mtu() -> u16 {
    DEFAULT_MTU
}

fn default_seamless_handover() -> bool {
    true
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl TunnelConfig {
    fn validate(&self) -> Result<()> {
        if self.default_mtu < 576 {
            return Err(ClientError::config_invalid(
                "tun.default_mtu",
                "must be at least 576",
            ));
        }

        if self.default_mtu > 9000 {
            return Err(ClientError::config_invalid(
                "tun.default_mtu",
                "cannot exceed 9000",
            ));
        }

        if self.queue_depth == 0 {
            return Err(ClientError::config_invalid(
                "tun.queue_depth",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            default_mtu: default_mtu(),
            seamless_handover: default_seamless_handover(),
            queue_depth: default_queue_depth(),
        }
    }
}

// ============================================
// DnsSettings
// ============================================

/// DNS configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSettings {
    /// Never hand the platform an empty nameserver list.
    #[serde(default)]
    pub avoid_empty_dns: bool,

    /// Nameservers used when none are known.
    #[serde(default = "default_fallback_nameservers")]
    pub fallback_nameservers: Vec<IpAddr>,
}

/// Google public DNS.
fn default_fallback_nameservers() -> Vec<IpAddr> {
    vec![
        IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
        IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888)),
        IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8844)),
    ]
}

impl DnsSettings {
    fn validate(&self) -> Result<()> {
        if self.avoid_empty_dns && self.fallback_nameservers.is_empty() {
            return Err(ClientError::config_invalid(
                "dns.fallback_nameservers",
                "cannot be empty when avoid_empty_dns is set",
            ));
        }

        if let Some(addr) = self.fallback_nameservers.iter().find(|a| a.is_unspecified()) {
            return Err(ClientError::config_invalid(
                "dns.fallback_nameservers",
                format!("unspecified address {addr} is not a nameserver"),
            ));
        }

        Ok(())
    }
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            avoid_empty_dns: false,
            fallback_nameservers: default_fallback_nameservers(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

        if !LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(ClientError::config_invalid(
                "logging.level",
                format!("unknown level '{}'", self.level),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
