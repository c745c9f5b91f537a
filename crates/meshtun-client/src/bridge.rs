// ============================================
// File: crates/meshtun-client/src/bridge.rs
// ============================================
//! # Platform Bridge
//!
//! ## Creation Reason
//! The VPN service, its builder and the application context live on the
//! host platform. These traits are the seam the host implements so the
//! tunnel manager can drive it.
//!
//! ## Main Functionality
//! - `VpnServiceBuilder`: one-shot tunnel request
//! - `VpnService`: running VPN service instance
//! - `AppContext`: platform queries
//! - `NetworkMonitor`: default-route interface changes
//!
//! ## ⚠️ Important Note for Next Developer
//! - Builder calls are synchronous; they run on the caller's task
//! - `establish` returning `Ok(None)` means the VPN permission is
//!   missing or was revoked, not an error in the builder
//!
//! ## Last Modified
//! v0.1.0 - Initial bridge contracts

use std::sync::Arc;

use thiserror::Error;

use meshtun_transport::TunDevice;

/// Error reported by a platform call, carrying the platform's message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PlatformError {
    /// Message as reported by the platform
    pub message: String,
}

impl PlatformError {
    /// Creates a new platform error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for platform calls.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

// ============================================
// VpnServiceBuilder
// ============================================

/// Platform VPN builder. Consumed by one `establish` call.
pub trait VpnServiceBuilder: Send {
    /// Sets the tunnel MTU.
    fn set_mtu(&mut self, mtu: u16) -> PlatformResult<()>;

    /// Adds a DNS server.
    fn add_dns_server(&mut self, server: &str) -> PlatformResult<()>;

    /// Adds a DNS search domain (no trailing dot).
    fn add_search_domain(&mut self, domain: &str) -> PlatformResult<()>;

    /// Routes `address/prefix_len` into the tunnel. `address` has no host bits set.
    fn add_route(&mut self, address: &str, prefix_len: u8) -> PlatformResult<()>;

    /// Assigns `address/prefix_len` to the tunnel interface.
    fn add_address(&mut self, address: &str, prefix_len: u8) -> PlatformResult<()>;

    /// Creates the tunnel.
    ///
    /// Returns `Ok(None)` when the VPN is not prepared or was revoked.
    fn establish(&mut self) -> PlatformResult<Option<Arc<dyn TunDevice>>>;
}

// ============================================
// VpnService
// ============================================

/// A running platform VPN service instance.
pub trait VpnService: Send + Sync {
    /// Unique identifier of this service instance.
    fn id(&self) -> String;

    /// Excludes a socket from the VPN. Returns whether it succeeded.
    fn protect(&self, fd: i32) -> bool;

    /// Starts a new tunnel request.
    fn new_builder(&self) -> Box<dyn VpnServiceBuilder>;

    /// Reports whether the VPN is active.
    fn update_vpn_status(&self, active: bool);
}

// ============================================
// AppContext
// ============================================

/// Platform queries made by the client.
pub trait AppContext: Send + Sync {
    /// Whether the device runs ChromeOS.
    fn is_chrome_os(&self) -> PlatformResult<bool>;

    /// Whether this is the store build of the app.
    fn is_play_version(&self) -> bool;

    /// All network interfaces, in text or JSON form
    /// (see [`crate::interfaces`]).
    fn interfaces_as_string(&self) -> PlatformResult<String>;

    /// Platform DNS configuration (see [`crate::dns`]).
    fn platform_dns_config(&self) -> String;
}

// ============================================
// NetworkMonitor
// ============================================

/// Sink for default-route interface changes.
pub trait NetworkMonitor: Send + Sync {
    /// Called with the new default-route interface, or `""` when the
    /// network was lost.
    fn network_changed(&self, interface_name: &str);
}
