// ============================================
// File: crates/meshtun-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the tunnel device interface shared by real fd-backed handles,
//! the in-memory mock and the multiplexer, so the networking engine can
//! hold any of them as one `Arc<dyn TunDevice>`.
//!
//! ## Main Functionality
//! - `TunDevice`: read/write/close plus an event side channel
//! - `TunEvent`: device-level events (up, down, MTU change)
//! - `TunConfig`: per-device settings
//! - `MultiTunConfig`: multiplexer settings
//!
//! ## Design Philosophy
//! - Traits enable mock implementations for testing
//! - Async-first design with `async_trait`
//! - Object safe: every method takes `&self`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `close()` MUST abort a read that is already waiting; the multiplexer
//!   relies on this to drain a superseded handle
//! - `next_event()` MUST be cancel safe; it runs inside `select!`
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;

use async_trait::async_trait;

use crate::error::{Result, TransportError};

// ============================================
// Constants
// ============================================

/// MTU reported when no device is present.
pub const DEFAULT_MTU: u16 = 1280;

/// Depth of the multiplexer's read and write request queues.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Smallest accepted MTU.
pub const MIN_MTU: u16 = 576;

/// Largest accepted MTU.
pub const MAX_MTU: u16 = 9000;

// ============================================
// TunEvent
// ============================================

/// Device-level event emitted on a tunnel's side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunEvent {
    /// The device is up.
    Up,
    /// The device went down.
    Down,
    /// The device MTU changed.
    MtuUpdate(u16),
}

impl fmt::Display for TunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
            Self::MtuUpdate(mtu) => write!(f, "mtu={mtu}"),
        }
    }
}

// ============================================
// TunDevice Trait
// ============================================

/// Abstract interface for a tunnel device.
///
/// # Data Format
/// Data read from and written to the device is raw IP packets
/// (no Ethernet headers).
///
/// # Example
/// ```ignore
/// async fn forward_packets(tun: &dyn TunDevice) -> Result<()> {
///     let mut buf = [0u8; 1500];
///     loop {
///         let len = tun.read(&mut buf).await?;
///         if len == 0 {
///             break;
///         }
///         // Process IP packet in buf[..len]
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait TunDevice: Send + Sync {
    /// Reads one IP packet.
    ///
    /// # Returns
    /// Number of bytes read. `0` means end of stream.
    ///
    /// # Errors
    /// Returns error if read fails or the device was closed
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Writes one IP packet.
    ///
    /// # Errors
    /// Returns error if write fails
    async fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Returns the MTU.
    ///
    /// # Errors
    /// Returns error if the device cannot report it
    async fn mtu(&self) -> Result<u16>;

    /// Returns the device name.
    ///
    /// # Errors
    /// Returns error if the device cannot report it
    async fn name(&self) -> Result<String>;

    /// Waits for the next device event.
    ///
    /// Returns `None` once the event stream has ended.
    async fn next_event(&self) -> Option<TunEvent>;

    /// Closes the device and aborts any pending read.
    ///
    /// # Errors
    /// Returns error if the underlying handle fails to close
    async fn close(&self) -> Result<()>;
}

// ============================================
// TunConfig
// ============================================

/// Configuration for a single tunnel device.
///
/// # Example
/// ```
/// use meshtun_transport::traits::TunConfig;
///
/// let config = TunConfig::new("tun0").with_mtu(1420);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunConfig {
    /// Device name (e.g., "tun0").
    pub name: String,
    /// MTU size.
    pub mtu: u16,
}

impl TunConfig {
    /// Creates a new TUN configuration with defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mtu: DEFAULT_MTU,
        }
    }

    /// Sets the MTU.
    #[must_use]
    pub const fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(TransportError::invalid_config(
                "name",
                "device name cannot be empty",
            ));
        }

        if self.name.len() > 15 {
            return Err(TransportError::invalid_config(
                "name",
                "device name cannot exceed 15 characters",
            ));
        }

        validate_mtu(self.mtu)
    }
}

impl Default for TunConfig {
    fn default() -> Self {
        Self::new("tun0")
    }
}

// ============================================
// MultiTunConfig
// ============================================

/// Configuration for the tunnel multiplexer.
///
/// # Example
/// ```
/// use meshtun_transport::traits::MultiTunConfig;
///
/// let config = MultiTunConfig::default()
///     .with_default_mtu(1400)
///     .with_queue_depth(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiTunConfig {
    /// MTU reported while no device is attached.
    pub default_mtu: u16,
    /// Depth of the read and write request queues.
    pub queue_depth: usize,
}

impl MultiTunConfig {
    /// Sets the default MTU.
    #[must_use]
    pub const fn with_default_mtu(mut self, mtu: u16) -> Self {
        self.default_mtu = mtu;
        self
    }

    /// Sets the request queue depth.
    #[must_use]
    pub const fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if the MTU is out of range or the queue depth is zero.
    pub fn validate(&self) -> Result<()> {
        validate_mtu(self.default_mtu)?;

        if self.queue_depth == 0 {
            return Err(TransportError::invalid_config(
                "queue_depth",
                "queue depth must be greater than zero",
            ));
        }

        Ok(())
    }
}

impl Default for MultiTunConfig {
    fn default() -> Self {
        Self {
            default_mtu: DEFAULT_MTU,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

fn validate_mtu(mtu: u16) -> Result<()> {
    if mtu < MIN_MTU {
        return Err(TransportError::invalid_config(
            "mtu",
            format!("MTU must be at least {MIN_MTU} bytes"),
        ));
    }

    if mtu > MAX_MTU {
        return Err(TransportError::invalid_config(
            "mtu",
            format!("MTU cannot exceed {MAX_MTU} bytes"),
        ));
    }

    Ok(())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tun_config_defaults() {
        let config = TunConfig::new("tun0");

        assert_eq!(config.name, "tun0");
        assert_eq!(config.mtu, 1280);
    }

    #[test]
    fn test_tun_config_validation() {
        assert!(TunConfig::new("tun0").validate().is_ok());
        assert!(TunConfig::new("").validate().is_err());
        assert!(TunConfig::new("a".repeat(20)).validate().is_err());
        assert!(TunConfig::new("tun0").with_mtu(100).validate().is_err());
        assert!(TunConfig::new("tun0").with_mtu(10000).validate().is_err());
    }

    #[test]
    fn test_multi_tun_config() {
        let config = MultiTunConfig::default();
        assert_eq!(config.default_mtu, DEFAULT_MTU);
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert!(config.validate().is_ok());

        assert!(MultiTunConfig::default()
            .with_queue_depth(0)
            .validate()
            .is_err());
        assert!(MultiTunConfig::default()
            .with_default_mtu(200)
            .validate()
            .is_err());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(TunEvent::Up.to_string(), "up");
        assert_eq!(TunEvent::MtuUpdate(1400).to_string(), "mtu=1400");
    }
}
