// ============================================
// File: crates/meshtun-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the identifiers shared between the route calculator and the
//! tunnel multiplexer.
//!
//! ## Main Functionality
//! - `AddressFamily`: IPv4 / IPv6 tag with the width of its address space
//! - `DeviceId`: Monotonic identifier for each tunnel handle the
//!   multiplexer adopts
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

// ============================================
// AddressFamily
// ============================================

/// Address family of a prefix or range.
///
/// # Example
/// ```
/// use meshtun_common::types::AddressFamily;
/// use std::net::IpAddr;
///
/// let ip: IpAddr = "2001:db8::1".parse().unwrap();
/// assert_eq!(AddressFamily::of(&ip), AddressFamily::V6);
/// assert_eq!(AddressFamily::V4.bits(), 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// 4-byte addresses.
    V4,
    /// 16-byte addresses.
    V6,
}

impl AddressFamily {
    /// Returns the family of an address.
    #[must_use]
    pub const fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    /// Width of the address space in bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }

    /// Width of an address in bytes.
    #[must_use]
    pub const fn byte_len(self) -> usize {
        match self {
            Self::V4 => 4,
            Self::V6 => 16,
        }
    }

    /// Largest representable address as an unsigned integer.
    #[must_use]
    pub const fn max_value(self) -> u128 {
        match self {
            Self::V4 => u32::MAX as u128,
            Self::V6 => u128::MAX,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => f.write_str("ipv4"),
            Self::V6 => f.write_str("ipv6"),
        }
    }
}

// ============================================
// DeviceId
// ============================================

/// Identifier assigned to each tunnel handle added to the multiplexer.
///
/// Identifiers are handed out in increasing order, so comparing two ids
/// tells which handle the platform issued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl DeviceId {
    /// Creates a `DeviceId` from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the id following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tun#{}", self.0)
    }
}

// ============================================
// Tests
// ============================================
