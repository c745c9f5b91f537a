// ============================================
// File: crates/meshtun-client/src/interfaces.rs
// ============================================
//! # Interface List Parsing
//!
//! ## Creation Reason
//! The platform reports its network interfaces as a string. Older
//! builds use a line-based text format, newer ones a JSON array. Both
//! decode into the same `Interface` list.
//!
//! ## Main Functionality
//! - `parse_interfaces_text`: legacy line format
//! - `parse_interfaces_json`: JSON array format
//! - `parse_interfaces`: picks the format from the payload
//! - `ParseStats`: what was parsed and what was skipped
//!
//! ## Text Format
//! ```text
//! wlan0 30 1500 true true false false true | fe80::1%wlan0/64 10.1.10.131/24
//! ```
//! `name index mtu up broadcast loopback pointToPoint multicast | addrs`
//!
//! ## JSON Format
//! ```text
//! [{"name":"wlan0","index":30,"mtu":1500,"up":true,"broadcast":true,
//!   "loopback":false,"pointToPoint":false,"multicast":true,
//!   "addrs":[{"ip":"10.1.10.131","prefixLen":24}]}]
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Addresses keep their host bits: `10.1.10.131/24`, not `10.1.10.0/24`
//! - The text format cannot carry zoned addresses; JSON keeps the zone
//!   and drops the prefix
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::Deserialize;
use tracing::{debug, warn};

use meshtun_common::AddressFamily;

use crate::error::{ClientError, Result};

// ============================================
// Types
// ============================================

/// Interface flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct InterfaceFlags {
    /// Interface is up.
    pub up: bool,
    /// Supports broadcast.
    pub broadcast: bool,
    /// Loopback interface.
    pub loopback: bool,
    /// Point-to-point link.
    pub point_to_point: bool,
    /// Supports multicast.
    pub multicast: bool,
}

/// An address assigned to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceAddr {
    /// Host address with its prefix length.
    Prefixed(IpNet),
    /// Address without a usable prefix, possibly zoned.
    Bare {
        /// The address
        ip: IpAddr,
        /// IPv6 zone, if any
        zone: Option<String>,
    },
}

impl InterfaceAddr {
    /// The address itself.
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        match self {
            Self::Prefixed(net) => net.addr(),
            Self::Bare { ip, .. } => *ip,
        }
    }
}

impl fmt::Display for InterfaceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefixed(net) => write!(f, "{net}"),
            Self::Bare { ip, zone: Some(zone) } => write!(f, "{ip}%{zone}"),
            Self::Bare { ip, zone: None } => write!(f, "{ip}"),
        }
    }
}

/// A network interface as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name.
    pub name: String,
    /// Interface index.
    pub index: u32,
    /// Interface MTU.
    pub mtu: u32,
    /// Interface flags.
    pub flags: InterfaceFlags,
    /// Assigned addresses.
    pub addrs: Vec<InterfaceAddr>,
}

/// Counters collected while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Interfaces seen.
    pub ifaces_total: usize,
    /// Interfaces kept.
    pub ifaces_parsed: usize,
    /// Interfaces dropped.
    pub ifaces_skipped: usize,
    /// Addresses seen on kept interfaces.
    pub addrs_total: usize,
    /// Addresses kept.
    pub addrs_parsed: usize,
    /// Addresses dropped.
    pub addrs_skipped: usize,
}

impl fmt::Display for ParseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "interfaces {}/{} ({} skipped), addresses {}/{} ({} skipped)",
            self.ifaces_parsed,
            self.ifaces_total,
            self.ifaces_skipped,
            self.addrs_parsed,
            self.addrs_total,
            self.addrs_skipped
        )
    }
}

// ============================================
// Format Detection
// ============================================

/// Parses an interface payload in either format.
///
/// # Errors
/// Returns `InterfaceParse` if a JSON payload cannot be decoded.
pub fn parse_interfaces(text: &str) -> Result<(Vec<Interface>, ParseStats)> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        parse_interfaces_json(trimmed)
    } else {
        Ok(parse_interfaces_text(trimmed))
    }
}

// ============================================
// Text Format
// ============================================

/// Parses the legacy line format. Malformed lines are logged and skipped.
#[must_use]
pub fn parse_interfaces_text(text: &str) -> (Vec<Interface>, ParseStats) {
    let mut stats = ParseStats::default();
    let mut out = Vec::new();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        stats.ifaces_total += 1;

        let Some((header, addrs)) = split_line(line) else {
            warn!(line, "Unable to split interface line");
            stats.ifaces_skipped += 1;
            continue;
        };

        let Some(mut iface) = parse_header(header) else {
            warn!(line, "Unable to parse interface line");
            stats.ifaces_skipped += 1;
            continue;
        };

        for addr in addrs.split_whitespace() {
            stats.addrs_total += 1;
            match addr.parse::<IpNet>() {
                Ok(net) => {
                    iface.addrs.push(InterfaceAddr::Prefixed(net));
                    stats.addrs_parsed += 1;
                }
                Err(_) => {
                    debug!(iface = %iface.name, addr, "Skipping address");
                    stats.addrs_skipped += 1;
                }
            }
        }

        out.push(iface);
        stats.ifaces_parsed += 1;
    }

    (out, stats)
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split('|');
    let header = parts.next()?;
    let addrs = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((header, addrs))
}

fn parse_header(header: &str) -> Option<Interface> {
    let fields: Vec<&str> = header.split_whitespace().collect();
    let &[name, index, mtu, up, broadcast, loopback, point_to_point, multicast] = fields.as_slice() else {
        return None;
    };

    Some(Interface {
        name: name.to_string(),
        index: index.parse().ok()?,
        mtu: mtu.parse().ok()?,
        flags: InterfaceFlags {
            up: up.parse().ok()?,
            broadcast: broadcast.parse().ok()?,
            loopback: loopback.parse().ok()?,
            point_to_point: point_to_point.parse().ok()?,
            multicast: multicast.parse().ok()?,
        },
        addrs: Vec::new(),
    })
}

// ============================================
// JSON Format
// ============================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
struct RawInterface {
    name: String,
    index: u32,
    mtu: u32,
    up: bool,
    broadcast: bool,
    loopback: bool,
    point_to_point: bool,
    multicast: bool,
    addrs: Vec<RawAddr>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawAddr {
    ip: String,
    prefix_len: i64,
}

impl RawAddr {
    fn to_addr(&self) -> Option<InterfaceAddr> {
        let (ip, zone) = match self.ip.split_once('%') {
            Some((ip, zone)) => (ip, Some(zone)),
            None => (self.ip.as_str(), None),
        };
        let ip: IpAddr = ip.parse().ok()?;

        if let Some(zone) = zone {
            if zone.is_empty() || ip.is_ipv4() {
                return None;
            }
            return Some(InterfaceAddr::Bare {
                ip,
                zone: Some(zone.to_string()),
            });
        }

        let bits = i64::from(AddressFamily::of(&ip).bits());
        match u8::try_from(self.prefix_len) {
            Ok(len) if self.prefix_len <= bits => IpNet::new(ip, len).ok().map(InterfaceAddr::Prefixed),
            _ => Some(InterfaceAddr::Bare { ip, zone: None }),
        }
    }
}

/// Parses the JSON array format.
///
/// Nameless interfaces and unparsable addresses are skipped and counted.
///
/// # Errors
/// - `NotJson`: If the payload does not start with `[` or `{`
/// - `InterfaceParse`: If the payload is not a valid interface array
pub fn parse_interfaces_json(text: &str) -> Result<(Vec<Interface>, ParseStats)> {
    let mut stats = ParseStats::default();
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Ok((Vec::new(), stats));
    }
    if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
        return Err(ClientError::NotJson);
    }

    let raw: Vec<RawInterface> =
        serde_json::from_str(trimmed).map_err(|e| ClientError::interface_parse(e.to_string()))?;

    let mut out = Vec::with_capacity(raw.len());
    for it in raw {
        stats.ifaces_total += 1;

        if it.name.is_empty() {
            stats.ifaces_skipped += 1;
            continue;
        }

        stats.addrs_total += it.addrs.len();
        let mut addrs = Vec::with_capacity(it.addrs.len());
        for raw_addr in &it.addrs {
            match raw_addr.to_addr() {
                Some(addr) => {
                    addrs.push(addr);
                    stats.addrs_parsed += 1;
                }
                None => stats.addrs_skipped += 1,
            }
        }

        out.push(Interface {
            name: it.name,
            index: it.index,
            mtu: it.mtu,
            flags: InterfaceFlags {
                up: it.up,
                broadcast: it.broadcast,
                loopback: it.loopback,
                point_to_point: it.point_to_point,
                multicast: it.multicast,
            },
            addrs,
        });
        stats.ifaces_parsed += 1;
    }

    Ok((out, stats))
}

// ============================================
// Tests
// ============================================
