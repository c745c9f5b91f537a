// ============================================
// File: crates/meshtun-routes/src/prefix.rs
// ============================================
//! # Prefix Parsing
//!
//! ## Creation Reason
//! Routes arrive as text from the CLI, config files and the host
//! application. Malformed entries are rejected here so the calculator
//! only ever sees valid prefixes.
//!
//! ## Main Functionality
//! - [`parse_prefix`]: `addr/len` or bare address (host prefix)
//! - [`parse_prefixes`]: comma or whitespace separated list
//! - [`prefix_from_parts`]: validated `(addr, len)` pair
//!
//! ## Last Modified
//! v0.1.0 - Initial parsing helpers

use std::net::IpAddr;

use ipnet::IpNet;

use meshtun_common::AddressFamily;

use crate::error::{Result, RouteError};

/// Builds a prefix from an address and a length.
///
/// # Errors
/// Returns `PrefixLength` if `len` exceeds the family width.
pub fn prefix_from_parts(addr: IpAddr, len: u8) -> Result<IpNet> {
    let family = AddressFamily::of(&addr);
    IpNet::new(addr, len).map_err(|_| RouteError::PrefixLength {
        len,
        max: family.bits(),
        family,
    })
}

/// Parses a single prefix.
///
/// A bare address is accepted and treated as a host prefix (`/32` or
/// `/128`).
///
/// # Errors
/// Returns `InvalidPrefix` for unparsable input and `PrefixLength` for an
/// oversize length.
///
/// # Example
/// ```
/// use meshtun_routes::parse_prefix;
///
/// assert_eq!(parse_prefix("10.0.0.0/8").unwrap().to_string(), "10.0.0.0/8");
/// assert_eq!(parse_prefix("fd00::1").unwrap().to_string(), "fd00::1/128");
/// ```
pub fn parse_prefix(input: &str) -> Result<IpNet> {
    let input = input.trim();
    if input.is_empty() {
        return Err(RouteError::invalid_prefix(input, "empty"));
    }

    let Some((addr, len)) = input.split_once('/') else {
        let addr: IpAddr = input
            .parse()
            .map_err(|e| RouteError::invalid_prefix(input, format!("{e}")))?;
        return Ok(IpNet::from(addr));
    };

    let addr: IpAddr = addr
        .parse()
        .map_err(|e| RouteError::invalid_prefix(input, format!("{e}")))?;
    let len: u8 = len
        .parse()
        .map_err(|_| RouteError::invalid_prefix(input, "prefix length is not a number"))?;

    prefix_from_parts(addr, len)
}

/// Parses a list of prefixes separated by commas and/or whitespace.
///
/// # Errors
/// Fails on the first invalid entry.
pub fn parse_prefixes(input: &str) -> Result<Vec<IpNet>> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(parse_prefix)
        .collect()
}

// ============================================
// Tests
// ============================================
