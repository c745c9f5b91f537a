// ============================================
// File: crates/meshtun-routes/src/range.rs
// ============================================
//! # Address Range Algebra
//!
//! ## Creation Reason
//! The platform route table only accepts whole prefixes and cannot
//! express "everything except this subnet". Routes are therefore computed
//! as plain integer ranges and converted back into prefixes at the end.
//!
//! ## Main Functionality
//! - `AddressRange`: inclusive `[start, end]` over one address family
//! - [`merge_ranges`]: sort and fold overlapping/adjacent ranges
//! - [`subtract_ranges`]: remove one merged range set from another
//! - [`AddressRange::to_prefixes`]: minimal aligned prefix decomposition
//!
//! ## Numeric Model
//! Every address is held as a `u128`. IPv4 values live in the low 32 bits
//! and never exceed `u32::MAX`. Nothing here computes `end + 1` when `end`
//! is the largest address of its family:
//! ```text
//!   merge:      next.start <= last.end.saturating_add(1)
//!   subtract:   d.end + 1 only when d.end < a.end <= max
//!   decompose:  stop when block_end == range.end
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial range algebra

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use meshtun_common::AddressFamily;

use crate::error::{Result, RouteError};

// ============================================
// Address <-> Integer
// ============================================

/// Converts an address to its unsigned integer value.
#[must_use]
pub fn addr_to_int(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Converts an integer back to an address of the given family.
///
/// IPv4 values above `u32::MAX` are a caller bug; they are truncated to
/// the low 32 bits.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn int_to_addr(family: AddressFamily, value: u128) -> IpAddr {
    match family {
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
        AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

/// Mask covering the low `host_bits` bits.
const fn host_mask(host_bits: u8) -> u128 {
    if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    }
}

// ============================================
// AddressRange
// ============================================

/// Inclusive range of addresses within one address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    family: AddressFamily,
    start: u128,
    end: u128,
}

impl AddressRange {
    /// Creates a range from integer bounds.
    ///
    /// # Errors
    /// Returns `InvalidRange` if `start > end` or `end` exceeds the
    /// family's address space.
    pub fn new(family: AddressFamily, start: u128, end: u128) -> Result<Self> {
        if start > end {
            return Err(RouteError::invalid_range(family, "start is after end"));
        }
        if end > family.max_value() {
            return Err(RouteError::invalid_range(
                family,
                "end exceeds the address space",
            ));
        }
        Ok(Self { family, start, end })
    }

    /// Creates a range from two addresses of the same family.
    ///
    /// # Errors
    /// Returns `InvalidRange` on mixed families or reversed bounds.
    pub fn from_addrs(start: IpAddr, end: IpAddr) -> Result<Self> {
        let family = AddressFamily::of(&start);
        if AddressFamily::of(&end) != family {
            return Err(RouteError::invalid_range(family, "mixed address families"));
        }
        Self::new(family, addr_to_int(start), addr_to_int(end))
    }

    /// Maps a prefix to the range from its network address to its last
    /// address. Host bits set in the prefix address are ignored.
    #[must_use]
    pub fn from_prefix(prefix: &IpNet) -> Self {
        let family = AddressFamily::of(&prefix.addr());
        let host_bits = family.bits() - prefix.prefix_len();
        let mask = host_mask(host_bits);
        let start = addr_to_int(prefix.addr()) & !mask;
        Self {
            family,
            start,
            end: start | mask,
        }
    }

    /// Address family of the range.
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    /// First address as an integer.
    #[must_use]
    pub const fn start(&self) -> u128 {
        self.start
    }

    /// Last address as an integer.
    #[must_use]
    pub const fn end(&self) -> u128 {
        self.end
    }

    /// First address.
    #[must_use]
    pub fn start_addr(&self) -> IpAddr {
        int_to_addr(self.family, self.start)
    }

    /// Last address.
    #[must_use]
    pub fn end_addr(&self) -> IpAddr {
        int_to_addr(self.family, self.end)
    }

    /// Returns `true` if `addr` lies inside the range.
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        AddressFamily::of(&addr) == self.family && {
            let value = addr_to_int(addr);
            self.start <= value && value <= self.end
        }
    }

    /// Returns `true` if the two ranges share at least one address.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.family == other.family && self.start <= other.end && other.start <= self.end
    }

    /// Removes `other` from this range.
    ///
    /// Yields up to two remainders: the part before `other` and the part
    /// after it. A range that does not overlap `other` is returned as is.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Vec<Self> {
        if !self.overlaps(other) {
            return vec![*self];
        }

        let mut rest = Vec::with_capacity(2);
        if self.start < other.start {
            rest.push(Self {
                family: self.family,
                start: self.start,
                end: other.start - 1,
            });
        }
        if self.end > other.end {
            rest.push(Self {
                family: self.family,
                start: other.end + 1,
                end: self.end,
            });
        }
        rest
    }

    /// Decomposes the range into the minimal list of aligned prefixes.
    ///
    /// Each step emits the largest block that starts at the current
    /// address, is aligned on its own size, and does not run past `end`.
    #[must_use]
    pub fn to_prefixes(&self) -> Vec<IpNet> {
        let bits = self.family.bits();
        let mut prefixes = Vec::new();
        let mut cur = self.start;

        loop {
            #[allow(clippy::cast_possible_truncation)]
            let align = if cur == 0 {
                bits
            } else {
                (cur.trailing_zeros() as u8).min(bits)
            };

            let span = self.end - cur;
            #[allow(clippy::cast_possible_truncation)]
            let fit = if span == u128::MAX {
                128
            } else {
                (127 - (span + 1).leading_zeros()) as u8
            };

            let size = align.min(fit);
            prefixes.push(prefix_at(self.family, cur, bits - size));

            let block_end = cur | host_mask(size);
            if block_end >= self.end {
                break;
            }
            cur = block_end + 1;
        }

        prefixes
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_addr(), self.end_addr())
    }
}

impl From<IpNet> for AddressRange {
    fn from(prefix: IpNet) -> Self {
        Self::from_prefix(&prefix)
    }
}

fn prefix_at(family: AddressFamily, value: u128, len: u8) -> IpNet {
    match IpNet::new(int_to_addr(family, value), len) {
        Ok(net) => net,
        Err(_) => unreachable!("prefix length {len} exceeds {family} width"),
    }
}

// ============================================
// Range Set Operations
// ============================================

/// Sorts ranges and folds every overlapping or adjacent pair into one.
///
/// All ranges must belong to the same address family. Ties on the start
/// address are ordered by size, smallest first.
#[must_use]
pub fn merge_ranges(mut ranges: Vec<AddressRange>) -> Vec<AddressRange> {
    if ranges.is_empty() {
        return ranges;
    }
    debug_assert!(ranges.windows(2).all(|w| w[0].family == w[1].family));

    ranges.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<AddressRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Removes every `disallowed` range from every `allowed` range and merges
/// the remainders.
///
/// Both inputs are expected to be merged already.
#[must_use]
pub fn subtract_ranges(
    allowed: &[AddressRange],
    disallowed: &[AddressRange],
) -> Vec<AddressRange> {
    if allowed.is_empty() {
        return Vec::new();
    }
    if disallowed.is_empty() {
        return allowed.to_vec();
    }

    let mut result = Vec::new();
    for range in allowed {
        let mut remaining = vec![*range];
        for cut in disallowed {
            remaining = remaining.iter().flat_map(|r| r.subtract(cut)).collect();
            if remaining.is_empty() {
                break;
            }
        }
        result.extend(remaining);
    }
    merge_ranges(result)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn v4(start: &str, end: &str) -> AddressRange {
        AddressRange::from_addrs(start.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_from_prefix_v4() {
        let r = AddressRange::from_prefix(&net("10.1.0.0/16"));
        assert_eq!(r.start_addr().to_string(), "10.1.0.0");
        assert_eq!(r.end_addr().to_string(), "10.1.255.255");
        assert_eq!(r.family(), AddressFamily::V4);
    }

    #[test]
    fn test_from_prefix_masks_host_bits() {
        let r = AddressRange::from_prefix(&net("192.168.1.77/24"));
        assert_eq!(r, v4("192.168.1.0", "192.168.1.255"));
    }

    #[test]
    fn test_from_prefix_full_spaces() {
        let r = AddressRange::from_prefix(&net("0.0.0.0/0"));
        assert_eq!(r.start(), 0);
        assert_eq!(r.end(), u128::from(u32::MAX));

        let r = AddressRange::from_prefix(&net("::/0"));
        assert_eq!(r.start(), 0);
        assert_eq!(r.end(), u128::MAX);
    }

    #[test]
    fn test_new_rejects_bad_bounds() {
        assert!(AddressRange::new(AddressFamily::V4, 5, 4).is_err());
        assert!(AddressRange::new(AddressFamily::V4, 0, 1 << 32).is_err());
        assert!(AddressRange::new(AddressFamily::V6, 0, u128::MAX).is_ok());
        assert!(AddressRange::from_addrs(
            "10.0.0.1".parse().unwrap(),
            "::1".parse().unwrap()
        )
        .is_err());
    }

    #[test]
    fn test_contains_and_overlaps() {
        let r = v4("10.0.0.0", "10.0.0.255");
        assert!(r.contains("10.0.0.7".parse().unwrap()));
        assert!(!r.contains("10.0.1.0".parse().unwrap()));
        assert!(!r.contains("::a00:7".parse().unwrap()));

        assert!(r.overlaps(&v4("10.0.0.255", "10.0.1.5")));
        assert!(!r.overlaps(&v4("10.0.1.0", "10.0.1.5")));
    }

    #[test]
    fn test_merge_overlapping_and_adjacent() {
        let merged = merge_ranges(vec![
            v4("10.0.2.0", "10.0.2.255"),
            v4("10.0.0.0", "10.0.0.255"),
            v4("10.0.1.0", "10.0.1.255"),
            v4("10.0.0.128", "10.0.0.200"),
            v4("10.0.9.0", "10.0.9.0"),
        ]);
        assert_eq!(
            merged,
            vec![v4("10.0.0.0", "10.0.2.255"), v4("10.0.9.0", "10.0.9.0")]
        );
    }

    #[test]
    fn test_merge_at_top_of_space() {
        let merged = merge_ranges(vec![
            v4("255.255.255.0", "255.255.255.255"),
            v4("255.255.255.255", "255.255.255.255"),
            v4("255.255.254.0", "255.255.254.255"),
        ]);
        assert_eq!(merged, vec![v4("255.255.254.0", "255.255.255.255")]);

        let top = AddressRange::new(AddressFamily::V6, u128::MAX - 1, u128::MAX).unwrap();
        let merged = merge_ranges(vec![top, top]);
        assert_eq!(merged, vec![top]);
    }

    #[test]
    fn test_subtract_one_range() {
        let a = v4("10.0.0.0", "10.0.0.255");

        // Hole in the middle
        let rest = a.subtract(&v4("10.0.0.16", "10.0.0.31"));
        assert_eq!(
            rest,
            vec![v4("10.0.0.0", "10.0.0.15"), v4("10.0.0.32", "10.0.0.255")]
        );

        // Covers the start
        let rest = a.subtract(&v4("9.0.0.0", "10.0.0.127"));
        assert_eq!(rest, vec![v4("10.0.0.128", "10.0.0.255")]);

        // Disjoint
        let rest = a.subtract(&v4("11.0.0.0", "11.0.0.1"));
        assert_eq!(rest, vec![a]);

        // Fully covered
        assert!(a.subtract(&v4("0.0.0.0", "255.255.255.255")).is_empty());
    }

    #[test]
    fn test_subtract_at_max_address() {
        let all = AddressRange::new(AddressFamily::V6, 0, u128::MAX).unwrap();
        let top = AddressRange::new(AddressFamily::V6, u128::MAX, u128::MAX).unwrap();

        let rest = all.subtract(&top);
        assert_eq!(
            rest,
            vec![AddressRange::new(AddressFamily::V6, 0, u128::MAX - 1).unwrap()]
        );
    }

    #[test]
    fn test_subtract_ranges_multiple_cuts() {
        let allowed = vec![v4("10.0.0.0", "10.0.255.255")];
        let disallowed = vec![v4("10.0.1.0", "10.0.1.255"), v4("10.0.3.0", "10.0.3.255")];

        let rest = subtract_ranges(&allowed, &disallowed);
        assert_eq!(
            rest,
            vec![
                v4("10.0.0.0", "10.0.0.255"),
                v4("10.0.2.0", "10.0.2.255"),
                v4("10.0.4.0", "10.0.255.255"),
            ]
        );
    }

    #[test]
    fn test_subtract_ranges_empty_inputs() {
        let a = vec![v4("10.0.0.0", "10.0.0.255")];
        assert!(subtract_ranges(&[], &a).is_empty());
        assert_eq!(subtract_ranges(&a, &[]), a);
    }

    #[test]
    fn test_to_prefixes_aligned_block() {
        let r = AddressRange::from_prefix(&net("10.0.0.0/8"));
        assert_eq!(r.to_prefixes(), vec![net("10.0.0.0/8")]);
    }

    #[test]
    fn test_to_prefixes_unaligned() {
        let r = v4("10.0.0.1", "10.0.0.6");
        assert_eq!(
            r.to_prefixes(),
            vec![
                net("10.0.0.1/32"),
                net("10.0.0.2/31"),
                net("10.0.0.4/31"),
                net("10.0.0.6/32"),
            ]
        );
    }

    #[test]
    fn test_to_prefixes_whole_spaces() {
        let all4 = AddressRange::new(AddressFamily::V4, 0, u128::from(u32::MAX)).unwrap();
        assert_eq!(all4.to_prefixes(), vec![net("0.0.0.0/0")]);

        let all6 = AddressRange::new(AddressFamily::V6, 0, u128::MAX).unwrap();
        assert_eq!(all6.to_prefixes(), vec![net("::/0")]);

        let last = AddressRange::new(AddressFamily::V6, u128::MAX, u128::MAX).unwrap();
        assert_eq!(
            last.to_prefixes(),
            vec![net("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff/128")]
        );
    }

    #[test]
    fn test_to_prefixes_upper_half_v4() {
        let r = v4("128.0.0.0", "255.255.255.255");
        assert_eq!(r.to_prefixes(), vec![net("128.0.0.0/1")]);

        let r = v4("0.0.0.1", "255.255.255.255");
        let prefixes = r.to_prefixes();
        assert_eq!(prefixes.len(), 32);
        assert_eq!(prefixes[0], net("0.0.0.1/32"));
        assert_eq!(prefixes[31], net("128.0.0.0/1"));
    }

    fn arb_v4_range() -> impl Strategy<Value = AddressRange> {
        (any::<u32>(), any::<u32>()).prop_map(|(a, b)| {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            AddressRange::new(AddressFamily::V4, u128::from(lo), u128::from(hi)).unwrap()
        })
    }

    fn arb_v6_range() -> impl Strategy<Value = AddressRange> {
        (any::<u128>(), any::<u128>()).prop_map(|(a, b)| {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            AddressRange::new(AddressFamily::V6, lo, hi).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_prefixes_remerge_to_range_v4(range in arb_v4_range()) {
            let ranges = range.to_prefixes().iter().map(AddressRange::from_prefix).collect();
            prop_assert_eq!(merge_ranges(ranges), vec![range]);
        }

        #[test]
        fn prop_prefixes_remerge_to_range_v6(range in arb_v6_range()) {
            let ranges = range.to_prefixes().iter().map(AddressRange::from_prefix).collect();
            prop_assert_eq!(merge_ranges(ranges), vec![range]);
        }

        #[test]
        fn prop_prefixes_are_disjoint_and_ordered(range in arb_v4_range()) {
            let prefixes = range.to_prefixes();
            prop_assert!(prefixes.len() <= 62);
            for pair in prefixes.windows(2) {
                let a = AddressRange::from_prefix(&pair[0]);
                let b = AddressRange::from_prefix(&pair[1]);
                prop_assert_eq!(a.end() + 1, b.start());
            }
        }

        #[test]
        fn prop_subtract_leaves_no_overlap(
            allowed in proptest::collection::vec(arb_v4_range(), 1..8),
            disallowed in proptest::collection::vec(arb_v4_range(), 0..8),
        ) {
            let allowed = merge_ranges(allowed);
            let disallowed = merge_ranges(disallowed);
            let rest = subtract_ranges(&allowed, &disallowed);

            for r in &rest {
                prop_assert!(disallowed.iter().all(|d| !r.overlaps(d)));
                prop_assert!(allowed.iter().any(|a| a.start() <= r.start() && r.end() <= a.end()));
            }
        }
    }
}
