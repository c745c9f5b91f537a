// ============================================
// File: crates/meshtun-routes/src/calc.rs
// ============================================
//! # Route Range Calculator
//!
//! ## Creation Reason
//! The tunnel must route "all allowed prefixes except the local ones", but
//! the platform route table only takes positive prefixes. The calculator
//! turns (allowed, disallowed) into the minimal prefix lists that cover
//! exactly the difference.
//!
//! ## Main Functionality
//! - `RouteCalculator`: holds the two inputs, computes on demand
//! - `RoutePrefixes`: per-family outputs
//! - [`compute`]: one-shot helper
//!
//! ## Algorithm
//! ```text
//! per family:
//!   allowed    ──► ranges ──► merge ─┐
//!                                    ├─► subtract ─► merge ─► prefixes
//!   disallowed ──► ranges ──► merge ─┘
//! ```
//! Families never interact: a disallowed IPv6 prefix has no effect on the
//! IPv4 output, and a family with no allowed prefixes yields nothing.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Output is canonical: feeding it back as `allowed` with an empty
//!   `disallowed` returns it unchanged
//! - Pure and synchronous; callers may run it on any thread
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use ipnet::IpNet;
use tracing::debug;

use meshtun_common::AddressFamily;

use crate::range::{merge_ranges, subtract_ranges, AddressRange};

// ============================================
// RoutePrefixes
// ============================================

/// Minimal prefix lists produced by the calculator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePrefixes {
    /// IPv4 prefixes in ascending address order.
    pub ipv4: Vec<IpNet>,
    /// IPv6 prefixes in ascending address order.
    pub ipv6: Vec<IpNet>,
}

impl RoutePrefixes {
    /// Returns `true` if both lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    /// Total number of prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    /// Iterates IPv4 prefixes, then IPv6 prefixes.
    pub fn iter(&self) -> impl Iterator<Item = &IpNet> {
        self.ipv4.iter().chain(self.ipv6.iter())
    }

    /// Prefixes of one family.
    #[must_use]
    pub fn family(&self, family: AddressFamily) -> &[IpNet] {
        match family {
            AddressFamily::V4 => &self.ipv4,
            AddressFamily::V6 => &self.ipv6,
        }
    }
}

impl IntoIterator for RoutePrefixes {
    type Item = IpNet;
    type IntoIter = std::iter::Chain<std::vec::IntoIter<IpNet>, std::vec::IntoIter<IpNet>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ipv4.into_iter().chain(self.ipv6)
    }
}

// ============================================
// RouteCalculator
// ============================================

/// Computes routes as allowed prefixes minus disallowed prefixes.
///
/// # Example
/// ```
/// use meshtun_routes::{parse_prefixes, RouteCalculator};
///
/// let allowed = parse_prefixes("0.0.0.0/0").unwrap();
/// let local = parse_prefixes("128.0.0.0/1").unwrap();
///
/// let routes = RouteCalculator::new(allowed, local).calculate();
/// assert_eq!(routes.ipv4[0].to_string(), "0.0.0.0/1");
/// assert!(routes.ipv6.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteCalculator {
    allowed: Vec<IpNet>,
    disallowed: Vec<IpNet>,
}

impl RouteCalculator {
    /// Creates a calculator over the given inputs.
    #[must_use]
    pub fn new(allowed: Vec<IpNet>, disallowed: Vec<IpNet>) -> Self {
        Self {
            allowed,
            disallowed,
        }
    }

    /// Adds an allowed prefix.
    #[must_use]
    pub fn allow(mut self, prefix: IpNet) -> Self {
        self.allowed.push(prefix);
        self
    }

    /// Adds a disallowed prefix.
    #[must_use]
    pub fn exclude(mut self, prefix: IpNet) -> Self {
        self.disallowed.push(prefix);
        self
    }

    /// Allowed input prefixes.
    #[must_use]
    pub fn allowed(&self) -> &[IpNet] {
        &self.allowed
    }

    /// Disallowed input prefixes.
    #[must_use]
    pub fn disallowed(&self) -> &[IpNet] {
        &self.disallowed
    }

    /// Runs the calculation.
    #[must_use]
    pub fn calculate(&self) -> RoutePrefixes {
        let routes = RoutePrefixes {
            ipv4: self.calculate_family(AddressFamily::V4),
            ipv6: self.calculate_family(AddressFamily::V6),
        };

        debug!(
            allowed = self.allowed.len(),
            disallowed = self.disallowed.len(),
            ipv4 = routes.ipv4.len(),
            ipv6 = routes.ipv6.len(),
            "Calculated route prefixes"
        );

        routes
    }

    fn calculate_family(&self, family: AddressFamily) -> Vec<IpNet> {
        let allowed = ranges_of(&self.allowed, family);
        if allowed.is_empty() {
            return Vec::new();
        }
        let disallowed = ranges_of(&self.disallowed, family);

        subtract_ranges(&allowed, &disallowed)
            .iter()
            .flat_map(AddressRange::to_prefixes)
            .collect()
    }
}

fn ranges_of(prefixes: &[IpNet], family: AddressFamily) -> Vec<AddressRange> {
    merge_ranges(
        prefixes
            .iter()
            .filter(|p| AddressFamily::of(&p.addr()) == family)
            .map(AddressRange::from_prefix)
            .collect(),
    )
}

/// Computes `allowed - disallowed` as minimal per-family prefix lists.
#[must_use]
pub fn compute(allowed: &[IpNet], disallowed: &[IpNet]) -> RoutePrefixes {
    RouteCalculator::new(allowed.to_vec(), disallowed.to_vec()).calculate()
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::parse_prefixes;
    use proptest::prelude::*;

    fn nets(s: &str) -> Vec<IpNet> {
        parse_prefixes(s).unwrap()
    }

    fn strings(list: &[IpNet]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_no_disallowed_merges_allowed() {
        let routes = compute(&nets("10.0.0.0/24 10.0.1.0/24"), &[]);
        assert_eq!(strings(&routes.ipv4), ["10.0.0.0/23"]);
        assert!(routes.ipv6.is_empty());
    }

    #[test]
    fn test_default_route_minus_private_v4() {
        let routes = compute(
            &nets("0.0.0.0/0"),
            &nets("10.0.0.0/8 172.16.0.0/12 192.168.0.0/16"),
        );

        // No output prefix may overlap any excluded block
        for p in &routes.ipv4 {
            let r = AddressRange::from_prefix(p);
            for cut in nets("10.0.0.0/8 172.16.0.0/12 192.168.0.0/16") {
                assert!(!r.overlaps(&AddressRange::from_prefix(&cut)), "{p} overlaps {cut}");
            }
        }
        assert_eq!(routes.ipv4.first().unwrap().to_string(), "0.0.0.0/5");
        assert_eq!(routes.ipv4.last().unwrap().to_string(), "224.0.0.0/3");
        assert!(strings(&routes.ipv4).contains(&"192.169.0.0/16".to_string()));
        assert_eq!(routes.ipv4.len(), 31);
    }

    #[test]
    fn test_excluding_upper_half() {
        let routes = compute(&nets("0.0.0.0/0"), &nets("128.0.0.0/1"));
        assert_eq!(strings(&routes.ipv4), ["0.0.0.0/1"]);
    }

    #[test]
    fn test_excluding_single_host() {
        let routes = compute(&nets("10.0.0.0/30"), &nets("10.0.0.1/32"));
        assert_eq!(strings(&routes.ipv4), ["10.0.0.0/32", "10.0.0.2/31"]);
    }

    #[test]
    fn test_fully_excluded() {
        let routes = compute(&nets("10.1.0.0/16"), &nets("10.0.0.0/8"));
        assert!(routes.ipv4.is_empty());
    }

    #[test]
    fn test_families_are_independent() {
        let routes = compute(&nets("10.0.0.0/8 fd00::/8"), &nets("::/0"));
        assert_eq!(strings(&routes.ipv4), ["10.0.0.0/8"]);
        assert!(routes.ipv6.is_empty());

        let routes = compute(&nets("fd00::/8"), &nets("0.0.0.0/0"));
        assert!(routes.ipv4.is_empty());
        assert_eq!(strings(&routes.ipv6), ["fd00::/8"]);
    }

    #[test]
    fn test_v6_default_minus_last_address() {
        let routes = compute(
            &nets("::/0"),
            &nets("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff/128"),
        );
        assert_eq!(routes.ipv6.len(), 128);
        assert_eq!(routes.ipv6[0].to_string(), "::/1");
        assert_eq!(
            routes.ipv6[127].to_string(),
            "ffff:ffff:ffff:ffff:ffff:ffff:ffff:fffe/128"
        );
    }

    #[test]
    fn test_host_bits_are_masked() {
        let routes = compute(&nets("10.0.0.77/24"), &[]);
        assert_eq!(strings(&routes.ipv4), ["10.0.0.0/24"]);
    }

    #[test]
    fn test_empty_inputs() {
        let routes = compute(&[], &nets("10.0.0.0/8"));
        assert!(routes.is_empty());
        assert_eq!(routes.len(), 0);
    }

    #[test]
    fn test_builder_and_iteration() {
        let routes = RouteCalculator::default()
            .allow("10.0.0.0/8".parse().unwrap())
            .allow("fd00::/8".parse().unwrap())
            .exclude("10.128.0.0/9".parse().unwrap())
            .calculate();

        assert_eq!(routes.len(), 2);
        let all: Vec<String> = routes.iter().map(ToString::to_string).collect();
        assert_eq!(all, ["10.0.0.0/9", "fd00::/8"]);
        assert_eq!(routes.family(AddressFamily::V6).len(), 1);
        assert_eq!(routes.into_iter().count(), 2);
    }

    fn arb_v4_net() -> impl Strategy<Value = IpNet> {
        (any::<u32>(), 0u8..=32).prop_map(|(addr, len)| {
            IpNet::new(std::net::Ipv4Addr::from(addr).into(), len).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_output_is_canonical(
            allowed in proptest::collection::vec(arb_v4_net(), 0..6),
            disallowed in proptest::collection::vec(arb_v4_net(), 0..6),
        ) {
            let first = compute(&allowed, &disallowed);
            let again = compute(&first.ipv4, &[]);
            prop_assert_eq!(first, again);
        }

        #[test]
        fn prop_output_excludes_disallowed(
            allowed in proptest::collection::vec(arb_v4_net(), 1..6),
            disallowed in proptest::collection::vec(arb_v4_net(), 1..6),
        ) {
            let routes = compute(&allowed, &disallowed);
            let merged = merge_ranges(allowed.iter().map(AddressRange::from_prefix).collect());
            for p in &routes.ipv4 {
                let r = AddressRange::from_prefix(p);
                for d in &disallowed {
                    prop_assert!(!r.overlaps(&AddressRange::from_prefix(d)));
                }
                prop_assert!(merged.iter().any(|a| a.start() <= r.start() && r.end() <= a.end()));
            }
        }
    }
}
