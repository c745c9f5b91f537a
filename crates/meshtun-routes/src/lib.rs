// ============================================
// File: crates/meshtun-routes/src/lib.rs
// ============================================
//! # meshtun Routes - Route Range Calculator
//!
//! ## Creation Reason
//! The platform VPN builder accepts only positive routes. To send
//! "everything except the local networks" through the tunnel, the client
//! needs the exact set difference of two prefix lists expressed as the
//! fewest possible prefixes.
//!
//! ## Main Functionality
//!
//! ### Range Algebra ([`range`])
//! - `AddressRange`: inclusive integer range over one address family
//! - Merge, subtract and minimal prefix decomposition
//!
//! ### Calculator ([`calc`])
//! - `RouteCalculator`: allowed minus disallowed, per family
//! - `RoutePrefixes`: IPv4 and IPv6 outputs
//!
//! ### Parsing ([`prefix`])
//! - Text to prefix with validation
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               meshtun-client                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   meshtun-routes  ◄──  meshtun-transport           │
//! │   You are here                │                    │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             meshtun-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Addresses are `u128` internally; IPv4 lives in the low 32 bits
//! - Never compute `end + 1` on the last address of a family
//! - The calculator is pure: no I/O, no async
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod calc;
pub mod error;
pub mod prefix;
pub mod range;

pub use calc::{compute, RouteCalculator, RoutePrefixes};
pub use error::{Result, RouteError};
pub use prefix::{parse_prefix, parse_prefixes, prefix_from_parts};
pub use range::{merge_ranges, subtract_ranges, AddressRange};
