// ============================================
// File: crates/meshtun-common/src/lib.rs
// ============================================
//! # meshtun Common - Shared Types Library
//!
//! ## Creation Reason
//! Provides the small set of types shared by the route calculator, the
//! tunnel transport and the client crate, so that the leaf crates agree on
//! address families and device identifiers.
//!
//! ## Main Functionality
//! - [`types`]: `AddressFamily`, `DeviceId`
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               meshtun-client                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   meshtun-routes       meshtun-transport           │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             meshtun-common  ◄── You are here      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal (no async runtime here)
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod types;

// Re-export commonly used items at crate root
pub use types::{AddressFamily, DeviceId};
