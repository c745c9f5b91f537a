// ============================================
// File: crates/meshtun-routes/src/error.rs
// ============================================
//! # Route Error Types
//!
//! ## Creation Reason
//! The calculator itself is total over well-formed prefixes; every error
//! in this crate is raised while turning caller input (strings, raw
//! address/length pairs) into prefixes, before the calculator runs.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use meshtun_common::AddressFamily;

// ============================================
// Result Type Alias
// ============================================

/// Result type for route operations.
pub type Result<T> = std::result::Result<T, RouteError>;

// ============================================
// RouteError
// ============================================

/// Errors raised while validating route input.
#[derive(Error, Debug)]
pub enum RouteError {
    /// Prefix string could not be parsed.
    #[error("Invalid prefix '{input}': {reason}")]
    InvalidPrefix {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Prefix length exceeds the width of its address family.
    #[error("Prefix length {len} exceeds {max} for {family}")]
    PrefixLength {
        /// Requested prefix length
        len: u8,
        /// Maximum for the family
        max: u8,
        /// Address family of the prefix
        family: AddressFamily,
    },

    /// Range bounds are reversed or exceed the address space.
    #[error("Invalid {family} range: {reason}")]
    InvalidRange {
        /// Address family of the range
        family: AddressFamily,
        /// Why the range was rejected
        reason: String,
    },
}

impl RouteError {
    /// Creates an `InvalidPrefix` error.
    pub fn invalid_prefix(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPrefix {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidRange` error.
    pub fn invalid_range(family: AddressFamily, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            family,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error was caused by caller input.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPrefix { .. } | Self::PrefixLength { .. } | Self::InvalidRange { .. }
        )
    }
}

// ============================================
// Tests
// ============================================
