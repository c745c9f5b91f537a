// ============================================
// File: crates/meshtun-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for tunnel device I/O and for the handle
//! multiplexer built on top of it.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Error conversion from system errors
//! - Categorization of retryable vs fatal errors
//!
//! ## Error Categories
//! 1. **Device Errors**: read/write failures, closed handles
//! 2. **Multiplexer Errors**: operations after `close`
//! 3. **Configuration Errors**: invalid MTU, queue depth
//! 4. **System Errors**: fd setup, I/O with context
//!
//! ## ⚠️ Important Note for Next Developer
//! - `TunClosed` is what a draining device returns; the multiplexer
//!   decides whether it reaches the caller, not this type
//! - `Clone` is required: one close error may be reported to several
//!   waiters
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::sync::Arc;

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    // ========================================
    // Device Errors
    // ========================================

    /// Failed to adopt a TUN handle.
    #[error("Failed to create TUN device '{name}': {reason}")]
    TunCreateFailed {
        /// Device name
        name: String,
        /// Why creation failed
        reason: String,
    },

    /// TUN device read failed.
    #[error("TUN read failed: {reason}")]
    TunReadFailed {
        /// Why read failed
        reason: String,
    },

    /// TUN device write failed.
    #[error("TUN write failed: {reason}")]
    TunWriteFailed {
        /// Why write failed
        reason: String,
    },

    /// The underlying handle was closed.
    #[error("TUN device '{name}' is closed")]
    TunClosed {
        /// Device name
        name: String,
    },

    /// Close of the underlying handle failed.
    #[error("TUN close failed: {reason}")]
    TunCloseFailed {
        /// Why close failed
        reason: String,
    },

    // ========================================
    // Multiplexer Errors
    // ========================================

    /// The multiplexer was closed.
    #[error("Tunnel multiplexer is closed")]
    Closed,

    // ========================================
    // Configuration Errors
    // ========================================

    /// Invalid configuration.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig {
        /// Configuration field name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: Arc<io::Error>,
    },
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `TunCreateFailed` error.
    pub fn tun_create_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TunCreateFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `TunReadFailed` error.
    pub fn read_failed(reason: impl Into<String>) -> Self {
        Self::TunReadFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `TunWriteFailed` error.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::TunWriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `TunClosed` error.
    pub fn tun_closed(name: impl Into<String>) -> Self {
        Self::TunClosed { name: name.into() }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if the device or multiplexer is gone.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::TunClosed { .. } | Self::Closed)
    }

    /// Returns `true` if this is a TUN device error.
    #[must_use]
    pub const fn is_tun_error(&self) -> bool {
        matches!(
            self,
            Self::TunCreateFailed { .. }
                | Self::TunReadFailed { .. }
                | Self::TunWriteFailed { .. }
                | Self::TunClosed { .. }
                | Self::TunCloseFailed { .. }
        )
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::io("unspecified I/O operation", err)
    }
}

// ============================================
// Tests
// ============================================
