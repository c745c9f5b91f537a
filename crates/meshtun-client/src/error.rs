// ============================================
// File: crates/meshtun-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Main Functionality
//! - `ClientError`: configuration, establishment and parsing failures
//! - Wraps transport and route errors transparently
//!
//! ## Last Modified
//! v0.1.0 - Initial client error types

use thiserror::Error;

use meshtun_routes::RouteError;
use meshtun_transport::TransportError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// Configuration source
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Configuration value is invalid.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Offending field, dotted path
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// A VPN builder call was rejected by the platform.
    #[error("VPN builder call '{call}' failed: {reason}")]
    Builder {
        /// Builder method name
        call: &'static str,
        /// Platform message
        reason: String,
    },

    /// The platform returned no tunnel: VPN not prepared or permission revoked.
    #[error("VPN service not prepared or was revoked")]
    VpnNotPrepared,

    /// Establishment failed because of the platform multi-user restriction.
    #[error("VPN cannot be created on this device due to a platform bug with multiple users")]
    MultipleUsers,

    /// Establishment failed for another reason.
    #[error("Failed to establish VPN: {reason}")]
    Establish {
        /// Platform message
        reason: String,
    },

    /// Interface payload does not look like JSON.
    #[error("Not a JSON interfaces payload")]
    NotJson,

    /// Interface payload could not be decoded.
    #[error("Failed to parse interface list: {reason}")]
    InterfaceParse {
        /// Decoder message
        reason: String,
    },

    /// A platform query failed.
    #[error("Platform call '{call}' failed: {reason}")]
    Platform {
        /// Queried method
        call: &'static str,
        /// Platform message
        reason: String,
    },

    #[error(transparent)]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn builder(call: &'static str, reason: impl Into<String>) -> Self {
        Self::Builder {
            call,
            reason: reason.into(),
        }
    }

    pub fn establish(reason: impl Into<String>) -> Self {
        Self::Establish {
            reason: reason.into(),
        }
    }

    pub fn interface_parse(reason: impl Into<String>) -> Self {
        Self::InterfaceParse {
            reason: reason.into(),
        }
    }

    pub fn platform(call: &'static str, reason: impl Into<String>) -> Self {
        Self::Platform {
            call,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns `true` for failures reported while bringing the VPN up.
    #[must_use]
    pub const fn is_establish_error(&self) -> bool {
        matches!(
            self,
            Self::Builder { .. } | Self::VpnNotPrepared | Self::MultipleUsers | Self::Establish { .. }
        )
    }

    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::MultipleUsers)
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::VpnNotPrepared => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::config_load("/etc/meshtun/client.toml", "file not found");
        assert!(err.to_string().contains("/etc/meshtun/client.toml"));

        let err = ClientError::builder("add_route", "bad prefix");
        assert_eq!(err.to_string(), "VPN builder call 'add_route' failed: bad prefix");
    }

    #[test]
    fn test_error_classification() {
        let config_err = ClientError::config_invalid("tun.default_mtu", "too small");
        assert!(config_err.is_config_error());
        assert!(!config_err.is_establish_error());

        assert!(ClientError::MultipleUsers.is_establish_error());
        assert!(ClientError::MultipleUsers.is_fatal());
        assert!(ClientError::VpnNotPrepared.is_retryable());
        assert!(!ClientError::establish("denied").is_retryable());
    }

    #[test]
    fn test_wrapped_errors_are_transparent() {
        let err: ClientError = TransportError::Closed.into();
        assert_eq!(err.to_string(), TransportError::Closed.to_string());
    }
}
