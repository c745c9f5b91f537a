// ============================================
// File: crates/meshtun-transport/src/lib.rs
// ============================================
//! # meshtun Transport - Tunnel Device Layer
//!
//! ## Creation Reason
//! The platform hands out tunnel handles one at a time and retires them
//! without warning. This crate defines the tunnel device abstraction and
//! the multiplexer that turns a sequence of handles into one continuous
//! device for the networking engine.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `TunDevice`, `TunEvent`, device and multiplexer configs
//! - [`tun`]: fd-backed device (Linux/Android) and mock device
//! - [`multi`]: `MultiTun`, the handle multiplexer
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               meshtun-client                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   meshtun-routes       meshtun-transport           │
//! │                        You are here ◄──            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             meshtun-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Networking engine                        │
//! │                       ▲                                  │
//! │            read/write │ events                           │
//! │            ┌──────────┴──────────┐                      │
//! │            │      MultiTun       │                      │
//! │            └──┬───────────────┬──┘                      │
//! │      reads    │               │   writes + events        │
//! │            ┌──┴───┐        ┌──┴───┐                      │
//! │            │ tun#1│ ─────► │ tun#2│   (handover)         │
//! │            └──────┘        └──────┘                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Platform Support
//! | Platform | MultiTun | FdTun |
//! |----------|----------|-------|
//! | Android | ✅ | ✅ |
//! | Linux | ✅ | ✅ |
//! | Other | ✅ | ❌ |
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always use traits for testability
//! - Platform-specific code must be isolated
//! - Mock implementations available with `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod multi;
pub mod traits;
pub mod tun;

// Re-export primary types
pub use error::{Result, TransportError};
pub use multi::MultiTun;
pub use traits::{MultiTunConfig, TunConfig, TunDevice, TunEvent};

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use tun::FdTun;
