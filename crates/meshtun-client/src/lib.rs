// ============================================
// File: crates/meshtun-client/src/lib.rs
// ============================================
//! # meshtun Client Library
//!
//! ## Creation Reason
//! Glues the route calculator and the tunnel multiplexer to the host
//! platform: turns router/DNS configuration into platform tunnel
//! requests and hands every issued tunnel to one multiplexed device.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Client configuration management
//! - [`bridge`]: Traits implemented by the host platform
//! - [`tunnel`]: `TunnelManager`, the tunnel update flow
//! - [`dns`]: Platform DNS configuration
//! - [`interfaces`]: Platform interface list parsing
//! - [`error`]: Client-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Host platform                           │
//! │     VpnService / Builder        AppContext     Monitor       │
//! └───────────┬──────────────────────────┬────────────▲──────────┘
//!             │ bridge traits            │            │
//! ┌───────────▼──────────────────────────▼────────────┴──────────┐
//! │                     TunnelManager                            │
//! │   config ──► routes (meshtun-routes) ──► builder calls       │
//! │                          │                                   │
//! │                     establish                                │
//! │                          ▼                                   │
//! │              MultiTun (meshtun-transport) ──► engine         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `TunnelManager::new` must run inside a tokio runtime
//! - The engine must only ever see `TunnelManager::device()`, never a
//!   platform tunnel directly
//!
//! ## Last Modified
//! v0.1.0 - Initial client library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod config;
pub mod dns;
pub mod error;
pub mod interfaces;
pub mod tunnel;

// Re-export primary types
pub use bridge::{AppContext, NetworkMonitor, PlatformError, VpnService, VpnServiceBuilder};
pub use config::ClientConfig;
pub use dns::DnsConfig;
pub use error::{ClientError, Result};
pub use interfaces::{parse_interfaces, Interface, ParseStats};
pub use tunnel::{RouterConfig, TunnelManager};
