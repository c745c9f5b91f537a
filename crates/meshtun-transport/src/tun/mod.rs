// ============================================
// File: crates/meshtun-transport/src/tun/mod.rs
// ============================================
//! # TUN Device Module
//!
//! ## Creation Reason
//! Provides the concrete tunnel handles the multiplexer is fed with.
//!
//! ## Platform Implementations
//! - `fd`: adopts a descriptor issued by the platform VPN service
//!   (Linux/Android)
//! - `mock`: in-memory implementation for testing
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  VpnService.Builder.establish()  ──►  fd                  │
//! │                                        │                  │
//! │                                        ▼                  │
//! │                                  FdTun (TunDevice)        │
//! │                                        │ add_device       │
//! │                                        ▼                  │
//! │                                  MultiTun ──► engine      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - TUN packets are raw IP (no Ethernet header)
//! - Every implementation must abort pending reads on `close()`
//!
//! ## Last Modified
//! v0.1.0 - Initial TUN module structure

// Platform-specific implementations
#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod fd;

// Mock implementation for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use fd::FdTun;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTun;
