// ============================================
// File: crates/meshtun-transport/src/tun/fd.rs
// ============================================
//! # File Descriptor TUN Device
//!
//! ## Creation Reason
//! On Android the VPN service hands out an already configured tunnel
//! file descriptor. This device adopts such a descriptor and drives it
//! through the tokio reactor.
//!
//! ## Main Functionality
//! - Adopts a platform-issued fd (`from_owned_fd` / `from_raw_fd`)
//! - Non-blocking read/write via `AsyncFd`
//! - `close()` wakes pending reads, which fail with `TunClosed`
//! - Emits `TunEvent::Up` once
//!
//! ## ⚠️ Important Note for Next Developer
//! - Construction must happen inside a tokio runtime (`AsyncFd`)
//! - The fd is released on drop, not on `close()`: an in-flight read
//!   may still hold a reference to the device
//!
//! ## Last Modified
//! v0.1.0 - Initial fd-backed implementation

#![cfg(any(target_os = "linux", target_os = "android"))]

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use nix::libc;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{TunConfig, TunDevice, TunEvent};

// ============================================
// FdTun
// ============================================

/// Tunnel device backed by a platform-issued file descriptor.
///
/// # Example
/// ```ignore
/// use meshtun_transport::tun::FdTun;
/// use meshtun_transport::traits::TunConfig;
///
/// // fd obtained from VpnService.Builder.establish()
/// let tun = unsafe { FdTun::from_raw_fd(fd, TunConfig::new("tun0"))? };
/// multi.add_device(Arc::new(tun))?;
/// ```
pub struct FdTun {
    /// Async file descriptor wrapper
    async_fd: AsyncFd<OwnedFd>,
    /// Device configuration
    config: TunConfig,
    /// Set by `close()`
    closed: AtomicBool,
    /// Wakes reads and the event stream on close
    close_notify: Notify,
    /// Whether `Up` was already reported
    up_reported: AtomicBool,
}

impl FdTun {
    /// Adopts an owned tunnel descriptor.
    ///
    /// # Errors
    /// - `InvalidConfig`: If the configuration is invalid
    /// - `TunCreateFailed`: If the fd cannot be made non-blocking or
    ///   registered with the reactor
    pub fn from_owned_fd(fd: OwnedFd, config: TunConfig) -> Result<Self> {
        config.validate()?;

        set_nonblocking(fd.as_raw_fd())
            .map_err(|e| TransportError::tun_create_failed(&config.name, e.to_string()))?;

        let async_fd = AsyncFd::new(fd).map_err(|e| {
            TransportError::tun_create_failed(&config.name, format!("AsyncFd creation failed: {e}"))
        })?;

        info!(name = %config.name, mtu = config.mtu, "Adopted TUN descriptor");

        Ok(Self {
            async_fd,
            config,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            up_reported: AtomicBool::new(false),
        })
    }

    /// Adopts a raw tunnel descriptor.
    ///
    /// # Safety
    /// `fd` must be an open descriptor that nothing else owns or closes.
    ///
    /// # Errors
    /// Same as [`FdTun::from_owned_fd`].
    pub unsafe fn from_raw_fd(fd: RawFd, config: TunConfig) -> Result<Self> {
        Self::from_owned_fd(OwnedFd::from_raw_fd(fd), config)
    }

    fn closed_error(&self) -> TransportError {
        TransportError::tun_closed(&self.config.name)
    }

    async fn read_ready(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let mut guard = self
                .async_fd
                .ready(Interest::READABLE)
                .await
                .map_err(|e| TransportError::read_failed(e.to_string()))?;

            match guard.try_io(|inner| {
                let fd = inner.get_ref().as_raw_fd();
                // SAFETY: buf is valid for buf.len() bytes of writes
                let result = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
                if result < 0 {
                    Err(std::io::Error::last_os_error())
                } else {
                    Ok(result.unsigned_abs())
                }
            }) {
                Ok(Ok(len)) => return Ok(len),
                Ok(Err(e)) => return Err(TransportError::read_failed(e.to_string())),
                Err(_would_block) => continue,
            }
        }
    }
}

fn set_nonblocking(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: fcntl on a descriptor we own
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: as above
    let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if result < 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(())
}

#[async_trait]
impl TunDevice for FdTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let notified = self.close_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }

        tokio::select! {
            result = self.read_ready(buf) => result,
            () = &mut notified => Err(self.closed_error()),
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }

        loop {
            let mut guard = self
                .async_fd
                .ready(Interest::WRITABLE)
                .await
                .map_err(|e| TransportError::write_failed(e.to_string()))?;

            match guard.try_io(|inner| {
                let fd = inner.get_ref().as_raw_fd();
                // SAFETY: buf is valid for buf.len() bytes of reads
                let result = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
                if result < 0 {
                    Err(std::io::Error::last_os_error())
                } else {
                    Ok(result.unsigned_abs())
                }
            }) {
                Ok(Ok(len)) => return Ok(len),
                Ok(Err(e)) => return Err(TransportError::write_failed(e.to_string())),
                Err(_would_block) => continue,
            }
        }
    }

    async fn mtu(&self) -> Result<u16> {
        Ok(self.config.mtu)
    }

    async fn name(&self) -> Result<String> {
        Ok(self.config.name.clone())
    }

    async fn next_event(&self) -> Option<TunEvent> {
        if !self.up_reported.swap(true, Ordering::AcqRel) {
            return Some(TunEvent::Up);
        }

        let notified = self.close_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.closed.load(Ordering::Acquire) {
            notified.await;
        }
        None
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(name = %self.config.name, "Closing TUN descriptor");
        }
        self.close_notify.notify_waiters();
        Ok(())
    }
}

impl Drop for FdTun {
    fn drop(&mut self) {
        debug!(name = %self.config.name, "Releasing TUN descriptor");
    }
}

impl std::fmt::Debug for FdTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FdTun")
            .field("fd", &self.async_fd.get_ref().as_raw_fd())
            .field("name", &self.config.name)
            .field("mtu", &self.config.mtu)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

// ============================================
// Tests
// ============================================
