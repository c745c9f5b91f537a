// ============================================
// File: crates/meshtun-transport/src/tun/mock.rs
// ============================================
//! # Mock TUN Device Implementation
//!
//! ## Creation Reason
//! Provides an in-memory tunnel handle for exercising the multiplexer
//! without a platform VPN service or file descriptors.
//!
//! ## Main Functionality
//! - Injected packets for `read()`, captured packets from `write()`
//! - Injected read/write failures
//! - Event emission on the side channel
//! - `close()` aborts pending reads, optionally failing itself
//!
//! ## Usage in Tests
//! ```
//! use meshtun_transport::tun::MockTun;
//! use meshtun_transport::traits::{TunConfig, TunDevice};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let tun = MockTun::new(TunConfig::new("mock0"));
//! tun.inject_packet(b"test packet".to_vec());
//!
//! let mut buf = [0u8; 1500];
//! let len = tun.read(&mut buf).await.unwrap();
//! assert_eq!(&buf[..len], b"test packet");
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Waiters register with `Notify` before checking state, so a wakeup
//!   between the check and the await is never lost
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::error::{Result, TransportError};
use crate::traits::{TunConfig, TunDevice, TunEvent};

// ============================================
// Constants
// ============================================

/// Maximum number of packets to queue.
const MAX_QUEUE_SIZE: usize = 1000;

// ============================================
// MockTun
// ============================================

/// Mock TUN device for testing.
///
/// # Example
/// ```
/// use meshtun_transport::tun::MockTun;
/// use meshtun_transport::traits::{TunConfig, TunDevice};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tun = MockTun::new(TunConfig::new("mock0"));
///
/// tun.write(b"test packet").await?;
///
/// let captured = tun.take_written_packets();
/// assert_eq!(captured.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockTun {
    /// Device configuration
    config: TunConfig,
    /// Current MTU, starts at `config.mtu`
    mtu: AtomicU16,
    /// Packets waiting to be read (injected for testing)
    read_queue: Mutex<VecDeque<Vec<u8>>>,
    /// Errors returned by upcoming reads, ahead of packets
    read_failures: Mutex<VecDeque<TransportError>>,
    /// Errors returned by upcoming writes
    write_failures: Mutex<VecDeque<TransportError>>,
    /// Packets that have been written (captured for verification)
    write_queue: Mutex<VecDeque<Vec<u8>>>,
    /// Wakes readers on injection and on close
    read_notify: Notify,
    /// Wakes `wait_for_writes` callers
    write_notify: Notify,
    /// Set by `close()`
    closed: AtomicBool,
    /// Number of `close()` calls
    close_calls: AtomicUsize,
    /// Error returned by the next `close()`
    close_error: Mutex<Option<TransportError>>,
    /// Event side channel; the sender is dropped on close
    events_tx: Mutex<Option<mpsc::UnboundedSender<TunEvent>>>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<TunEvent>>,
}

impl MockTun {
    /// Creates a new mock TUN device.
    #[must_use]
    pub fn new(config: TunConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            mtu: AtomicU16::new(config.mtu),
            config,
            read_queue: Mutex::new(VecDeque::with_capacity(100)),
            read_failures: Mutex::new(VecDeque::new()),
            write_failures: Mutex::new(VecDeque::new()),
            write_queue: Mutex::new(VecDeque::with_capacity(100)),
            read_notify: Notify::new(),
            write_notify: Notify::new(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            close_error: Mutex::new(None),
            events_tx: Mutex::new(Some(events_tx)),
            events_rx: tokio::sync::Mutex::new(events_rx),
        }
    }

    /// Injects a packet to be returned by a future `read()` call.
    ///
    /// # Panics
    /// Panics if the queue is full (> `MAX_QUEUE_SIZE` packets).
    pub fn inject_packet(&self, packet: impl Into<Vec<u8>>) {
        let mut queue = self.read_queue.lock();
        assert!(queue.len() < MAX_QUEUE_SIZE, "Mock TUN read queue overflow");
        queue.push_back(packet.into());
        drop(queue);
        self.read_notify.notify_waiters();
    }

    /// Makes the next `read()` fail with `err`, waking a pending reader.
    pub fn fail_next_read(&self, err: TransportError) {
        self.read_failures.lock().push_back(err);
        self.read_notify.notify_waiters();
    }

    /// Makes the next `write()` fail with `err`.
    pub fn fail_next_write(&self, err: TransportError) {
        self.write_failures.lock().push_back(err);
    }

    /// Makes the next `close()` return `err`.
    pub fn set_close_error(&self, err: TransportError) {
        *self.close_error.lock() = Some(err);
    }

    /// Emits an event on the side channel. Ignored after close.
    pub fn emit_event(&self, event: TunEvent) {
        if let Some(tx) = self.events_tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Changes the MTU and emits `MtuUpdate`.
    pub fn set_mtu(&self, mtu: u16) {
        self.mtu.store(mtu, Ordering::Release);
        self.emit_event(TunEvent::MtuUpdate(mtu));
    }

    /// Takes all packets that have been written to the device.
    ///
    /// This clears the write queue.
    #[must_use]
    pub fn take_written_packets(&self) -> Vec<Vec<u8>> {
        let mut queue = self.write_queue.lock();
        queue.drain(..).collect()
    }

    /// Waits until at least `count` packets have been written.
    pub async fn wait_for_writes(&self, count: usize) {
        loop {
            let notified = self.write_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.written_count() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Returns the number of packets waiting to be read.
    #[must_use]
    pub fn pending_read_count(&self) -> usize {
        self.read_queue.lock().len()
    }

    /// Returns the number of packets that have been written.
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.write_queue.lock().len()
    }

    /// Returns `true` once `close()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of times `close()` was called.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl TunDevice for MockTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let notified = self.read_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return Err(TransportError::tun_closed(&self.config.name));
            }
            if let Some(err) = self.read_failures.lock().pop_front() {
                return Err(err);
            }
            if let Some(packet) = self.read_queue.lock().pop_front() {
                let len = packet.len().min(buf.len());
                buf[..len].copy_from_slice(&packet[..len]);
                return Ok(len);
            }

            notified.await;
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(TransportError::tun_closed(&self.config.name));
        }
        if let Some(err) = self.write_failures.lock().pop_front() {
            return Err(err);
        }

        let mut queue = self.write_queue.lock();
        if queue.len() >= MAX_QUEUE_SIZE {
            return Err(TransportError::write_failed("Write queue full"));
        }
        queue.push_back(buf.to_vec());
        drop(queue);
        self.write_notify.notify_waiters();
        Ok(buf.len())
    }

    async fn mtu(&self) -> Result<u16> {
        Ok(self.mtu.load(Ordering::Acquire))
    }

    async fn name(&self) -> Result<String> {
        Ok(self.config.name.clone())
    }

    async fn next_event(&self) -> Option<TunEvent> {
        self.events_rx.lock().await.recv().await
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::AcqRel);
        self.closed.store(true, Ordering::Release);
        self.events_tx.lock().take();
        self.read_notify.notify_waiters();

        match self.close_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MockTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTun")
            .field("name", &self.config.name)
            .field("mtu", &self.mtu.load(Ordering::Relaxed))
            .field("closed", &self.is_closed())
            .field("pending_reads", &self.pending_read_count())
            .field("written_packets", &self.written_count())
            .finish_non_exhaustive()
    }
}

impl Default for MockTun {
    fn default() -> Self {
        Self::new(TunConfig::default())
    }
}

// ============================================
// Tests
// ============================================
