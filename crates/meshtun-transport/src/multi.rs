// ============================================
// File: crates/meshtun-transport/src/multi.rs
// ============================================
//! # Tunnel Handle Multiplexer
//!
//! ## Creation Reason
//! The platform issues a fresh tunnel handle on every reconfiguration and
//! the old one stops working at an unpredictable moment. The networking
//! engine wants a single device that never goes away. `MultiTun` accepts
//! the stream of handles and presents them as one `TunDevice`.
//!
//! ## Main Functionality
//! - `MultiTun`: the caller-facing handle, implements `TunDevice`
//! - Coordinator task: sole owner of the device FIFO
//! - Per-device read pump and write pump tasks
//!
//! ## Architecture
//! ```text
//!   read()/write()            add_device()/mtu()/shutdown()/close()
//!       │                                   │
//!       ▼ bounded queues                    ▼ control channel
//!  ┌─────────────────────────────────────────────────────────┐
//!  │ Coordinator                                             │
//!  │   devices: [ tun#1 (Draining) | tun#2 | tun#3 (tail) ]  │
//!  │                 ▲ head: read pump       ▲ write pump    │
//!  └─────────────────────────────────────────────────────────┘
//! ```
//! The read queue is moved into the read pump of the oldest device not
//! yet closed and handed back when that pump stops; the write queue
//! travels the same way with the newest active device. Only one pump of
//! each kind exists at any time.
//!
//! ## Device Lifecycle
//! ```text
//!   Active ──(superseded / shutdown)──► Draining ──(close returned)──► Closed
//! ```
//! A draining head keeps serving reads until its close lands, so packets
//! the platform queued on it before the handover still reach the caller.
//! Its read pump stops when a read fails after the device left `Active`,
//! or when the device reaches `Closed` while no read is in flight.
//!
//! A read error seen while the device is still `Active` reaches the
//! caller. A read error seen after the device left `Active` is the close
//! aborting the read: it is swallowed and the request is re-issued on the
//! next device instead of being answered with an empty read. Only when
//! no device is left (shutdown or close) does the caller get `Ok(0)`.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never touch `Coordinator::devices` from outside the coordinator task
//! - A device is retired only once it is closed and neither pump runs on it
//! - `close()` on the underlying handle MUST abort pending reads, or
//!   shutdown waits forever
//!
//! ## Last Modified
//! v0.1.0 - Initial multiplexer

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use meshtun_common::DeviceId;

use crate::error::{Result, TransportError};
use crate::traits::{MultiTunConfig, TunDevice, TunEvent};

// ============================================
// Messages
// ============================================

struct ReadRequest {
    len: usize,
    reply: oneshot::Sender<Result<BytesMut>>,
}

struct WriteRequest {
    packet: Bytes,
    reply: oneshot::Sender<Result<usize>>,
}

enum Control {
    Add(DeviceId, Arc<dyn TunDevice>),
    Mtu(oneshot::Sender<Result<u16>>),
    Name(oneshot::Sender<Result<String>>),
    DeviceCount(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

// ============================================
// MultiTun
// ============================================

/// A single logical tunnel device over a succession of platform handles.
///
/// Reads are served by the oldest device until it is closed, writes and
/// events by the newest. Adding a device requests close of the previous newest
/// one without waiting for it.
///
/// # Example
/// ```ignore
/// let multi = MultiTun::new(MultiTunConfig::default())?;
/// multi.add_device(Arc::new(first))?;
///
/// // later, the platform re-establishes the tunnel
/// multi.add_device(Arc::new(second))?;
///
/// let n = multi.read(&mut buf).await?;
/// ```
pub struct MultiTun {
    control_tx: mpsc::UnboundedSender<Control>,
    reads_tx: mpsc::Sender<ReadRequest>,
    writes_tx: mpsc::Sender<WriteRequest>,
    events_rx: Mutex<mpsc::Receiver<TunEvent>>,
    next_id: AtomicU64,
}

impl MultiTun {
    /// Creates the multiplexer and spawns its coordinator task.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration is invalid.
    pub fn new(config: MultiTunConfig) -> Result<Self> {
        config.validate()?;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (reads_tx, reads_rx) = mpsc::channel(config.queue_depth);
        let (writes_tx, writes_rx) = mpsc::channel(config.queue_depth);
        let (events_tx, events_rx) = mpsc::channel(config.queue_depth);

        let coordinator = Coordinator {
            devices: VecDeque::new(),
            read_queue: Some(reads_rx),
            write_queue: Some(writes_rx),
            parked_read: None,
            reader: None,
            writer: None,
            closers: JoinSet::new(),
            events_tx,
            control_rx,
            default_mtu: config.default_mtu,
            last_close_error: None,
        };
        tokio::spawn(coordinator.run());

        debug!(
            default_mtu = config.default_mtu,
            queue_depth = config.queue_depth,
            "Tunnel multiplexer started"
        );

        Ok(Self {
            control_tx,
            reads_tx,
            writes_tx,
            events_rx: Mutex::new(events_rx),
            next_id: AtomicU64::new(1),
        })
    }

    /// Adds a newly issued tunnel handle.
    ///
    /// The handle becomes the write target immediately. The previous write
    /// target starts draining; this call does not wait for it.
    ///
    /// # Errors
    /// Returns `Closed` after [`TunDevice::close`].
    pub fn add_device(&self, device: Arc<dyn TunDevice>) -> Result<DeviceId> {
        let id = DeviceId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.control_tx
            .send(Control::Add(id, device))
            .map_err(|_| TransportError::Closed)?;
        Ok(id)
    }

    /// Closes every current device and waits until all of them are gone.
    ///
    /// The multiplexer stays usable; a later `add_device` resumes normal
    /// operation.
    ///
    /// # Errors
    /// Returns the last close error reported by a device, or `Closed`.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Control::Shutdown).await?
    }

    /// Number of devices not yet retired.
    ///
    /// # Errors
    /// Returns `Closed` after [`TunDevice::close`].
    pub async fn device_count(&self) -> Result<usize> {
        self.request(Control::DeviceCount).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Control) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.control_tx
            .send(make(tx))
            .map_err(|_| TransportError::Closed)?;
        rx.await.map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl TunDevice for MultiTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.reads_tx
            .send(ReadRequest {
                len: buf.len(),
                reply,
            })
            .await
            .map_err(|_| TransportError::Closed)?;

        let packet = rx.await.map_err(|_| TransportError::Closed)??;
        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.writes_tx
            .send(WriteRequest {
                packet: Bytes::copy_from_slice(buf),
                reply,
            })
            .await
            .map_err(|_| TransportError::Closed)?;

        rx.await.map_err(|_| TransportError::Closed)?
    }

    async fn mtu(&self) -> Result<u16> {
        self.request(Control::Mtu).await?
    }

    async fn name(&self) -> Result<String> {
        self.request(Control::Name).await?
    }

    async fn next_event(&self) -> Option<TunEvent> {
        self.events_rx.lock().await.recv().await
    }

    async fn close(&self) -> Result<()> {
        self.request(Control::Close).await?
    }
}

impl fmt::Debug for MultiTun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiTun")
            .field("closed", &self.control_tx.is_closed())
            .field("devices_added", &(self.next_id.load(Ordering::Relaxed) - 1))
            .finish_non_exhaustive()
    }
}

// ============================================
// Device Slot
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceState {
    Active,
    Draining,
    Closed,
}

impl DeviceState {
    const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpState {
    Idle,
    Running,
    Done,
}

struct DeviceSlot {
    id: DeviceId,
    device: Arc<dyn TunDevice>,
    state: watch::Sender<DeviceState>,
    read: PumpState,
    write: PumpState,
    closing: bool,
    closed: bool,
}

impl DeviceSlot {
    fn new(id: DeviceId, device: Arc<dyn TunDevice>) -> Self {
        let (state, _) = watch::channel(DeviceState::Active);
        Self {
            id,
            device,
            state,
            read: PumpState::Idle,
            write: PumpState::Idle,
            closing: false,
            closed: false,
        }
    }

    fn is_active(&self) -> bool {
        self.state.borrow().is_active()
    }

    fn is_retired(&self) -> bool {
        self.closed && self.read != PumpState::Running && self.write != PumpState::Running
    }
}

// ============================================
// Pump Results
// ============================================

enum ReadOutcome {
    /// Device drained; the aborted request, if any, needs a new home.
    Drained(Option<ReadRequest>),
    /// Genuine read error, already reported to the caller.
    Failed,
    /// Every `MultiTun` handle is gone.
    Disconnected,
}

struct ReaderExit {
    id: DeviceId,
    queue: mpsc::Receiver<ReadRequest>,
    outcome: ReadOutcome,
}

enum WriteOutcome {
    Drained,
    Disconnected,
}

struct WriterExit {
    id: DeviceId,
    queue: mpsc::Receiver<WriteRequest>,
    outcome: WriteOutcome,
}

struct CloseReport {
    id: DeviceId,
    result: Result<()>,
}

// ============================================
// Coordinator
// ============================================

struct Coordinator {
    devices: VecDeque<DeviceSlot>,
    read_queue: Option<mpsc::Receiver<ReadRequest>>,
    write_queue: Option<mpsc::Receiver<WriteRequest>>,
    /// Read aborted by a drain while no device could take it
    parked_read: Option<ReadRequest>,
    reader: Option<JoinHandle<ReaderExit>>,
    writer: Option<JoinHandle<WriterExit>>,
    closers: JoinSet<CloseReport>,
    events_tx: mpsc::Sender<TunEvent>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    default_mtu: u16,
    last_close_error: Option<TransportError>,
}

impl Coordinator {
    async fn run(mut self) {
        loop {
            tokio::select! {
                Some(exit) = join_pump(&mut self.reader) => self.on_reader_exit(exit),
                Some(exit) = join_pump(&mut self.writer) => self.on_writer_exit(exit),
                Some(joined) = self.closers.join_next(), if !self.closers.is_empty() => {
                    if let Ok(report) = joined.map_err(reraise_panic) {
                        self.on_close_done(report);
                    }
                }
                msg = self.control_rx.recv() => match msg {
                    Some(Control::Add(id, device)) => self.add_device(id, device),
                    Some(Control::Mtu(reply)) => self.answer_mtu(reply),
                    Some(Control::Name(reply)) => self.answer_name(reply),
                    Some(Control::DeviceCount(reply)) => {
                        let _ = reply.send(self.devices.len());
                    }
                    Some(Control::Shutdown(reply)) => {
                        let result = self.teardown().await;
                        let _ = reply.send(result);
                    }
                    Some(Control::Close(reply)) => {
                        let result = self.teardown().await;
                        let _ = reply.send(result);
                        break;
                    }
                    None => {
                        let _ = self.teardown().await;
                        break;
                    }
                },
            }
        }

        // Requests that raced with close: their replies are dropped, which
        // the caller sees as `Closed`. Late devices still get closed.
        self.control_rx.close();
        while let Ok(msg) = self.control_rx.try_recv() {
            if let Control::Add(id, device) = msg {
                debug!(device_id = %id, "Closing device added after close");
                tokio::spawn(async move {
                    let _ = device.close().await;
                });
            }
        }

        info!("Tunnel multiplexer closed");
    }

    // ========================================
    // Device Management
    // ========================================

    fn add_device(&mut self, id: DeviceId, device: Arc<dyn TunDevice>) {
        if !self.devices.is_empty() {
            self.request_close(self.devices.len() - 1);
        }

        self.devices.push_back(DeviceSlot::new(id, device));
        info!(device_id = %id, devices = self.devices.len(), "Adopted tunnel device");

        self.ensure_writer();
        self.ensure_reader(None);
    }

    /// Moves a device to `Draining` and closes it unless its write pump
    /// still runs; that pump stops on the state change and the close
    /// follows its exit.
    fn request_close(&mut self, index: usize) {
        let slot = &mut self.devices[index];

        if slot.is_active() {
            slot.state.send_replace(DeviceState::Draining);
            debug!(device_id = %slot.id, "Draining tunnel device");
        }

        if slot.write != PumpState::Running {
            spawn_closer(&mut self.closers, slot);
        }
    }

    fn prune(&mut self) {
        self.devices.retain(|slot| {
            let retired = slot.is_retired();
            if retired {
                debug!(device_id = %slot.id, "Retired tunnel device");
            }
            !retired
        });
    }

    // ========================================
    // Pumps
    // ========================================

    fn ensure_reader(&mut self, carry: Option<ReadRequest>) {
        let carry = carry.or_else(|| self.parked_read.take());

        let Some(queue) = self.read_queue.take() else {
            // A reader is running; it owns the queue
            self.parked_read = carry;
            return;
        };

        let target = self
            .devices
            .iter_mut()
            .find(|slot| !slot.closed && slot.read == PumpState::Idle);

        match target {
            Some(slot) => {
                slot.read = PumpState::Running;
                debug!(device_id = %slot.id, carried = carry.is_some(), "Starting read pump");
                self.reader = Some(tokio::spawn(read_pump(
                    slot.id,
                    slot.device.clone(),
                    slot.state.subscribe(),
                    queue,
                    carry,
                )));
            }
            None => {
                self.read_queue = Some(queue);
                self.parked_read = carry;
            }
        }
    }

    fn ensure_writer(&mut self) {
        if self.writer.is_some() {
            return;
        }
        let Some(slot) = self.devices.back_mut() else {
            return;
        };
        if !slot.is_active() || slot.write != PumpState::Idle {
            return;
        }
        let Some(queue) = self.write_queue.take() else {
            return;
        };

        slot.write = PumpState::Running;
        debug!(device_id = %slot.id, "Starting write pump");
        self.writer = Some(tokio::spawn(write_pump(
            slot.id,
            slot.device.clone(),
            slot.state.subscribe(),
            queue,
            self.events_tx.clone(),
        )));
    }

    fn slot_mut(&mut self, id: DeviceId) -> Option<&mut DeviceSlot> {
        self.devices.iter_mut().find(|slot| slot.id == id)
    }

    fn on_reader_exit(&mut self, exit: ReaderExit) {
        self.read_queue = Some(exit.queue);
        if let Some(slot) = self.slot_mut(exit.id) {
            slot.read = PumpState::Done;
        }

        match exit.outcome {
            ReadOutcome::Drained(carry) => self.ensure_reader(carry),
            ReadOutcome::Failed => self.ensure_reader(None),
            ReadOutcome::Disconnected => {}
        }
        self.prune();
    }

    fn on_writer_exit(&mut self, exit: WriterExit) {
        self.write_queue = Some(exit.queue);
        if let Some(slot) = self.devices.iter_mut().find(|slot| slot.id == exit.id) {
            slot.write = PumpState::Done;
            if matches!(exit.outcome, WriteOutcome::Drained) {
                spawn_closer(&mut self.closers, slot);
            }
        }

        self.ensure_writer();
        self.prune();
    }

    fn on_close_done(&mut self, report: CloseReport) {
        if let Some(slot) = self.slot_mut(report.id) {
            slot.closed = true;
            slot.state.send_replace(DeviceState::Closed);
        }

        match report.result {
            Ok(()) => debug!(device_id = %report.id, "Closed tunnel device"),
            Err(e) => {
                warn!(device_id = %report.id, error = %e, "Tunnel device close failed");
                self.last_close_error = Some(e);
            }
        }
        self.prune();
    }

    // ========================================
    // Queries
    // ========================================

    fn answer_mtu(&self, reply: oneshot::Sender<Result<u16>>) {
        match self.devices.back() {
            Some(slot) => {
                let device = slot.device.clone();
                tokio::spawn(async move {
                    let _ = reply.send(device.mtu().await);
                });
            }
            None => {
                let _ = reply.send(Ok(self.default_mtu));
            }
        }
    }

    fn answer_name(&self, reply: oneshot::Sender<Result<String>>) {
        match self.devices.back() {
            Some(slot) => {
                let device = slot.device.clone();
                tokio::spawn(async move {
                    let _ = reply.send(device.name().await);
                });
            }
            None => {
                let _ = reply.send(Ok(String::new()));
            }
        }
    }

    // ========================================
    // Teardown
    // ========================================

    /// Drains and closes every device, then reports the last close error.
    async fn teardown(&mut self) -> Result<()> {
        info!(devices = self.devices.len(), "Shutting down tunnel devices");
        self.last_close_error = None;

        for index in 0..self.devices.len() {
            self.request_close(index);
        }

        while !self.devices.is_empty() {
            tokio::select! {
                Some(exit) = join_pump(&mut self.reader) => self.on_reader_exit(exit),
                Some(exit) = join_pump(&mut self.writer) => self.on_writer_exit(exit),
                Some(joined) = self.closers.join_next(), if !self.closers.is_empty() => {
                    if let Ok(report) = joined.map_err(reraise_panic) {
                        self.on_close_done(report);
                    }
                }
            }
        }

        if let Some(request) = self.parked_read.take() {
            let _ = request.reply.send(Ok(BytesMut::new()));
        }

        match self.last_close_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn spawn_closer(closers: &mut JoinSet<CloseReport>, slot: &mut DeviceSlot) {
    if slot.closing || slot.closed {
        return;
    }
    slot.closing = true;

    let id = slot.id;
    let device = slot.device.clone();
    closers.spawn(async move {
        let result = device.close().await;
        CloseReport { id, result }
    });
}

/// Waits for a pump to finish. Pending forever when no pump runs.
async fn join_pump<T>(handle: &mut Option<JoinHandle<T>>) -> Option<T> {
    let joined = match handle.as_mut() {
        Some(h) => h.await,
        None => std::future::pending().await,
    };
    *handle = None;
    joined.map_err(reraise_panic).ok()
}

/// Re-raises a task panic. Cancellation only happens while the runtime
/// shuts down.
fn reraise_panic(err: JoinError) {
    if err.is_panic() {
        error!("Tunnel task panicked");
        std::panic::resume_unwind(err.into_panic());
    }
    debug!("Tunnel task cancelled");
}

// ============================================
// Pump Tasks
// ============================================

/// Resolves once the device state satisfies `reached`.
async fn wait_state(state: &mut watch::Receiver<DeviceState>, reached: fn(DeviceState) -> bool) {
    loop {
        if reached(*state.borrow_and_update()) {
            return;
        }
        if state.changed().await.is_err() {
            return;
        }
    }
}

fn is_draining(state: DeviceState) -> bool {
    !state.is_active()
}

fn is_closed(state: DeviceState) -> bool {
    state == DeviceState::Closed
}

async fn read_pump(
    id: DeviceId,
    device: Arc<dyn TunDevice>,
    mut state: watch::Receiver<DeviceState>,
    mut queue: mpsc::Receiver<ReadRequest>,
    mut carry: Option<ReadRequest>,
) -> ReaderExit {
    let outcome = loop {
        let request = match carry.take() {
            Some(request) => request,
            None => tokio::select! {
                biased;
                () = wait_state(&mut state, is_closed) => break ReadOutcome::Drained(None),
                next = queue.recv() => match next {
                    Some(request) => request,
                    None => break ReadOutcome::Disconnected,
                },
            },
        };

        if request.reply.is_closed() {
            continue;
        }

        let mut buf = BytesMut::zeroed(request.len);
        match device.read(&mut buf).await {
            Ok(n) => {
                buf.truncate(n);
                let _ = request.reply.send(Ok(buf));
            }
            Err(e) if !state.borrow().is_active() => {
                debug!(device_id = %id, error = %e, "Read aborted by drain");
                break ReadOutcome::Drained(Some(request));
            }
            Err(e) => {
                warn!(device_id = %id, error = %e, "Tunnel read failed");
                let _ = request.reply.send(Err(e));
                break ReadOutcome::Failed;
            }
        }
    };

    ReaderExit { id, queue, outcome }
}

async fn write_pump(
    id: DeviceId,
    device: Arc<dyn TunDevice>,
    mut state: watch::Receiver<DeviceState>,
    mut queue: mpsc::Receiver<WriteRequest>,
    events_tx: mpsc::Sender<TunEvent>,
) -> WriterExit {
    let forwarder = tokio::spawn(forward_events(id, device.clone(), events_tx));

    let outcome = loop {
        tokio::select! {
            biased;
            () = wait_state(&mut state, is_draining) => break WriteOutcome::Drained,
            next = queue.recv() => match next {
                Some(request) => {
                    if request.reply.is_closed() {
                        continue;
                    }
                    let result = device.write(&request.packet).await;
                    if let Err(e) = &result {
                        warn!(device_id = %id, error = %e, "Tunnel write failed");
                    }
                    let _ = request.reply.send(result);
                }
                None => break WriteOutcome::Disconnected,
            },
        }
    };

    forwarder.abort();
    WriterExit { id, queue, outcome }
}

async fn forward_events(id: DeviceId, device: Arc<dyn TunDevice>, events_tx: mpsc::Sender<TunEvent>) {
    while let Some(event) = device.next_event().await {
        debug!(device_id = %id, %event, "Tunnel device event");
        if events_tx.send(event).await.is_err() {
            break;
        }
    }
}

// ============================================
// Tests
// ============================================
