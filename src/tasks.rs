//! Long-lived station tasks.
//!
//! ```text
//!   SX1276 (SPI) ─▶ [radio-rx] ─▶ ReadingSlot ─▶ [upload] ─▶ backend
//!   BLE central ─▶ BLE_LINK events ─▶ [command] ─▶ CommandDispatcher ─▶ store / WiFi / scan
//! ```
//!
//! Each `*_once` function is one pass of its task and is what the tests
//! drive; the `*_loop` functions only add cadence around it.

use core::cell::RefCell;
use core::time::Duration;
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::adapters::ble::BleLink;
use crate::adapters::radio::RAW_PACKET_CAP;
use crate::app::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::app::events::TransportEvent;
use crate::app::ports::{
    ClockPort, CommandChannel, HttpPort, NetworkPort, PeripheralPort, RadioPort, ScanPort,
    StoragePort,
};
use crate::app::store::ConfigStore;
use crate::config::TaskTimings;
use crate::drivers::task_pin::{COMMAND_TASK, RECEIVE_TASK, UPLOAD_TASK, spawn_task};
use crate::error::PacketError;
use crate::reading::Reading;
use crate::reading::slot::{Publish, ReadingSlot};
use crate::reading::uploader::{UploadOutcome, Uploader};

fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

// ── Receive ──────────────────────────────────────────────────

/// Drain one packet from the radio into the slot.
///
/// `None` when no packet was waiting.
pub fn receive_once<R: RadioPort>(
    radio: &mut R,
    slot: &ReadingSlot,
) -> Option<Result<Publish, PacketError>> {
    let mut buf = [0u8; RAW_PACKET_CAP];
    let n = radio.poll_packet(&mut buf)?;
    if n > buf.len() {
        warn!("LoRa: {}-byte packet truncated, dropped", n);
        return Some(Err(PacketError::TooLong));
    }

    let reading = match Reading::parse(&buf[..n]) {
        Ok(reading) => reading,
        Err(e) => {
            warn!("LoRa: packet rejected: {}", e);
            return Some(Err(e));
        }
    };
    match reading.temperature() {
        Some(temp) => info!("LoRa: {} bytes, reading {} (temp {})", n, reading.value(), temp),
        None => info!("LoRa: {} bytes, reading {}", n, reading.value()),
    }

    let publish = slot.publish(reading);
    if publish == Publish::Superseded {
        debug!("LoRa: unsent reading replaced");
    }
    Some(Ok(publish))
}

/// Poll the radio forever.
pub fn receive_loop<R: RadioPort>(mut radio: R, slot: &ReadingSlot, timings: &TaskTimings) -> ! {
    let period = millis(timings.radio_poll_ms);
    loop {
        // Drain everything queued since the last tick.
        while receive_once(&mut radio, slot).is_some() {}
        std::thread::sleep(period);
    }
}

// ── Upload ───────────────────────────────────────────────────

/// Keep the network up, then upload the pending reading if there is one.
pub fn upload_once<S, H, K, N>(
    uploader: &mut Uploader<H, K>,
    slot: &ReadingSlot,
    store: &ConfigStore<S>,
    network: &Mutex<N>,
) -> UploadOutcome
where
    S: StoragePort,
    H: HttpPort,
    K: ClockPort,
    N: NetworkPort + ?Sized,
{
    let connected = {
        let mut net = network.lock().unwrap_or_else(PoisonError::into_inner);
        net.maintain();
        net.is_connected()
    };
    let config = store.snapshot();
    uploader.upload_pending(slot, &config, connected)
}

/// Wait for readings and upload them forever.
pub fn upload_loop<S, H, K, N>(
    mut uploader: Uploader<H, K>,
    slot: &ReadingSlot,
    store: &ConfigStore<S>,
    network: &Mutex<N>,
    timings: &TaskTimings,
) -> !
where
    S: StoragePort,
    H: HttpPort,
    K: ClockPort,
    N: NetworkPort + ?Sized,
{
    let period = millis(timings.upload_poll_ms);
    loop {
        slot.wait_for_data(period);
        if upload_once(&mut uploader, slot, store, network) == UploadOutcome::Offline {
            debug!("Upload: network down, reading kept");
            std::thread::sleep(period);
        }
    }
}

// ── Commands ─────────────────────────────────────────────────

/// Feed one transport event to the dispatcher.
pub fn handle_event<S, C, N>(dispatcher: &mut CommandDispatcher<S, C, N>, event: TransportEvent)
where
    S: StoragePort,
    C: CommandChannel + Send + Sync + 'static,
    N: ScanPort + PeripheralPort + Send + 'static,
{
    match event {
        TransportEvent::Connected => info!("CMD: companion connected"),
        TransportEvent::Disconnected => info!("CMD: companion disconnected"),
        TransportEvent::Message(text) => {
            if !dispatcher.submit(&text) {
                debug!("CMD: blank message ignored");
            }
        }
    }
}

/// Drain every queued event from `link`, then run one dispatch.
pub fn command_once<S, C, N>(
    dispatcher: &mut CommandDispatcher<S, C, N>,
    link: &BleLink,
) -> DispatchOutcome
where
    S: StoragePort,
    C: CommandChannel + Send + Sync + 'static,
    N: ScanPort + PeripheralPort + Send + 'static,
{
    while let Some(event) = link.try_next_event() {
        handle_event(dispatcher, event);
    }
    dispatcher.poll()
}

type SharedDispatcher<S, C, N> = Rc<RefCell<CommandDispatcher<S, C, N>>>;

/// Wakes on every transport event.
async fn event_loop<S, C, N>(dispatcher: SharedDispatcher<S, C, N>, link: &'static BleLink)
where
    S: StoragePort,
    C: CommandChannel + Send + Sync + 'static,
    N: ScanPort + PeripheralPort + Send + 'static,
{
    loop {
        let event = link.next_event().await;
        handle_event(&mut *dispatcher.borrow_mut(), event);
    }
}

/// Runs the pending frame on the dispatcher's cadence.
async fn dispatch_loop<S, C, N>(dispatcher: SharedDispatcher<S, C, N>, period: Duration)
where
    S: StoragePort,
    C: CommandChannel + Send + Sync + 'static,
    N: ScanPort + PeripheralPort + Send + 'static,
{
    loop {
        let outcome = dispatcher.borrow_mut().poll();
        if !matches!(outcome, DispatchOutcome::Idle) {
            debug!("CMD: {:?}", outcome);
        }
        async_io_mini::Timer::after(period).await;
    }
}

/// Drive the command dispatcher from `link` forever.
pub fn run_command_loop<S, C, N>(
    dispatcher: CommandDispatcher<S, C, N>,
    link: &'static BleLink,
    timings: &TaskTimings,
) where
    S: StoragePort + 'static,
    C: CommandChannel + Send + Sync + 'static,
    N: ScanPort + PeripheralPort + Send + 'static,
{
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    let dispatcher = Rc::new(RefCell::new(dispatcher));

    executor.spawn(event_loop(dispatcher.clone(), link)).detach();
    executor
        .spawn(dispatch_loop(dispatcher, millis(timings.command_poll_ms)))
        .detach();

    info!("CMD: command loop started ({} ms cadence)", timings.command_poll_ms);
    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

// ── Spawning ─────────────────────────────────────────────────

pub fn spawn_receive<R>(radio: R, slot: Arc<ReadingSlot>, timings: TaskTimings) -> io::Result<JoinHandle<()>>
where
    R: RadioPort + Send + 'static,
{
    spawn_task(RECEIVE_TASK, move || receive_loop(radio, &*slot, &timings))
}

pub fn spawn_upload<S, H, K, N>(
    uploader: Uploader<H, K>,
    slot: Arc<ReadingSlot>,
    store: Arc<ConfigStore<S>>,
    network: Arc<Mutex<N>>,
    timings: TaskTimings,
) -> io::Result<JoinHandle<()>>
where
    S: StoragePort + Send + 'static,
    H: HttpPort + Send + 'static,
    K: ClockPort + Send + 'static,
    N: NetworkPort + Send + 'static,
{
    spawn_task(UPLOAD_TASK, move || upload_loop(uploader, &*slot, &*store, &*network, &timings))
}

pub fn spawn_command<S, C, N>(
    dispatcher: CommandDispatcher<S, C, N>,
    link: &'static BleLink,
    timings: TaskTimings,
) -> io::Result<JoinHandle<()>>
where
    S: StoragePort + Send + 'static,
    C: CommandChannel + Send + Sync + 'static,
    N: ScanPort + PeripheralPort + Send + 'static,
{
    spawn_task(COMMAND_TASK, move || run_command_loop(dispatcher, link, &timings))
}
