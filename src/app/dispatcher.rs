//! Command dispatcher.
//!
//! Holds at most one decoded [`CommandFrame`] and runs it on the next
//! [`poll`](CommandDispatcher::poll).  Each poll consumes the frame before
//! acting on it, so a frame runs exactly once whatever the outcome.
//!
//! | opcode | action                                   | response        |
//! |--------|------------------------------------------|-----------------|
//! | `01`   | decode, persist, apply, re-init network  | ack             |
//! | `02`   | spawn a one-shot network scan            | ack, then scan  |
//! | `08`   | erase storage, re-init network           | ack             |
//! | `09`   | none                                     | ack, then config|
//! | other  | none                                     | none            |

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::error::{Error, StoreError};
use crate::scan;

use super::commands::{CommandFrame, Opcode};
use super::ports::{CommandChannel, PeripheralPort, ScanPort, StoragePort};
use super::store::ConfigStore;

/// Acknowledgement sent before any recognized opcode runs.
pub const ACK: &str = "ACK";

/// What a single [`CommandDispatcher::poll`] did.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// No frame was pending.
    Idle,
    /// `01`: new config persisted and live.
    ConfigApplied,
    /// `01`: record rejected; the previous config stays active.
    ConfigRejected(Error),
    /// `01` without a value.
    ConfigSkipped,
    /// `02`: scan running on its own thread.
    ScanStarted(JoinHandle<()>),
    /// `02`: the scan thread could not be created.
    ScanFailed,
    /// `08`: storage erased.
    Cleared,
    /// `08`: erase failed; nothing changed.
    ClearFailed(StoreError),
    /// `09`: config sent to the peer.
    ConfigSent,
    /// Unrecognized opcode; nothing done.
    Ignored,
}

pub struct CommandDispatcher<S, C, N> {
    store: Arc<ConfigStore<S>>,
    channel: Arc<C>,
    network: Arc<Mutex<N>>,
    pending: Option<CommandFrame>,
}

impl<S, C, N> CommandDispatcher<S, C, N>
where
    S: StoragePort,
    C: CommandChannel + Send + Sync + 'static,
    N: ScanPort + PeripheralPort + Send + 'static,
{
    pub fn new(store: Arc<ConfigStore<S>>, channel: Arc<C>, network: Arc<Mutex<N>>) -> Self {
        Self { store, channel, network, pending: None }
    }

    /// Decode `raw` and hold it for the next poll.
    ///
    /// Returns `false` for a message that decodes to no frame.  A frame
    /// that is still pending is replaced.
    pub fn submit(&mut self, raw: &str) -> bool {
        let Some(frame) = CommandFrame::decode(raw) else {
            return false;
        };
        if let Some(old) = self.pending.replace(frame) {
            debug!("CMD: frame '{}' replaced before dispatch", old.code());
        }
        true
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Run the pending frame, if any.
    pub fn poll(&mut self) -> DispatchOutcome {
        let Some(frame) = self.pending.take() else {
            return DispatchOutcome::Idle;
        };

        let Some(opcode) = frame.opcode() else {
            debug!("CMD: ignoring opcode '{}'", frame.code());
            return DispatchOutcome::Ignored;
        };

        info!("CMD: {}", opcode);
        self.respond(ACK);

        match opcode {
            Opcode::WriteConfig => self.write_config(frame.value()),
            Opcode::Scan => {
                match scan::spawn(Arc::clone(&self.network), Arc::clone(&self.channel)) {
                    Ok(handle) => DispatchOutcome::ScanStarted(handle),
                    Err(e) => {
                        warn!("CMD: scan task not started: {}", e);
                        DispatchOutcome::ScanFailed
                    }
                }
            }
            Opcode::ClearConfig => self.clear_config(),
            Opcode::ReadConfig => {
                self.respond(&self.store.encode());
                DispatchOutcome::ConfigSent
            }
        }
    }

    fn write_config(&self, value: Option<&str>) -> DispatchOutcome {
        let Some(text) = value.filter(|v| !v.is_empty()) else {
            warn!("CMD: config write without a record");
            return DispatchOutcome::ConfigSkipped;
        };
        match self.store.apply(text) {
            Ok(config) => {
                self.reinitialize(&config);
                DispatchOutcome::ConfigApplied
            }
            Err(e) => {
                warn!("CMD: config rejected: {}", e);
                DispatchOutcome::ConfigRejected(e)
            }
        }
    }

    fn clear_config(&self) -> DispatchOutcome {
        match self.store.clear() {
            Ok(()) => {
                self.reinitialize(&self.store.snapshot());
                DispatchOutcome::Cleared
            }
            Err(e) => {
                warn!("CMD: config erase failed: {}", e);
                DispatchOutcome::ClearFailed(e)
            }
        }
    }

    fn reinitialize(&self, config: &crate::config::StationConfig) {
        self.network
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reinitialize(config);
    }

    fn respond(&self, text: &str) {
        if let Err(e) = self.channel.send(text) {
            warn!("CMD: response not delivered: {}", e);
        }
    }
}
