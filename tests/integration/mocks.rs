//! Shared mocks for the integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fieldstation::adapters::nvs::NvsAdapter;
use fieldstation::app::dispatcher::CommandDispatcher;
use fieldstation::app::ports::{ClockPort, CommandChannel, PeripheralPort, ScanPort};
use fieldstation::app::store::ConfigStore;
use fieldstation::config::StationConfig;
use fieldstation::error::{ChannelError, NetworkError};
use fieldstation::scan::NetworkInfo;

// ── Command channel ───────────────────────────────────────────

/// Records every response; the peer can be dropped mid-test.
pub struct Outbox {
    peer: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self { peer: AtomicBool::new(true), sent: Mutex::new(Vec::new()) }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_peer(&self, present: bool) {
        self.peer.store(present, Ordering::SeqCst);
    }
}

impl CommandChannel for Outbox {
    fn send(&self, text: &str) -> Result<(), ChannelError> {
        if !self.has_peer() {
            return Err(ChannelError::NoPeer);
        }
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    fn has_peer(&self) -> bool {
        self.peer.load(Ordering::SeqCst)
    }
}

// ── Network ───────────────────────────────────────────────────

/// Scan results and a log of every reinitialisation.
#[derive(Default)]
pub struct MockNetwork {
    pub visible: Vec<NetworkInfo>,
    pub reinits: Vec<StationConfig>,
}

impl ScanPort for MockNetwork {
    fn scan(&mut self) -> Result<Vec<NetworkInfo>, NetworkError> {
        Ok(self.visible.clone())
    }
}

impl PeripheralPort for MockNetwork {
    fn reinitialize(&mut self, config: &StationConfig) {
        self.reinits.push(config.clone());
    }
}

// ── Clock ─────────────────────────────────────────────────────

pub struct FixedClock(pub i64);

impl ClockPort for FixedClock {
    fn epoch_secs(&self) -> i64 {
        self.0
    }
}

// ── Assembled station ─────────────────────────────────────────

pub type Dispatcher = CommandDispatcher<NvsAdapter, Outbox, MockNetwork>;

pub struct Station {
    pub store: Arc<ConfigStore<NvsAdapter>>,
    pub outbox: Arc<Outbox>,
    pub network: Arc<Mutex<MockNetwork>>,
    pub dispatcher: Dispatcher,
}

impl Station {
    pub fn new() -> Self {
        Self::with_storage(NvsAdapter::new())
    }

    pub fn with_storage(nvs: NvsAdapter) -> Self {
        let store = Arc::new(ConfigStore::new(nvs));
        let outbox = Arc::new(Outbox::new());
        let network = Arc::new(Mutex::new(MockNetwork::default()));
        let dispatcher =
            CommandDispatcher::new(Arc::clone(&store), Arc::clone(&outbox), Arc::clone(&network));
        Self { store, outbox, network, dispatcher }
    }

    /// Boot a fresh station on a copy of this one's storage.
    pub fn reboot(&self) -> Self {
        let station = Self::with_storage(self.store.with_storage(|nvs| nvs.clone()));
        let _ = station.store.load();
        station
    }
}
