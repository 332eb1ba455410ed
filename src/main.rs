//! Field station firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter    WifiAdapter    BleLink        RadioAdapter      │
//! │  (Storage)     (Net+Scan)     (Commands)     (SX1276 on SPI2)  │
//! │  HttpAdapter   WallClock                                       │
//! │  (Backend)     (SNTP time)                                     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ConfigStore · CommandDispatcher · ReadingSlot · Uploader      │
//! └────────────────────────────────────────────────────────────────┘
//!
//!   [radio-rx]  App core   LoRa packet → ReadingSlot
//!   [upload]    App core   ReadingSlot → HTTP POST
//!   [command]   Pro core   BLE frames  → dispatcher
//!   [wifi-scan] App core   one-shot, per `02` command
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use fieldstation::adapters::ble::{self, BLE_LINK};
use fieldstation::adapters::http::HttpAdapter;
use fieldstation::adapters::nvs::NvsAdapter;
use fieldstation::adapters::radio::{LoraPins, RadioAdapter};
use fieldstation::adapters::time::{WallClock, start_sntp};
use fieldstation::adapters::wifi::WifiAdapter;
use fieldstation::app::dispatcher::CommandDispatcher;
use fieldstation::app::store::ConfigStore;
use fieldstation::config::{LORA_FREQUENCY_HZ, TaskTimings};
use fieldstation::reading::slot::ReadingSlot;
use fieldstation::reading::uploader::Uploader;
use fieldstation::tasks;

/// Name advertised to the companion app.
const DEVICE_NAME: &str = "FieldStation";

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  FieldStation v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let timings = TaskTimings::default();

    // ── 2. Load config from NVS ───────────────────────────────
    let nvs = NvsAdapter::init().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let store = Arc::new(ConfigStore::new(nvs));
    if let Err(e) = store.load() {
        warn!("Config: {} (waiting for provisioning)", e);
    }
    let config = store.snapshot();

    // ── 3. WiFi ───────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None)?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sysloop)?);

    if config.wifi_ssid.is_empty() {
        info!("WiFi: not provisioned, staying offline");
    } else if let Err(e) = wifi.set_credentials(&config.wifi_ssid, &config.wifi_pass) {
        warn!("WiFi: stored credentials rejected: {}", e);
    } else if let Err(e) = wifi.connect_at_boot(&timings) {
        warn!("WiFi: boot connect failed ({}), retrying in background", e);
    }
    let network = Arc::new(Mutex::new(wifi));

    // ── 4. Time and BLE ───────────────────────────────────────
    let _sntp = match start_sntp() {
        Ok(sntp) => Some(sntp),
        Err(e) => {
            warn!("Clock: SNTP unavailable ({})", e);
            None
        }
    };
    ble::start(DEVICE_NAME).map_err(|e| anyhow::anyhow!("BLE start failed: {e}"))?;

    // ── 5. LoRa ───────────────────────────────────────────────
    let pins = peripherals.pins;
    let lora_pins = LoraPins {
        sclk: pins.gpio5,
        mosi: pins.gpio27,
        miso: pins.gpio19,
        cs: pins.gpio18,
        reset: pins.gpio14,
    };
    let radio = RadioAdapter::open(peripherals.spi2, lora_pins, LORA_FREQUENCY_HZ)
        .map_err(|e| anyhow::anyhow!("LoRa init failed: {e}"))?;

    // ── 6. Tasks ──────────────────────────────────────────────
    let slot = Arc::new(ReadingSlot::new());

    let receive = tasks::spawn_receive(radio, Arc::clone(&slot), timings.clone())?;
    let uploader = Uploader::new(HttpAdapter::new(timings.http_timeout_ms), WallClock::new());
    tasks::spawn_upload(uploader, slot, Arc::clone(&store), Arc::clone(&network), timings.clone())?;

    let dispatcher = CommandDispatcher::new(store, Arc::new(&BLE_LINK), network);
    tasks::spawn_command(dispatcher, &BLE_LINK, timings)?;

    info!("Station running");
    // The task loops never return.
    let _ = receive.join();
    Ok(())
}
