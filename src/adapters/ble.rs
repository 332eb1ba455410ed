//! BLE command link.
//!
//! Implements [`CommandChannel`]: the companion device writes command
//! frames to a single characteristic and receives responses as
//! notifications on the same characteristic.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via raw `esp_idf_svc::sys` calls.
//! - **all other targets**: responses are captured in an outbox for tests.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                        | Perms        |
//! |----------------|-----------------------------|--------------|
//! | Command        | `7a1c0002-…-2e61f04d9a10`   | Write+Notify |
//!
//! Bluedroid callbacks are C function pointers that cannot capture state,
//! so the link lives in a `static` ([`BLE_LINK`]) and callbacks only push
//! [`TransportEvent`]s onto its queue.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::events::{MESSAGE_CAP, TransportEvent};
use crate::app::ports::CommandChannel;
use crate::error::ChannelError;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x7a1c0001_5d2e_4f3a_9b8c_2e61f04d9a10;
pub const CHAR_COMMAND: u128 = 0x7a1c0002_5d2e_4f3a_9b8c_2e61f04d9a10;

/// Default ATT MTU before the central negotiates a larger one.
const DEFAULT_MTU: u16 = 23;
/// ATT notification header.
const ATT_HEADER: u16 = 3;
const EVENT_DEPTH: usize = 4;

// ───────────────────────────────────────────────────────────────
// Link state
// ───────────────────────────────────────────────────────────────

/// Shared state between Bluedroid callbacks and the command loop.
pub struct BleLink {
    connected: AtomicBool,
    conn_id: AtomicU16,
    mtu: AtomicU16,
    events: Channel<CriticalSectionRawMutex, TransportEvent, EVENT_DEPTH>,
    #[cfg(not(target_os = "espidf"))]
    outbox: std::sync::Mutex<Vec<String>>,
}

/// The device's one command link.
pub static BLE_LINK: BleLink = BleLink::new();

impl BleLink {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            conn_id: AtomicU16::new(0),
            mtu: AtomicU16::new(DEFAULT_MTU),
            events: Channel::new(),
            #[cfg(not(target_os = "espidf"))]
            outbox: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn on_connect(&self, conn_id: u16) {
        self.conn_id.store(conn_id, Ordering::Relaxed);
        self.mtu.store(DEFAULT_MTU, Ordering::Relaxed);
        self.connected.store(true, Ordering::Release);
        info!("BLE: central connected (conn_id={})", conn_id);
        self.push(TransportEvent::Connected);
    }

    pub fn on_disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        info!("BLE: central disconnected");
        self.push(TransportEvent::Disconnected);
    }

    pub fn on_mtu(&self, mtu: u16) {
        self.mtu.store(mtu.max(DEFAULT_MTU), Ordering::Relaxed);
    }

    /// Queue one inbound write for the command loop.
    pub fn on_write(&self, raw: &[u8]) -> Result<(), ChannelError> {
        let text = core::str::from_utf8(raw).map_err(|_| ChannelError::InvalidUtf8)?;
        let message =
            heapless::String::<MESSAGE_CAP>::try_from(text).map_err(|_| ChannelError::TooLong)?;
        self.events
            .try_send(TransportEvent::Message(message))
            .map_err(|_| ChannelError::QueueFull)
    }

    pub fn try_next_event(&self) -> Option<TransportEvent> {
        self.events.try_receive().ok()
    }

    /// Wait for the next transport event.
    pub async fn next_event(&self) -> TransportEvent {
        self.events.receive().await
    }

    /// Largest notification payload for the current MTU.
    pub fn chunk_len(&self) -> usize {
        usize::from(self.mtu.load(Ordering::Relaxed).saturating_sub(ATT_HEADER).max(1))
    }

    fn push(&self, event: TransportEvent) {
        if self.events.try_send(event).is_err() {
            warn!("BLE: event queue full, dropping event");
        }
    }

    /// Drain the responses captured so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn take_sent(&self) -> Vec<String> {
        core::mem::take(&mut *self.outbox.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
    }

    #[cfg(target_os = "espidf")]
    fn platform_send(&self, text: &str) -> Result<(), ChannelError> {
        use esp_idf_svc::sys::*;
        let handle = BLE_CHAR_HANDLE.load(Ordering::Relaxed);
        if handle == 0 {
            return Err(ChannelError::SendFailed);
        }
        let gatts_if = BLE_GATTS_IF.load(Ordering::Relaxed);
        let conn_id = self.conn_id.load(Ordering::Relaxed);
        for chunk in text.as_bytes().chunks(self.chunk_len()) {
            // SAFETY: Bluedroid copies the buffer before returning.
            let ret = unsafe {
                esp_ble_gatts_send_indicate(
                    gatts_if as esp_gatt_if_t,
                    conn_id,
                    handle,
                    chunk.len() as u16,
                    chunk.as_ptr().cast_mut(),
                    false,
                )
            };
            if ret != ESP_OK as esp_err_t {
                warn!("BLE: notify failed ({})", ret);
                return Err(ChannelError::SendFailed);
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_send(&self, text: &str) -> Result<(), ChannelError> {
        self.outbox
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text.to_owned());
        Ok(())
    }
}

impl Default for BleLink {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for BleLink {
    fn send(&self, text: &str) -> Result<(), ChannelError> {
        if !self.has_peer() {
            return Err(ChannelError::NoPeer);
        }
        self.platform_send(text)
    }

    fn has_peer(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF Bluedroid bring-up
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: core::sync::atomic::AtomicU8 = core::sync::atomic::AtomicU8::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU16 = AtomicU16::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_HANDLE: AtomicU16 = AtomicU16::new(0);

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    unsafe { esp_ble_gap_start_advertising(&mut adv_params) };
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            BLE_GATTS_IF.store(gatts_if, Ordering::Relaxed);
            info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t { uuid: uuid128_to_esp(SERVICE_UUID), inst_id: 0 },
                is_primary: true,
            };
            // Service, characteristic declaration, value and CCCD.
            unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 4) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(svc_handle, Ordering::Relaxed);
            info!("BLE GATTS: service created (handle={})", svc_handle);
            let mut char_uuid = uuid128_to_esp(CHAR_COMMAND);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                esp_ble_gatts_add_char(
                    svc_handle,
                    &mut char_uuid,
                    (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                    (ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_NOTIFY)
                        as esp_gatt_char_prop_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            BLE_CHAR_HANDLE.store(handle, Ordering::Relaxed);
            info!("BLE GATTS: command char (handle={})", handle);
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let conn_id = unsafe { (*param).connect.conn_id };
            BLE_LINK.on_connect(conn_id);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_LINK.on_disconnect();
            unsafe { start_advertising() };
        }
        esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
            BLE_LINK.on_mtu(unsafe { (*param).mtu.mtu });
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            if p.handle != BLE_CHAR_HANDLE.load(Ordering::Relaxed) {
                return;
            }
            let data = unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) };
            if let Err(e) = BLE_LINK.on_write(data) {
                warn!("BLE GATTS: write dropped: {}", e);
            }
        }
        _ => {}
    }
}

/// Bring up the Bluedroid stack and start advertising as `device_name`.
#[cfg(target_os = "espidf")]
pub fn start(device_name: &str) -> Result<(), ChannelError> {
    use esp_idf_svc::sys::*;

    fn check(step: &str, ret: esp_err_t) -> Result<(), ChannelError> {
        if ret != ESP_OK as esp_err_t {
            log::error!("BLE: {} failed ({})", step, ret);
            return Err(ChannelError::Init);
        }
        Ok(())
    }

    let name = std::ffi::CString::new(device_name).map_err(|_| ChannelError::Init)?;
    unsafe {
        // Release classic BT memory (BLE-only mode saves ~30 KB).
        esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

        let mut bt_cfg = esp_bt_controller_config_t::default();
        check("bt_controller_init", esp_bt_controller_init(&mut bt_cfg))?;
        check("bt_controller_enable", esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE))?;
        check("bluedroid_init", esp_bluedroid_init())?;
        check("bluedroid_enable", esp_bluedroid_enable())?;

        esp_ble_gap_register_callback(Some(ble_gap_event_handler));
        esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
        esp_ble_gatts_app_register(0);
        esp_ble_gap_set_device_name(name.as_ptr());
        start_advertising();
    }
    info!("BLE(espidf): advertising as '{}'", device_name);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn start(device_name: &str) -> Result<(), ChannelError> {
    info!("BLE(sim): advertising '{}' (service {:032x})", device_name, SERVICE_UUID);
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
