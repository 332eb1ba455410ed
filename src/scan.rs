//! Network scanner.
//!
//! A scan is a one-shot task: enumerate visible access points, serialize
//! them under a single `"networks"` key with the same space escaping the
//! config record uses, and send the result to whoever asked, provided
//! that peer is still connected.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{CommandChannel, ScanPort};
use crate::config::escape_spaces;
use crate::drivers::task_pin::{SCAN_TASK, spawn_task};

/// Security of an access point as reported to the companion device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EncryptionKind {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "WEP")]
    Wep,
    #[serde(rename = "WPA-PSK")]
    WpaPsk,
    #[serde(rename = "WPA2-PSK")]
    Wpa2Psk,
    #[serde(rename = "WPA/WPA2-PSK")]
    WpaWpa2Psk,
    #[serde(rename = "WPA2-Enterprise")]
    Wpa2Enterprise,
    #[serde(rename = "WPA3-PSK")]
    Wpa3Psk,
    #[serde(rename = "WPA2/WPA3-PSK")]
    Wpa2Wpa3Psk,
    #[serde(rename = "WAPI-PSK")]
    WapiPsk,
    #[serde(rename = "unknown")]
    Unknown,
}

/// One visible access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub ssid: String,
    /// Signal strength in dBm.
    pub rssi: i8,
    pub encryption: EncryptionKind,
}

#[derive(Serialize)]
struct ScanReport<'a> {
    networks: &'a [NetworkInfo],
}

/// Serialize a scan result into a transport-safe frame.
pub fn encode_report(networks: &[NetworkInfo]) -> String {
    let json = serde_json::to_string(&ScanReport { networks }).unwrap_or_default();
    escape_spaces(&json)
}

/// What a single scan pass ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Result delivered; carries the number of networks reported.
    Sent(usize),
    /// The requesting peer left before the result was ready.
    NoPeer,
    /// The transport refused the result.
    SendFailed,
}

/// Run one scan pass and deliver the result over `channel`.
///
/// A failed scan is reported as an empty list so the companion device
/// always gets an answer.
pub fn run_once<N, C>(scanner: &Mutex<N>, channel: &C) -> ScanOutcome
where
    N: ScanPort + ?Sized,
    C: CommandChannel + ?Sized,
{
    let networks = {
        let mut radio = scanner.lock().unwrap_or_else(PoisonError::into_inner);
        radio.scan().unwrap_or_else(|e| {
            warn!("Scan: {}", e);
            Vec::new()
        })
    };
    info!("Scan: {} networks visible", networks.len());

    if !channel.has_peer() {
        info!("Scan: peer gone, result dropped");
        return ScanOutcome::NoPeer;
    }

    let frame = encode_report(&networks);
    match channel.send(&frame) {
        Ok(()) => ScanOutcome::Sent(networks.len()),
        Err(e) => {
            warn!("Scan: result not delivered: {}", e);
            ScanOutcome::SendFailed
        }
    }
}

/// Run [`run_once`] on its own thread.
pub fn spawn<N, C>(scanner: Arc<Mutex<N>>, channel: Arc<C>) -> io::Result<JoinHandle<()>>
where
    N: ScanPort + Send + 'static,
    C: CommandChannel + Send + Sync + 'static,
{
    spawn_task(SCAN_TASK, move || {
        let _ = run_once(&*scanner, &*channel);
    })
}
