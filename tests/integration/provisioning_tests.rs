//! Integration tests for the companion-device command flow.
//!
//! Frames enter through a `BleLink` exactly as the GATT write handler
//! delivers them and are dispatched by `tasks::command_once`.

use fieldstation::adapters::ble::BleLink;
use fieldstation::app::dispatcher::{ACK, DispatchOutcome};
use fieldstation::config::StationConfig;
use fieldstation::error::{ChannelError, Error, StoreError};
use fieldstation::scan::{EncryptionKind, NetworkInfo};
use fieldstation::tasks::command_once;

use crate::mocks::Station;

const HOME_RECORD: &[u8] =
    br#"01:{"wifi_ssid":"Home%20Net","wifi_pass":"hunter22","api_url":"http://example.test/readings","user_email":"ops@example.test","user_pass":"pw"}"#;

// ── 01: write config ──────────────────────────────────────────

#[test]
fn write_config_persists_across_reboot() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_connect(1);
    LINK.on_write(HOME_RECORD).unwrap();
    assert!(matches!(
        command_once(&mut station.dispatcher, &LINK),
        DispatchOutcome::ConfigApplied
    ));
    assert_eq!(station.outbox.sent(), vec![ACK.to_owned()]);

    let live = station.store.snapshot();
    assert!(live.loaded);
    assert_eq!(live.wifi_ssid, "Home Net");

    let rebooted = station.reboot();
    let stored = rebooted.store.snapshot();
    assert!(stored.loaded);
    assert_eq!(stored.wifi_ssid, "Home Net");
    assert_eq!(stored.wifi_pass, "hunter22");
    assert_eq!(stored.api_url, "http://example.test/readings");
}

#[test]
fn write_config_reinitializes_network_with_new_values() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_write(HOME_RECORD).unwrap();
    command_once(&mut station.dispatcher, &LINK);

    let reinits = &station.network.lock().unwrap().reinits;
    assert_eq!(reinits.len(), 1);
    assert_eq!(reinits[0].wifi_ssid, "Home Net");
}

#[test]
fn rejected_record_keeps_last_known_good() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_write(HOME_RECORD).unwrap();
    command_once(&mut station.dispatcher, &LINK);
    LINK.on_write(b"01:{not json").unwrap();
    assert!(matches!(
        command_once(&mut station.dispatcher, &LINK),
        DispatchOutcome::ConfigRejected(Error::Decode(_))
    ));

    assert_eq!(station.store.snapshot().wifi_ssid, "Home Net");
    assert_eq!(station.reboot().store.snapshot().wifi_ssid, "Home Net");
    assert_eq!(station.network.lock().unwrap().reinits.len(), 1);
}

#[test]
fn partial_record_updates_only_named_fields() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_write(HOME_RECORD).unwrap();
    command_once(&mut station.dispatcher, &LINK);
    LINK.on_write(br#"01:{"api_url":"http://other.test/in","extra":1}"#).unwrap();
    command_once(&mut station.dispatcher, &LINK);

    let c = station.reboot().store.snapshot();
    assert_eq!(c.api_url, "http://other.test/in");
    assert_eq!(c.wifi_ssid, "Home Net");
}

// ── 09: read config ───────────────────────────────────────────

#[test]
fn read_config_on_fresh_station_sends_empty_record() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_write(b"09").unwrap();
    assert!(matches!(command_once(&mut station.dispatcher, &LINK), DispatchOutcome::ConfigSent));
    assert_eq!(
        station.outbox.sent(),
        vec![
            ACK.to_owned(),
            r#"{"wifi_ssid":"","wifi_pass":"","api_url":"","user_email":"","user_pass":""}"#
                .to_owned(),
        ]
    );
}

#[test]
fn read_config_escapes_spaces() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_write(HOME_RECORD).unwrap();
    command_once(&mut station.dispatcher, &LINK);
    LINK.on_write(b"09").unwrap();
    command_once(&mut station.dispatcher, &LINK);

    let sent = station.outbox.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[2].contains(r#""wifi_ssid":"Home%20Net""#));
    assert!(!sent[2].contains(' '));

    let mut decoded = StationConfig::new();
    decoded.decode(&sent[2]).unwrap();
    assert_eq!(decoded.wifi_ssid, "Home Net");
}

// ── 08: clear config ──────────────────────────────────────────

#[test]
fn clear_erases_storage_and_memory() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_write(HOME_RECORD).unwrap();
    command_once(&mut station.dispatcher, &LINK);
    LINK.on_write(b"08").unwrap();
    assert!(matches!(command_once(&mut station.dispatcher, &LINK), DispatchOutcome::Cleared));

    let live = station.store.snapshot();
    assert!(!live.loaded);
    assert!(live.wifi_ssid.is_empty());

    let rebooted = station.reboot();
    assert_eq!(rebooted.store.load(), Err(StoreError::NotFound));
    assert!(!rebooted.store.is_loaded());

    let reinits = &station.network.lock().unwrap().reinits;
    assert_eq!(reinits.last().map(|c| c.wifi_ssid.as_str()), Some(""));
}

// ── Unknown and malformed input ───────────────────────────────

#[test]
fn unknown_opcode_gets_no_response() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_write(b"99:anything").unwrap();
    assert!(matches!(command_once(&mut station.dispatcher, &LINK), DispatchOutcome::Ignored));
    assert!(station.outbox.sent().is_empty());
    assert!(station.dispatcher.is_idle());
}

#[test]
fn connection_events_alone_dispatch_nothing() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();

    LINK.on_connect(3);
    LINK.on_disconnect();
    assert!(matches!(command_once(&mut station.dispatcher, &LINK), DispatchOutcome::Idle));
    assert!(station.outbox.sent().is_empty());
}

#[test]
fn oversized_write_is_refused_by_link() {
    static LINK: BleLink = BleLink::new();
    let big = vec![b'x'; 600];
    assert_eq!(LINK.on_write(&big), Err(ChannelError::TooLong));
    assert!(LINK.try_next_event().is_none());
}

// ── 02: scan ──────────────────────────────────────────────────

fn visible() -> Vec<NetworkInfo> {
    vec![
        NetworkInfo { ssid: "Home Net".into(), rssi: -48, encryption: EncryptionKind::Wpa2Psk },
        NetworkInfo { ssid: "Guest".into(), rssi: -80, encryption: EncryptionKind::Open },
    ]
}

#[test]
fn scan_acks_then_reports_networks() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();
    station.network.lock().unwrap().visible = visible();

    LINK.on_write(b"02").unwrap();
    let DispatchOutcome::ScanStarted(handle) = command_once(&mut station.dispatcher, &LINK) else {
        panic!("scan not started");
    };
    handle.join().unwrap();

    let sent = station.outbox.sent();
    assert_eq!(sent[0], ACK);
    assert_eq!(
        sent[1],
        r#"{"networks":[{"ssid":"Home%20Net","rssi":-48,"encryption":"WPA2-PSK"},{"ssid":"Guest","rssi":-80,"encryption":"open"}]}"#
    );
}

#[test]
fn scan_result_dropped_when_peer_leaves() {
    static LINK: BleLink = BleLink::new();
    let mut station = Station::new();
    station.network.lock().unwrap().visible = visible();

    // Hold the radio so the scan cannot finish before the peer leaves.
    let radio = station.network.lock().unwrap();
    LINK.on_write(b"02").unwrap();
    let DispatchOutcome::ScanStarted(handle) = command_once(&mut station.dispatcher, &LINK) else {
        panic!("scan not started");
    };
    station.outbox.set_peer(false);
    drop(radio);
    handle.join().unwrap();

    assert_eq!(station.outbox.sent(), vec![ACK.to_owned()]);
}
