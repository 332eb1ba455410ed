//! Integration tests for the spawned command task.
//!
//! The task runs its real executor loop on its own thread; frames go in
//! through a `BleLink` and responses come back through the outbox.

use std::time::{Duration, Instant};

use fieldstation::adapters::ble::BleLink;
use fieldstation::app::dispatcher::ACK;
use fieldstation::config::TaskTimings;
use fieldstation::tasks::spawn_command;

use crate::mocks::Station;

const RECORD: &[u8] = br#"01:{"wifi_ssid":"Home%20Net","wifi_pass":"hunter22","api_url":"http://example.test/readings"}"#;

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn fast() -> TaskTimings {
    TaskTimings { command_poll_ms: 10, ..TaskTimings::default() }
}

#[test]
fn command_task_applies_record_and_answers_read_back() {
    static LINK: BleLink = BleLink::new();
    let Station { store, outbox, dispatcher, .. } = Station::new();
    let _task = spawn_command(dispatcher, &LINK, fast()).unwrap();

    LINK.on_connect(1);
    LINK.on_write(RECORD).unwrap();
    wait_until("config applied", || store.snapshot().wifi_ssid == "Home Net");
    assert_eq!(outbox.sent(), vec![ACK.to_owned()]);

    LINK.on_write(b"09").unwrap();
    wait_until("config read back", || outbox.sent().len() == 3);

    let sent = outbox.sent();
    assert_eq!(sent[1], ACK);
    assert_eq!(sent[2], store.encode());
    assert!(sent[2].contains(r#""wifi_ssid":"Home%20Net""#));
}

#[test]
fn command_task_keeps_running_after_unknown_opcode() {
    static LINK: BleLink = BleLink::new();
    let Station { store, outbox, dispatcher, .. } = Station::new();
    let _task = spawn_command(dispatcher, &LINK, fast()).unwrap();

    LINK.on_connect(1);
    LINK.on_write(b"77:whatever").unwrap();
    // Two dispatch periods: the unknown frame is consumed without a reply.
    std::thread::sleep(Duration::from_millis(50));
    assert!(outbox.sent().is_empty());

    LINK.on_write(RECORD).unwrap();
    wait_until("config applied", || store.is_loaded());
    assert_eq!(outbox.sent(), vec![ACK.to_owned()]);
}
