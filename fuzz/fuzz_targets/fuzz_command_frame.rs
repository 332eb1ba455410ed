//! Fuzz target: `CommandFrame::decode`
//!
//! Arbitrary text as written by a companion device must never panic the
//! decoder, and a decoded frame must stay within the message it came from.
//!
//! cargo fuzz run fuzz_command_frame

#![no_main]

use fieldstation::app::commands::CommandFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Some(frame) = CommandFrame::decode(text) {
        assert!(frame.code().chars().count() <= 2);
        let len = frame.code().len() + frame.value().map_or(0, str::len);
        assert!(len <= text.len(), "frame larger than message");
        let _ = frame.opcode();
    }
});
