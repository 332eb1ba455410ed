//! Fuzz target: `Reading::parse`
//!
//! Every accepted packet must produce a backend body that is valid JSON.
//!
//! cargo fuzz run fuzz_radio_packet

#![no_main]

use fieldstation::reading::Reading;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(reading) = Reading::parse(data) {
        let body = reading.to_body(0);
        assert!(body.starts_with("{\"reading\":"));
        assert!(body.ends_with("\"timestamps\":0}"));
    }
});
