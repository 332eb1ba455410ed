//! Fuzz target: `StationConfig::decode`
//!
//! A record that fails to decode must leave the config untouched; one that
//! decodes must re-encode to text without spaces.
//!
//! cargo fuzz run fuzz_config_decode

#![no_main]

use fieldstation::config::StationConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let before = StationConfig { wifi_ssid: "fuzz".into(), ..StationConfig::new() };
    let mut config = before.clone();
    match config.decode(text) {
        Ok(()) => assert!(!config.encode().contains(' ')),
        Err(_) => assert_eq!(config, before),
    }
});
