//! Field station firmware library.
//!
//! Receives sensor readings over LoRa, relays them to an HTTP backend over
//! WiFi, and takes provisioning commands from a companion device over BLE.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; host builds run against simulation backends.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod reading;
pub mod scan;
pub mod tasks;
