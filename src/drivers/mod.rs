//! Low-level drivers: core-pinned task spawning and the LoRa transceiver.

pub mod sx127x;
pub mod task_pin;
