//! Application core: config persistence and the provisioning protocol.
//!
//! Everything here talks to the outside world only through the **port
//! traits** in [`ports`], so the whole command path runs on the host
//! against simulated storage and a mock channel.

pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod ports;
pub mod store;
