//! Port traits: the hexagonal boundary between station logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ConfigStore / CommandDispatcher / Uploader
//! ```
//!
//! Adapters in [`crate::adapters`] implement these for the ESP32 (and for
//! the host simulation); the integration tests implement them with mocks.

use crate::config::StationConfig;
use crate::error::{ChannelError, NetworkError, StoreError};
use crate::scan::NetworkInfo;

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage organised in namespaces.
///
/// Every access goes through [`with_namespace`](StoragePort::with_namespace),
/// which opens the namespace, hands a session to the closure and closes the
/// namespace again on every exit path, including errors.
pub trait StoragePort {
    fn with_namespace<T, F>(&mut self, namespace: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StorageSession) -> Result<T, StoreError>;
}

/// An open namespace.
///
/// Writes and erases are staged; only [`commit`](StorageSession::commit)
/// makes them durable.
pub trait StorageSession {
    /// Read a string value. `Ok(None)` if the key does not exist.
    fn get_str(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Erase every key in the namespace.
    fn erase_all(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Command channel port (driven adapter: domain → companion device)
// ───────────────────────────────────────────────────────────────

/// Text-capable, bidirectional link to the companion device.
///
/// Shared between the command loop and one-shot scan tasks, hence `&self`.
pub trait CommandChannel {
    /// Send one response frame.
    fn send(&self, text: &str) -> Result<(), ChannelError>;

    /// Whether a companion device is currently connected.
    fn has_peer(&self) -> bool;
}

impl<T: CommandChannel + ?Sized> CommandChannel for &T {
    fn send(&self, text: &str) -> Result<(), ChannelError> {
        (**self).send(text)
    }

    fn has_peer(&self) -> bool {
        (**self).has_peer()
    }
}

// ───────────────────────────────────────────────────────────────
// Network ports (driven adapter: domain ↔ WiFi)
// ───────────────────────────────────────────────────────────────

/// Connectivity as seen by the uploader.
pub trait NetworkPort {
    fn is_connected(&self) -> bool;

    /// Drive reconnection; called on the uploader's cadence.
    fn maintain(&mut self) {}
}

/// Enumerates visible access points.
pub trait ScanPort {
    fn scan(&mut self) -> Result<Vec<NetworkInfo>, NetworkError>;
}

/// Re-applies configuration to dependent peripherals after it changes.
pub trait PeripheralPort {
    /// Infallible by contract: failures are logged and the station stays
    /// in whatever degraded state the peripheral reached.
    fn reinitialize(&mut self, config: &StationConfig);
}

// ───────────────────────────────────────────────────────────────
// Backend ports
// ───────────────────────────────────────────────────────────────

/// One outgoing backend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest<'a> {
    pub url: &'a str,
    /// Complete `Authorization` header value.
    pub authorization: &'a str,
    pub body: &'a str,
}

/// Blocking HTTP client.
pub trait HttpPort {
    /// POST a JSON body and return the response status code.
    fn post_json(&mut self, request: &PostRequest<'_>) -> Result<u16, NetworkError>;
}

/// Wall-clock source.
pub trait ClockPort {
    /// Seconds since the Unix epoch.
    fn epoch_secs(&self) -> i64;
}

/// Source of raw radio packets.
pub trait RadioPort {
    /// Copy the next complete packet into `buf`; `None` if nothing arrived.
    fn poll_packet(&mut self, buf: &mut [u8]) -> Option<usize>;
}
