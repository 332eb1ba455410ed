//! Unified error types for the station firmware.
//!
//! Each subsystem has its own small enum; all of them convert into the
//! top-level [`Error`] so task loops can log failures uniformly.  Nothing
//! here is fatal: every error ends up in a log line and the station keeps
//! running with its last-known-good state.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Non-volatile storage failed.
    Store(StoreError),
    /// Configuration text could not be decoded.
    Decode(DecodeError),
    /// Network or backend request failed.
    Network(NetworkError),
    /// The command channel could not deliver a response.
    Channel(ChannelError),
    /// A radio packet was rejected.
    Packet(PacketError),
    /// The LoRa transceiver failed.
    Radio(RadioError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Channel(e) => write!(f, "channel: {e}"),
            Self::Packet(e) => write!(f, "packet: {e}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The namespace could not be opened.
    Open,
    /// No record is stored under the requested key.
    NotFound,
    /// Reading the record failed.
    Read,
    /// Staging a write or erase failed.
    Write,
    /// The commit step failed; the previous committed state stands.
    Commit,
    /// A record was found but its contents did not decode.
    Corrupted(DecodeError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "namespace open failed"),
            Self::NotFound => write!(f, "record not found"),
            Self::Read => write!(f, "read failed"),
            Self::Write => write!(f, "write failed"),
            Self::Commit => write!(f, "commit failed"),
            Self::Corrupted(e) => write!(f, "stored record corrupted ({e})"),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The text is not well-formed JSON.
    Malformed,
    /// The text parsed, but not as an object.
    NotAnObject,
    /// A recognized key carried a value that is not a string.
    InvalidField(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed JSON"),
            Self::NotAnObject => write!(f, "expected a JSON object"),
            Self::InvalidField(key) => write!(f, "field '{key}' must be a string"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    ScanFailed,
    /// The backend endpoint is not configured.
    NoEndpoint,
    /// The HTTP request could not be sent or its response not read.
    Request,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::ScanFailed => write!(f, "WiFi scan failed"),
            Self::NoEndpoint => write!(f, "backend endpoint not configured"),
            Self::Request => write!(f, "HTTP request failed"),
        }
    }
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Command channel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// No companion device is connected.
    NoPeer,
    /// The transport refused the notification.
    SendFailed,
    /// An inbound write was not valid UTF-8.
    InvalidUtf8,
    /// An inbound write exceeded the command buffer.
    TooLong,
    /// The event queue was full and the write was dropped.
    QueueFull,
    /// The transport stack could not be brought up.
    Init,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPeer => write!(f, "no peer connected"),
            Self::SendFailed => write!(f, "notification failed"),
            Self::InvalidUtf8 => write!(f, "write is not valid UTF-8"),
            Self::TooLong => write!(f, "write exceeds command buffer"),
            Self::QueueFull => write!(f, "event queue full"),
            Self::Init => write!(f, "transport initialisation failed"),
        }
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

// ---------------------------------------------------------------------------
// Radio packet errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    Empty,
    TooLong,
    InvalidUtf8,
    /// A field is not a plain numeric literal and cannot be embedded in JSON.
    NotNumeric,
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty packet"),
            Self::TooLong => write!(f, "packet exceeds payload capacity"),
            Self::InvalidUtf8 => write!(f, "packet is not valid UTF-8"),
            Self::NotNumeric => write!(f, "packet field is not numeric"),
        }
    }
}

impl From<PacketError> for Error {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

// ---------------------------------------------------------------------------
// LoRa transceiver errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// An SPI transfer or the reset line failed.
    Bus,
    /// `RegVersion` did not identify an SX1276/77/78.
    UnknownChip(u8),
    /// A frame arrived with a bad payload CRC.
    Crc,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "transceiver bus error"),
            Self::UnknownChip(v) => write!(f, "unexpected silicon version {v:#04x}"),
            Self::Crc => write!(f, "payload CRC mismatch"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
