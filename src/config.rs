//! Station configuration.
//!
//! [`StationConfig`] is the record provisioned by the companion device and
//! persisted in NVS.  It travels over a line-based command channel that
//! splits on whitespace, so its textual form is JSON with every space
//! replaced by `%20`.
//!
//! [`TaskTimings`] holds the firmware's own tunables (poll cadences and
//! timeouts); those are compiled in, not provisioned.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// NVS namespace holding the station record.
pub const STORAGE_NAMESPACE: &str = "storage";
/// NVS key of the station record.
pub const STORAGE_KEY: &str = "station_config";

/// LoRa carrier frequency (915 MHz band).
pub const LORA_FREQUENCY_HZ: u32 = 915_000_000;

/// Escape token substituted for every space on the wire.
pub const SPACE_ESCAPE: &str = "%20";

/// Replace every space with [`SPACE_ESCAPE`].
pub fn escape_spaces(text: &str) -> String {
    text.replace(' ', SPACE_ESCAPE)
}

/// Reverse [`escape_spaces`].
pub fn unescape_spaces(text: &str) -> String {
    text.replace(SPACE_ESCAPE, " ")
}

/// Provisioned operating parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StationConfig {
    /// Network name to join.
    pub wifi_ssid: String,
    /// Network credential.
    pub wifi_pass: String,
    /// Backend ingestion endpoint.
    pub api_url: String,
    /// Backend account identifier (basic-auth user).
    pub user_email: String,
    /// Backend account credential (basic-auth password).
    pub user_pass: String,
    /// True iff a record was decoded from storage. Never persisted.
    #[serde(skip)]
    pub loaded: bool,
}

const FIELD_KEYS: [&str; 5] = ["wifi_ssid", "wifi_pass", "api_url", "user_email", "user_pass"];

impl StationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to transport-safe text.
    pub fn encode(&self) -> String {
        // Serializing a struct of plain strings cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        escape_spaces(&json)
    }

    /// Apply an encoded record on top of the current values.
    ///
    /// Recognized keys overwrite their field, unknown keys are ignored and
    /// missing (or `null`) keys leave the field as it was.  The record is
    /// validated in full before anything is written, so a failed decode
    /// leaves `self` untouched.
    pub fn decode(&mut self, text: &str) -> Result<(), DecodeError> {
        let json = unescape_spaces(text);
        let value: Value = serde_json::from_str(&json).map_err(|_| DecodeError::Malformed)?;
        let Value::Object(map) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let mut updates: [Option<String>; 5] = Default::default();
        for (slot, key) in updates.iter_mut().zip(FIELD_KEYS) {
            *slot = string_field(&map, key)?;
        }

        let [ssid, pass, url, email, user_pass] = updates;
        if let Some(v) = ssid {
            self.wifi_ssid = v;
        }
        if let Some(v) = pass {
            self.wifi_pass = v;
        }
        if let Some(v) = url {
            self.api_url = v;
        }
        if let Some(v) = email {
            self.user_email = v;
        }
        if let Some(v) = user_pass {
            self.user_pass = v;
        }
        Ok(())
    }

    /// Reset every field to empty and mark the config as not loaded.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether enough is configured to attempt an upload.
    pub fn has_backend(&self) -> bool {
        !self.api_url.is_empty()
    }
}

fn string_field(map: &Map<String, Value>, key: &'static str) -> Result<Option<String>, DecodeError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DecodeError::InvalidField(key)),
    }
}

/// Task cadences and timeouts.
#[derive(Debug, Clone)]
pub struct TaskTimings {
    /// Radio receive poll interval (milliseconds)
    pub radio_poll_ms: u32,
    /// Uploader wake-up interval when idle or offline (milliseconds)
    pub upload_poll_ms: u32,
    /// Command dispatcher poll interval (milliseconds)
    pub command_poll_ms: u32,
    /// Backend request timeout (milliseconds)
    pub http_timeout_ms: u32,
    /// Connection checks at boot before giving up
    pub wifi_connect_attempts: u8,
    /// Delay between boot connection checks (milliseconds)
    pub wifi_connect_wait_ms: u32,
}

impl Default for TaskTimings {
    fn default() -> Self {
        Self {
            radio_poll_ms: 1000,
            upload_poll_ms: 5000,
            command_poll_ms: 250,
            http_timeout_ms: 10_000,
            wifi_connect_attempts: 10,
            wifi_connect_wait_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StationConfig {
        StationConfig {
            wifi_ssid: "Home Net".into(),
            wifi_pass: "correct horse battery".into(),
            api_url: "http://h/api".into(),
            user_email: "ops@example.com".into(),
            user_pass: "s3cret pass".into(),
            loaded: false,
        }
    }

    #[test]
    fn encode_has_no_spaces() {
        let text = sample().encode();
        assert!(!text.contains(' '));
        assert!(text.contains("Home%20Net"));
    }

    #[test]
    fn encode_never_includes_loaded() {
        let mut c = sample();
        c.loaded = true;
        assert!(!c.encode().contains("loaded"));
    }

    #[test]
    fn empty_config_encodes_all_keys() {
        assert_eq!(
            StationConfig::new().encode(),
            r#"{"wifi_ssid":"","wifi_pass":"","api_url":"","user_email":"","user_pass":""}"#
        );
    }

    #[test]
    fn decode_reverses_encode() {
        let original = sample();
        let mut decoded = StationConfig::new();
        decoded.decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_missing_key_keeps_value() {
        let mut c = sample();
        c.decode(r#"{"wifi_ssid":"Other%20Net","api_url":"http://x/y"}"#).unwrap();
        assert_eq!(c.wifi_ssid, "Other Net");
        assert_eq!(c.api_url, "http://x/y");
        assert_eq!(c.wifi_pass, "correct horse battery");
        assert_eq!(c.user_email, "ops@example.com");
    }

    #[test]
    fn decode_ignores_unknown_keys() {
        let mut c = StationConfig::new();
        c.decode(r#"{"wifi_ssid":"a","firmware":"2.0"}"#).unwrap();
        assert_eq!(c.wifi_ssid, "a");
    }

    #[test]
    fn decode_rejects_malformed_text() {
        let mut c = sample();
        assert_eq!(c.decode("{\"wifi_ssid\":"), Err(DecodeError::Malformed));
        assert_eq!(c.decode("not json"), Err(DecodeError::Malformed));
        assert_eq!(c, sample());
    }

    #[test]
    fn decode_rejects_non_object() {
        let mut c = StationConfig::new();
        assert_eq!(c.decode("[1,2]"), Err(DecodeError::NotAnObject));
        assert_eq!(c.decode("\"text\""), Err(DecodeError::NotAnObject));
    }

    #[test]
    fn decode_is_all_or_nothing() {
        let mut c = sample();
        let err = c.decode(r#"{"wifi_ssid":"changed","user_pass":42}"#);
        assert_eq!(err, Err(DecodeError::InvalidField("user_pass")));
        assert_eq!(c.wifi_ssid, "Home Net");
    }

    #[test]
    fn decode_null_leaves_field() {
        let mut c = sample();
        c.decode(r#"{"wifi_pass":null}"#).unwrap();
        assert_eq!(c.wifi_pass, "correct horse battery");
    }

    #[test]
    fn reset_clears_everything() {
        let mut c = sample();
        c.loaded = true;
        c.reset();
        assert_eq!(c, StationConfig::default());
        assert!(!c.loaded);
    }

    #[test]
    fn default_timings_are_sane() {
        let t = TaskTimings::default();
        assert!(t.command_poll_ms < t.radio_poll_ms);
        assert!(t.radio_poll_ms < t.upload_poll_ms);
        assert!(t.http_timeout_ms > 0);
        assert!(t.wifi_connect_attempts > 0);
    }
}
