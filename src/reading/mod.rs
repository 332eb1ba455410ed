//! Sensor readings received over the long-range radio link.
//!
//! A packet is either a single value (`"7.20"`) or a value and a
//! temperature separated by the first `;` (`"7.20;23.5"`).  Both fields are
//! kept as the exact text received and embedded verbatim in the backend
//! body, so they must be plain numeric literals.

pub mod slot;
pub mod uploader;

use crate::error::PacketError;

/// Largest packet accepted from the radio, in bytes.
pub const PACKET_CAP: usize = 16;

type Field = heapless::String<PACKET_CAP>;

/// One decoded radio packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    value: Field,
    temperature: Option<Field>,
}

impl Reading {
    /// Decode a raw packet.
    pub fn parse(packet: &[u8]) -> Result<Self, PacketError> {
        if packet.len() > PACKET_CAP {
            return Err(PacketError::TooLong);
        }
        let text = core::str::from_utf8(packet).map_err(|_| PacketError::InvalidUtf8)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(PacketError::Empty);
        }

        match text.split_once(';') {
            Some((value, temperature)) => Ok(Self {
                value: numeric_field(value)?,
                temperature: Some(numeric_field(temperature)?),
            }),
            None => Ok(Self { value: numeric_field(text)?, temperature: None }),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn temperature(&self) -> Option<&str> {
        self.temperature.as_deref()
    }

    /// JSON body for the backend, stamped with `epoch_secs`.
    pub fn to_body(&self, epoch_secs: i64) -> String {
        match &self.temperature {
            Some(temp) => format!(
                "{{\"reading\":{},\"temp\":{},\"timestamps\":{}}}",
                self.value, temp, epoch_secs
            ),
            None => format!("{{\"reading\":{},\"timestamps\":{}}}", self.value, epoch_secs),
        }
    }
}

/// Accept `text` only if it is a JSON number literal with no padding.
fn numeric_field(text: &str) -> Result<Field, PacketError> {
    let literal = !text.is_empty()
        && text.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        && serde_json::from_str::<serde_json::Number>(text).is_ok();
    if !literal {
        return Err(PacketError::NotNumeric);
    }
    Field::try_from(text).map_err(|_| PacketError::TooLong)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_packet() {
        let r = Reading::parse(b"7.20").unwrap();
        assert_eq!(r.value(), "7.20");
        assert_eq!(r.temperature(), None);
        assert_eq!(r.to_body(1_700_000_000), r#"{"reading":7.20,"timestamps":1700000000}"#);
    }

    #[test]
    fn two_value_packet_splits_on_first_separator() {
        let r = Reading::parse(b"7.20;23.5").unwrap();
        assert_eq!(r.value(), "7.20");
        assert_eq!(r.temperature(), Some("23.5"));
        assert_eq!(
            r.to_body(1_700_000_000),
            r#"{"reading":7.20,"temp":23.5,"timestamps":1700000000}"#
        );
    }

    #[test]
    fn body_is_valid_json() {
        let body = Reading::parse(b"-3;1e2").unwrap().to_body(0);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["timestamps"], 0);
    }

    #[test]
    fn trailing_line_noise_is_trimmed() {
        assert_eq!(Reading::parse(b"6.9\r\n").unwrap().value(), "6.9");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Reading::parse(b""), Err(PacketError::Empty));
        assert_eq!(Reading::parse(b"  "), Err(PacketError::Empty));
    }

    #[test]
    fn rejects_oversized() {
        assert_eq!(Reading::parse(&[b'1'; PACKET_CAP + 1]), Err(PacketError::TooLong));
    }

    #[test]
    fn rejects_non_utf8() {
        assert_eq!(Reading::parse(&[0xff, 0xfe]), Err(PacketError::InvalidUtf8));
    }

    #[test]
    fn rejects_text_that_would_break_the_body() {
        for bad in [&b"7.2,\"x\""[..], b"abc", b"1;", b";1", b"1;2;3", b"07", b"1 2", b"+1"] {
            assert_eq!(Reading::parse(bad), Err(PacketError::NotNumeric), "{bad:?}");
        }
    }
}
