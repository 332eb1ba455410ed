//! Command frames received from the companion device.
//!
//! A frame is one text message of the form `<opcode>[<sep><value>]`:
//! the first two characters select the action, the third is a separator
//! and everything after it is the value.  Decoding never validates the
//! opcode; unknown codes are legal frames that simply match nothing.

use core::fmt;

/// Longest opcode in bytes (two characters, each at most four UTF-8 bytes).
const OPCODE_CAP: usize = 8;

/// Actions the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// `01`: decode, persist and apply a config record.
    WriteConfig,
    /// `02`: scan for visible networks.
    Scan,
    /// `08`: erase persisted config.
    ClearConfig,
    /// `09`: send back the current config.
    ReadConfig,
}

impl Opcode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::WriteConfig),
            "02" => Some(Self::Scan),
            "08" => Some(Self::ClearConfig),
            "09" => Some(Self::ReadConfig),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::WriteConfig => "01",
            Self::Scan => "02",
            Self::ClearConfig => "08",
            Self::ReadConfig => "09",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    code: heapless::String<OPCODE_CAP>,
    value: Option<String>,
}

impl CommandFrame {
    /// Decode a raw message.
    ///
    /// Returns `None` when the message is empty after trimming.
    pub fn decode(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        let mut chars = text.char_indices();
        let mut code = heapless::String::new();
        for (_, c) in chars.by_ref().take(2) {
            // Two chars never exceed OPCODE_CAP bytes.
            let _ = code.push(c);
        }

        // Skip the separator; whatever follows is the value.
        let value = chars
            .nth(1)
            .map(|(start, _)| text[start..].to_owned());

        Some(Self { code, value })
    }

    /// The raw two-character code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The recognized opcode, if any.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_code(&self.code)
    }

    /// The value, if the frame carried one.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
