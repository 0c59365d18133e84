//! Line parameters for opening a serial device.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default number of data bits.
pub const DEFAULT_DATA_BITS: u8 = 8;

/// Default number of stop bits.
pub const DEFAULT_STOP_BITS: u8 = 1;

/// Parity checking mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

impl Parity {
    /// Returns the conventional single-letter form (`N`, `E` or `O`).
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::None => 'N',
            Self::Even => 'E',
            Self::Odd => 'O',
        }
    }
}

impl TryFrom<char> for Parity {
    type Error = Error;

    fn try_from(c: char) -> Result<Self> {
        match c.to_ascii_uppercase() {
            'N' => Ok(Self::None),
            'E' => Ok(Self::Even),
            'O' => Ok(Self::Odd),
            other => Err(Error::ConfigRejected {
                reason: format!("unknown parity '{other}'"),
            }),
        }
    }
}

impl FromStr for Parity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::try_from(c),
            _ => Err(Error::ConfigRejected {
                reason: format!("unknown parity '{s}'"),
            }),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Configuration for a serial transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits per character (5-8).
    pub data_bits: u8,
    /// Stop bits (1 or 2).
    pub stop_bits: u8,
    /// Parity mode.
    pub parity: Parity,
    /// Assert the RTS line.
    pub rts: bool,
    /// Assert the DTR line.
    pub dtr: bool,
}

impl SerialConfig {
    /// Creates a new serial configuration with default 8N1 settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DEFAULT_DATA_BITS,
            stop_bits: DEFAULT_STOP_BITS,
            parity: Parity::None,
            rts: false,
            dtr: false,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the number of data bits.
    #[must_use]
    pub const fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Sets the number of stop bits.
    #[must_use]
    pub const fn stop_bits(mut self, bits: u8) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Sets the parity mode.
    #[must_use]
    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Enables or disables the RTS line.
    #[must_use]
    pub const fn rts(mut self, enabled: bool) -> Self {
        self.rts = enabled;
        self
    }

    /// Enables or disables the DTR line.
    #[must_use]
    pub const fn dtr(mut self, enabled: bool) -> Self {
        self.dtr = enabled;
        self
    }

    /// Checks the parameters without touching any device.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.port.trim().is_empty() {
            "empty port name".to_string()
        } else if self.baud_rate == 0 {
            "baud rate must be non-zero".to_string()
        } else if !(5..=8).contains(&self.data_bits) {
            format!("data bits must be 5-8, got {}", self.data_bits)
        } else if !(1..=2).contains(&self.stop_bits) {
            format!("stop bits must be 1 or 2, got {}", self.stop_bits)
        } else {
            return Ok(());
        };

        Err(Error::ConfigRejected { reason })
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} {}{}{}",
            self.port, self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }
}
