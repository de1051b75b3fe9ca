//! Line parameters of the virtual serial device.
//!
//! The device stores whatever the caller sets; nothing here validates that a
//! combination makes sense for a real UART.

use crate::error::{DeviceError, DeviceResult};
use serde::{Deserialize, Serialize};

/// Default baud rate at device initialization.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    /// Wire value used by the control channel.
    pub fn as_byte(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
        }
    }
}

impl TryFrom<u8> for Parity {
    type Error = DeviceError;

    fn try_from(value: u8) -> DeviceResult<Self> {
        match value {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            _ => Err(DeviceError::InvalidCommand("parity out of range")),
        }
    }
}

/// Character framing: data bits, parity and stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFormat {
    /// Number of data bits per character.
    pub data_bits: u8,
    /// Parity checking mode.
    pub parity: Parity,
    /// Number of stop bits.
    pub stop_bits: u8,
}

impl LineFormat {
    /// Size of the control-channel representation.
    pub const WIRE_SIZE: usize = 3;

    /// Decode from the control-channel layout `{data_bits, parity, stop_bits}`.
    pub fn from_bytes(bytes: &[u8]) -> DeviceResult<Self> {
        let raw: &[u8; Self::WIRE_SIZE] = bytes
            .get(..Self::WIRE_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(DeviceError::TransferFault("line format argument too short"))?;

        Ok(Self {
            data_bits: raw[0],
            parity: Parity::try_from(raw[1])?,
            stop_bits: raw[2],
        })
    }

    /// Encode into the control-channel layout.
    pub fn to_bytes(self) -> [u8; Self::WIRE_SIZE] {
        [self.data_bits, self.parity.as_byte(), self.stop_bits]
    }
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

/// Baud rate plus framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    pub baud: u32,
    #[serde(flatten)]
    pub format: LineFormat,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            format: LineFormat::default(),
        }
    }
}

impl std::fmt::Display for LineConfig {
    /// Formats as the usual `115200 8N1` shorthand.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.format.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud, self.format.data_bits, parity, self.format.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let line = LineConfig::default();
        assert_eq!(line.baud, 115_200);
        assert_eq!(line.format.data_bits, 8);
        assert_eq!(line.format.parity, Parity::None);
        assert_eq!(line.format.stop_bits, 1);
        assert_eq!(line.to_string(), "115200 8N1");
    }

    #[test]
    fn test_wire_layout() {
        let fmt = LineFormat {
            data_bits: 7,
            parity: Parity::Even,
            stop_bits: 2,
        };
        assert_eq!(fmt.to_bytes(), [7, 2, 2]);
        assert_eq!(LineFormat::from_bytes(&[7, 2, 2]).unwrap(), fmt);
    }

    #[test]
    fn test_short_payload_is_transfer_fault() {
        let err = LineFormat::from_bytes(&[8, 0]).unwrap_err();
        assert!(matches!(err, DeviceError::TransferFault(_)));
    }

    #[test]
    fn test_bad_parity_is_invalid_command() {
        let err = LineFormat::from_bytes(&[8, 9, 1]).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidCommand(_)));
    }

    #[test]
    fn test_no_cross_field_validation() {
        // Nonsense framing is stored verbatim.
        let fmt = LineFormat::from_bytes(&[0, 1, 200]).unwrap();
        assert_eq!(fmt.data_bits, 0);
        assert_eq!(fmt.stop_bits, 200);
    }
}
