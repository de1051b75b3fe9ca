//! Out-of-band control channel.
//!
//! Command codes follow the Linux `_IOC` layout so they can share a numbering
//! scheme with real drivers:
//!
//! ```text
//!  31..30   29..16   15..8   7..0
//!  dir      size     type    nr
//! ```
//!
//! The type byte of every command here is [`VS_MAGIC`]. Anything else is
//! rejected as an unsupported command.

use super::line::LineFormat;
use crate::error::{DeviceError, DeviceResult};

/// Private command namespace of the device.
pub const VS_MAGIC: u8 = b'v';

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, nr: u32, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | ((VS_MAGIC as u32) << 8) | nr
}

pub const VS_SET_BAUD: u32 = ioc(IOC_WRITE, 0, std::mem::size_of::<u32>());
pub const VS_GET_BAUD: u32 = ioc(IOC_READ, 1, std::mem::size_of::<u32>());
pub const VS_SET_FFMT: u32 = ioc(IOC_WRITE, 2, LineFormat::WIRE_SIZE);
pub const VS_GET_FFMT: u32 = ioc(IOC_READ, 3, LineFormat::WIRE_SIZE);

/// Type byte of a command code.
pub const fn ioc_type(code: u32) -> u8 {
    ((code >> 8) & 0xff) as u8
}

/// A decoded control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetBaud(u32),
    GetBaud,
    SetLineFormat(LineFormat),
    GetLineFormat,
}

/// Result of a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    Done,
    Baud(u32),
    LineFormat(LineFormat),
}

impl ControlCommand {
    /// Decode a raw command code and its input argument bytes.
    pub fn decode(code: u32, arg: &[u8]) -> DeviceResult<Self> {
        if ioc_type(code) != VS_MAGIC {
            return Err(DeviceError::InvalidCommand("foreign command namespace"));
        }

        match code {
            VS_SET_BAUD => {
                let raw: [u8; 4] = arg
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(DeviceError::TransferFault("baud argument too short"))?;
                Ok(Self::SetBaud(u32::from_ne_bytes(raw)))
            }
            VS_GET_BAUD => Ok(Self::GetBaud),
            VS_SET_FFMT => Ok(Self::SetLineFormat(LineFormat::from_bytes(arg)?)),
            VS_GET_FFMT => Ok(Self::GetLineFormat),
            _ => Err(DeviceError::InvalidCommand("unknown command number")),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::SetBaud(_) => VS_SET_BAUD,
            Self::GetBaud => VS_GET_BAUD,
            Self::SetLineFormat(_) => VS_SET_FFMT,
            Self::GetLineFormat => VS_GET_FFMT,
        }
    }
}

impl ControlReply {
    /// Write the reply into the caller's argument buffer.
    pub fn encode_into(&self, arg: &mut [u8]) -> DeviceResult<()> {
        match self {
            Self::Done => Ok(()),
            Self::Baud(baud) => {
                let out = arg
                    .get_mut(..4)
                    .ok_or(DeviceError::TransferFault("baud buffer too short"))?;
                out.copy_from_slice(&baud.to_ne_bytes());
                Ok(())
            }
            Self::LineFormat(fmt) => {
                let out = arg
                    .get_mut(..LineFormat::WIRE_SIZE)
                    .ok_or(DeviceError::TransferFault("line format buffer too short"))?;
                out.copy_from_slice(&fmt.to_bytes());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::line::Parity;

    #[test]
    fn test_codes_are_distinct_and_namespaced() {
        let codes = [VS_SET_BAUD, VS_GET_BAUD, VS_SET_FFMT, VS_GET_FFMT];
        for (i, a) in codes.iter().enumerate() {
            assert_eq!(ioc_type(*a), VS_MAGIC);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_decode_set_baud() {
        let cmd = ControlCommand::decode(VS_SET_BAUD, &9600u32.to_ne_bytes()).unwrap();
        assert_eq!(cmd, ControlCommand::SetBaud(9600));
        assert_eq!(cmd.code(), VS_SET_BAUD);
    }

    #[test]
    fn test_decode_set_format() {
        let cmd = ControlCommand::decode(VS_SET_FFMT, &[7, 2, 2]).unwrap();
        assert_eq!(
            cmd,
            ControlCommand::SetLineFormat(LineFormat {
                data_bits: 7,
                parity: Parity::Even,
                stop_bits: 2,
            })
        );
    }

    #[test]
    fn test_foreign_namespace_rejected() {
        // 'T' namespace, as used by the tty layer.
        let code = (u32::from(b'T') << 8) | 1;
        assert!(matches!(
            ControlCommand::decode(code, &[]),
            Err(DeviceError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_unknown_number_rejected() {
        let code = ioc(IOC_READ, 42, 4);
        assert!(matches!(
            ControlCommand::decode(code, &[0; 4]),
            Err(DeviceError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_short_argument_is_transfer_fault() {
        assert!(matches!(
            ControlCommand::decode(VS_SET_BAUD, &[1, 2]),
            Err(DeviceError::TransferFault(_))
        ));

        let mut tiny = [0u8; 2];
        assert!(matches!(
            ControlReply::Baud(115_200).encode_into(&mut tiny),
            Err(DeviceError::TransferFault(_))
        ));
    }

    #[test]
    fn test_reply_encoding() {
        let mut buf = [0u8; 4];
        ControlReply::Baud(57_600).encode_into(&mut buf).unwrap();
        assert_eq!(u32::from_ne_bytes(buf), 57_600);
    }
}
