use core::fmt;

use alloc::string::String;
use alloc::vec::Vec;

use crate::message::{InboundCommand, LINE_TERMINATOR, TelemetryRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Serialization error
    Serialization(String),
    /// Deserialization error
    Deserialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::Deserialization(e) => write!(f, "Deserialization error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

/// Decode one telemetry line received from a node.
///
/// Trailing whitespace, including the line terminator, is ignored.
pub fn decode_telemetry(line: &[u8]) -> Result<TelemetryRecord> {
    serde_json::from_slice(line.trim_ascii_end())
        .map_err(|e| Error::Deserialization(alloc::format!("{}", e)))
}

/// Encode a command as a complete wire line, terminator included.
pub fn encode_command(command: &InboundCommand) -> Result<Vec<u8>> {
    let mut line =
        serde_json::to_vec(command).map_err(|e| Error::Serialization(alloc::format!("{}", e)))?;
    line.push(LINE_TERMINATOR);
    Ok(line)
}
