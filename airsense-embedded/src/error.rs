use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The gas sensor did not come up at boot
    SensorInit,
    /// A sensor transaction failed; retried next cycle
    SensorRead,
    /// The baseline storage medium rejected an access
    Storage,
    InvalidAddress,
    ChecksumMismatch,
    Bus,
    Serial,
    MessageTooLarge,
    SensorReadingOutOfRange,
    InitializationError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SensorInit => write!(f, "Sensor initialization failed"),
            Error::SensorRead => write!(f, "Sensor read failed"),
            Error::Storage => write!(f, "Storage error"),
            Error::InvalidAddress => write!(f, "Storage address out of range"),
            Error::ChecksumMismatch => write!(f, "Checksum mismatch"),
            Error::Bus => write!(f, "Bus error"),
            Error::Serial => write!(f, "Serial error"),
            Error::MessageTooLarge => write!(f, "Message exceeds its byte budget"),
            Error::SensorReadingOutOfRange => write!(f, "Sensor reading out of valid range"),
            Error::InitializationError => write!(f, "Initialization error"),
        }
    }
}

impl core::error::Error for Error {}

impl embedded_hal_nb::serial::Error for Error {
    fn kind(&self) -> embedded_hal_nb::serial::ErrorKind {
        embedded_hal_nb::serial::ErrorKind::Other
    }
}

pub type Result<T> = core::result::Result<T, Error>;
