use std::io::{self, Stdout, Write as _};

use airsense_embedded::Error;
use embedded_hal_nb::nb;
use embedded_hal_nb::serial::{ErrorType, Read, Write};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, error::TryRecvError};
use tracing::{debug, warn};

/// The node's serial port mapped onto the process: telemetry goes to stdout,
/// commands come from stdin.
pub struct StdioSerial {
    rx: UnboundedReceiver<u8>,
    stdout: Stdout,
}

impl StdioSerial {
    /// Start forwarding stdin in the background. Must be called within a
    /// Tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut stdin = tokio::io::stdin();
            let mut buffer = [0u8; 64];

            loop {
                match stdin.read(&mut buffer).await {
                    Ok(0) => {
                        debug!("stdin closed");
                        break;
                    }
                    Ok(n) => {
                        if buffer[..n].iter().try_for_each(|&b| tx.send(b)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        });

        Self::from_receiver(rx)
    }

    pub fn from_receiver(rx: UnboundedReceiver<u8>) -> Self {
        Self {
            rx,
            stdout: io::stdout(),
        }
    }
}

fn serial_error(e: io::Error) -> nb::Error<Error> {
    warn!("Failed to write stdout: {}", e);
    nb::Error::Other(Error::Serial)
}

impl ErrorType for StdioSerial {
    type Error = Error;
}

impl Read<u8> for StdioSerial {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        match self.rx.try_recv() {
            Ok(byte) => Ok(byte),
            // A closed stdin looks like a quiet line
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Err(nb::Error::WouldBlock),
        }
    }
}

impl Write<u8> for StdioSerial {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.stdout.write_all(&[word]).map_err(serial_error)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.stdout.flush().map_err(serial_error)
    }
}
