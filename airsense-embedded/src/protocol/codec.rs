use core::fmt;

use embedded_hal_nb::nb::{self, block};
use embedded_hal_nb::serial::{Read, Write};
use log::warn;

use airsense_api::{COMMAND_LINE_CAPACITY, InboundCommand, NodeId, TelemetryEvent};

use crate::error::{Error, Result};

use super::buffer::{LineBuffer, LineStatus};
use super::writer::{TelemetryLine, encode_event, log_text};

fn write_all<S>(serial: &mut S, buffer: &[u8]) -> Result<()>
where
    S: Write<u8, Error = Error>,
{
    for &byte in buffer {
        block!(serial.write(byte))?;
    }
    Ok(())
}

/// Decode one inbound line, surrounding whitespace ignored.
///
/// Allocates while decoding, bounded by the length of `line`.
pub fn decode_command(line: &[u8]) -> core::result::Result<InboundCommand, serde_json::Error> {
    serde_json::from_slice(line.trim_ascii())
}

/// Line-oriented JSON protocol over a byte serial port.
pub struct WireCodec<S> {
    serial: S,
    node_id: NodeId,
    rx: LineBuffer<COMMAND_LINE_CAPACITY>,
}

impl<S> WireCodec<S>
where
    S: Read<u8, Error = Error> + Write<u8, Error = Error>,
{
    pub fn new(serial: S, node_id: NodeId) -> Self {
        Self {
            serial,
            node_id,
            rx: LineBuffer::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub fn release(self) -> S {
        self.serial
    }

    /// Render `event` completely, then send it as one line.
    pub fn write_event(&mut self, event: &TelemetryEvent) -> Result<()> {
        let mut line = TelemetryLine::new();
        encode_event(self.node_id, event, &mut line)?;

        write_all(&mut self.serial, line.as_bytes())?;
        block!(self.serial.flush())?;
        Ok(())
    }

    pub fn write_temp_humidity(&mut self, temperature: f32, humidity: f32) -> Result<()> {
        self.write_event(&TelemetryEvent::TempHumidity {
            temperature,
            humidity,
        })
    }

    pub fn write_air_quality(&mut self, co2: u16, voc: u16, calibrated: bool) -> Result<()> {
        self.write_event(&TelemetryEvent::AirQuality {
            co2,
            voc,
            calibrated,
        })
    }

    pub fn write_light_intensity(&mut self, intensity: f32) -> Result<()> {
        self.write_event(&TelemetryEvent::LightIntensity { intensity })
    }

    pub fn write_log(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.write_event(&TelemetryEvent::LogMessage {
            text: log_text(args),
        })
    }

    /// Drain pending serial input, returning at most one command.
    ///
    /// Returns `Ok(None)` once the port has no more bytes and no line
    /// completed. Call repeatedly to consume several queued commands.
    pub fn poll_command(&mut self) -> Result<Option<InboundCommand>> {
        loop {
            let byte = match self.serial.read() {
                Ok(byte) => byte,
                Err(nb::Error::WouldBlock) => return Ok(None),
                Err(nb::Error::Other(err)) => return Err(err),
            };

            match self.rx.push(byte) {
                LineStatus::Pending => {}
                LineStatus::Complete => {
                    let line = self.rx.take();
                    return Ok(Some(self.parse_command(&line)));
                }
                LineStatus::Overflow => {
                    self.diagnostic(format_args!(
                        "Command exceeds {} bytes, discarded",
                        COMMAND_LINE_CAPACITY
                    ));
                    return Ok(Some(InboundCommand::Unknown));
                }
            }
        }
    }

    /// Interpret one complete line. Anything unusable becomes `Unknown`.
    pub fn parse_command(&mut self, line: &[u8]) -> InboundCommand {
        let text = core::str::from_utf8(line).unwrap_or("<non-utf8>").trim();

        match decode_command(line) {
            Ok(InboundCommand::Unknown) => {
                self.diagnostic(format_args!("Unknown command: {}", text));
                InboundCommand::Unknown
            }
            Ok(command) => command,
            Err(err) => {
                self.diagnostic(format_args!("Malformed command ({}): {}", err, text));
                InboundCommand::Unknown
            }
        }
    }

    fn diagnostic(&mut self, args: fmt::Arguments<'_>) {
        warn!("{}", args);
        if let Err(err) = self.write_log(args) {
            warn!("Failed to report diagnostic: {}", err);
        }
    }
}
