use core::fmt::{self, Write};

use airsense_api::{LogText, NodeId, TelemetryEvent};
use heapless::String;

use crate::error::{Error, Result};

/// Byte budgets per record type, terminator included
pub const TEMP_LINE_BUDGET: usize = 80;
pub const AIR_QUALITY_LINE_BUDGET: usize = 80;
pub const LIGHT_LINE_BUDGET: usize = 64;
pub const LOG_LINE_BUDGET: usize = 200;

pub const MAX_LINE_LEN: usize = LOG_LINE_BUDGET;

/// Scratch buffer large enough for any outbound record
pub type TelemetryLine = String<MAX_LINE_LEN>;

const LOG_TAIL: &str = "\"}\n";

pub const fn line_budget(event: &TelemetryEvent) -> usize {
    match event {
        TelemetryEvent::TempHumidity { .. } => TEMP_LINE_BUDGET,
        TelemetryEvent::AirQuality { .. } => AIR_QUALITY_LINE_BUDGET,
        TelemetryEvent::LightIntensity { .. } => LIGHT_LINE_BUDGET,
        TelemetryEvent::LogMessage { .. } => LOG_LINE_BUDGET,
    }
}

/// Refuses any write that would grow the line past `limit`.
struct Bounded<'a, const N: usize> {
    out: &'a mut String<N>,
    limit: usize,
}

impl<const N: usize> Bounded<'_, N> {
    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.out.len())
    }
}

impl<const N: usize> Write for Bounded<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if s.len() > self.remaining() {
            return Err(fmt::Error);
        }
        self.out.push_str(s).map_err(|_| fmt::Error)
    }
}

/// Keeps the longest prefix that fits and drops the rest.
struct Truncating<'a, const N: usize> {
    out: &'a mut String<N>,
    full: bool,
}

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.full || self.out.push(c).is_err() {
                self.full = true;
                break;
            }
        }
        Ok(())
    }
}

/// Render a log message, truncated on a char boundary to the wire limit.
pub fn log_text(args: fmt::Arguments<'_>) -> LogText {
    let mut text = LogText::new();
    let mut writer = Truncating {
        out: &mut text,
        full: false,
    };
    // Truncating never fails; an error can only come from a Display impl
    let _ = writer.write_fmt(args);
    text
}

fn finite(value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::SensorReadingOutOfRange)
    }
}

/// Escape `text` as JSON string content, stopping early so that `reserve`
/// bytes stay available after it.
fn write_escaped<const N: usize>(
    writer: &mut Bounded<'_, N>,
    text: &str,
    reserve: usize,
) -> fmt::Result {
    let mut utf8 = [0u8; 4];

    for c in text.chars() {
        let escaped: &str = match c {
            '"' => "\\\"",
            '\\' => "\\\\",
            '\n' => "\\n",
            '\r' => "\\r",
            '\t' => "\\t",
            c if (c as u32) < 0x20 => {
                if writer.remaining() < 6 + reserve {
                    break;
                }
                write!(writer, "\\u{:04x}", c as u32)?;
                continue;
            }
            c => c.encode_utf8(&mut utf8),
        };

        if writer.remaining() < escaped.len() + reserve {
            break;
        }
        writer.write_str(escaped)?;
    }

    Ok(())
}

fn write_log<const N: usize>(writer: &mut Bounded<'_, N>, node: NodeId, text: &str) -> fmt::Result {
    write!(writer, "{{\"type\":\"log\",\"node\":{},\"message\":\"", node)?;
    write_escaped(writer, text, LOG_TAIL.len())?;
    writer.write_str(LOG_TAIL)
}

/// Encode one telemetry record as a complete JSON line into `out`.
///
/// Numeric records that do not fit their budget are rejected and `out` is
/// left empty; log text is truncated instead.
pub fn encode_event<const N: usize>(
    node: NodeId,
    event: &TelemetryEvent,
    out: &mut String<N>,
) -> Result<()> {
    out.clear();

    let result = {
        let mut writer = Bounded {
            limit: line_budget(event).min(N),
            out: &mut *out,
        };

        match event {
            TelemetryEvent::TempHumidity {
                temperature,
                humidity,
            } => writeln!(
                writer,
                "{{\"type\":\"temp\",\"node\":{},\"temp\":{:.2},\"humidity\":{:.2}}}",
                node,
                finite(*temperature)?,
                finite(*humidity)?
            ),
            TelemetryEvent::AirQuality {
                co2,
                voc,
                calibrated,
            } => writeln!(
                writer,
                "{{\"type\":\"air_qual\",\"node\":{},\"co2\":{},\"voc\":{},\"calibrated\":{}}}",
                node, co2, voc, calibrated
            ),
            TelemetryEvent::LightIntensity { intensity } => writeln!(
                writer,
                "{{\"type\":\"light\",\"node\":{},\"intensity\":{:.2}}}",
                node,
                finite(*intensity)?
            ),
            TelemetryEvent::LogMessage { text } => write_log(&mut writer, node, text),
        }
    };

    if result.is_err() {
        out.clear();
        return Err(Error::MessageTooLarge);
    }

    Ok(())
}
