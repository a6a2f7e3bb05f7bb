use serde::{Deserialize, Serialize};

/// Identifier of a node within the sensing network
pub type NodeId = u8;

/// Node identifier used when none is configured
pub const DEFAULT_NODE_ID: NodeId = 1;

/// Longest log message carried on the wire, in bytes
pub const MAX_LOG_MESSAGE_LEN: usize = 149;

/// Capacity of the node's inbound command line buffer, excluding the terminator
pub const COMMAND_LINE_CAPACITY: usize = 40;

/// Terminator between wire records
pub const LINE_TERMINATOR: u8 = b'\n';

/// Log text with its length bound enforced by the type
pub type LogText = heapless::String<MAX_LOG_MESSAGE_LEN>;

/// Telemetry emitted by a node, discriminated by the `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// Ambient temperature and absolute humidity
    #[serde(rename = "temp")]
    TempHumidity {
        /// Temperature in Celsius
        #[serde(rename = "temp")]
        temperature: f32,
        /// Absolute humidity in mg/m^3
        humidity: f32,
    },
    /// Gas sensor output
    #[serde(rename = "air_qual")]
    AirQuality {
        /// Equivalent CO2 in ppm
        co2: u16,
        /// Total VOC in ppb
        voc: u16,
        /// Whether the readings are backed by a trusted baseline
        calibrated: bool,
    },
    /// Ambient light
    #[serde(rename = "light")]
    LightIntensity {
        /// Light intensity in lux
        intensity: f32,
    },
    /// Human readable diagnostic
    #[serde(rename = "log")]
    LogMessage {
        #[serde(rename = "message")]
        text: LogText,
    },
}

impl TelemetryEvent {
    /// Wire discriminator of this event
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::TempHumidity { .. } => "temp",
            Self::AirQuality { .. } => "air_qual",
            Self::LightIntensity { .. } => "light",
            Self::LogMessage { .. } => "log",
        }
    }
}

/// A decoded telemetry line as seen by the coordinator
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetryRecord {
    /// Originating node
    pub node: NodeId,
    #[serde(flatten)]
    pub event: TelemetryEvent,
}

/// Commands the coordinator may send to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundCommand {
    /// Discard the stored baseline and begin a new calibration cycle
    StartCalibration,
    /// Any command type this node does not understand
    #[serde(other)]
    Unknown,
}
