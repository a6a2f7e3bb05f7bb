use core::fmt;

use embedded_hal_nb::serial::{Read, Write};
use log::{error, warn};

use airsense_api::{DEFAULT_NODE_ID, InboundCommand, NodeId};

use crate::calibration::{AirQuality, CalibrationConfig, CalibrationEvent};
use crate::clock::{Clock, elapsed_ms};
use crate::error::{Error, Result};
use crate::protocol::WireCodec;
use crate::sensor::{ClimateSensor, IaqSensor, LightSensor, absolute_humidity};
use crate::storage::ByteStorage;

/// One report per second keeps the gas sensor's baseline algorithm fed
pub const DEFAULT_REPORT_INTERVAL_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub report_interval_ms: u32,
    pub calibration: CalibrationConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: DEFAULT_NODE_ID,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            calibration: CalibrationConfig::default(),
        }
    }
}

fn emit(result: Result<()>, record: &str) {
    if let Err(e) = result {
        error!("Dropped {} record: {}", record, e);
    }
}

/// Ties the sensors, the calibration engine and the serial link together.
///
/// Drive it by calling [`poll`](Self::poll) from the main loop.
pub struct SensorNode<S, E, C, T, L, P> {
    engine: AirQuality<S, E, C>,
    climate: T,
    light: L,
    codec: WireCodec<P>,
    clock: C,
    config: NodeConfig,
    last_report: Option<u32>,
}

impl<S, E, C, T, L, P> SensorNode<S, E, C, T, L, P>
where
    S: IaqSensor,
    E: ByteStorage,
    C: Clock + Clone,
    T: ClimateSensor,
    L: LightSensor,
    P: Read<u8, Error = Error> + Write<u8, Error = Error>,
{
    pub fn new(
        iaq: S,
        storage: E,
        climate: T,
        light: L,
        serial: P,
        clock: C,
        config: NodeConfig,
    ) -> Self {
        Self {
            engine: AirQuality::new(iaq, storage, clock.clone(), config.calibration),
            climate,
            light,
            codec: WireCodec::new(serial, config.node_id),
            clock,
            config,
            last_report: None,
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        if let Err(e) = self.engine.begin() {
            self.log_line(format_args!("Failed to initialize the air quality sensor: {}", e));
            return Err(e);
        }

        self.report_calibration_event();
        Ok(())
    }

    /// Handle pending commands and report readings when an interval has passed.
    pub fn poll(&mut self) {
        loop {
            match self.codec.poll_command() {
                Ok(Some(command)) => self.dispatch(command),
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read from serial: {}", e);
                    break;
                }
            }
        }

        let now = self.clock.now_ms();
        let due = match self.last_report {
            Some(last) => elapsed_ms(last, now) >= self.config.report_interval_ms,
            None => true,
        };

        if due {
            self.last_report = Some(now);
            self.report();
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.engine.is_calibrated()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn engine(&self) -> &AirQuality<S, E, C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AirQuality<S, E, C> {
        &mut self.engine
    }

    pub fn codec(&self) -> &WireCodec<P> {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut WireCodec<P> {
        &mut self.codec
    }

    fn dispatch(&mut self, command: InboundCommand) {
        match command {
            InboundCommand::StartCalibration => {
                if let Err(e) = self.engine.start_calibration() {
                    self.log_line(format_args!("Failed to start calibration: {}", e));
                }
                self.report_calibration_event();
            }
            // Already reported by the codec
            InboundCommand::Unknown => {}
        }
    }

    fn report(&mut self) {
        let humidity = match self.climate.read_climate() {
            Ok(reading) => {
                let humidity =
                    absolute_humidity(reading.temperature_c, reading.relative_humidity);
                let result = self.codec.write_temp_humidity(reading.temperature_c, humidity);
                emit(result, "temp");
                Some(humidity)
            }
            Err(e) => {
                warn!("Failed to read climate sensor: {:?}", e);
                self.log_line(format_args!("Failed to read climate sensor"));
                None
            }
        };

        match self.engine.read_air_quality(humidity.unwrap_or(0.0)) {
            Ok(measurement) => {
                let result = self.codec.write_air_quality(
                    measurement.co2_eq_ppm,
                    measurement.voc_ppb,
                    self.engine.is_calibrated(),
                );
                emit(result, "air_qual");
            }
            Err(e) => self.log_line(format_args!("Failed to read air quality: {}", e)),
        }

        self.report_calibration_event();

        match self.light.read_lux() {
            Ok(lux) => emit(self.codec.write_light_intensity(lux), "light"),
            Err(e) => {
                warn!("Failed to read light sensor: {:?}", e);
                self.log_line(format_args!("Failed to read light sensor"));
            }
        }
    }

    fn log_line(&mut self, args: fmt::Arguments<'_>) {
        emit(self.codec.write_log(args), "log");
    }

    fn report_calibration_event(&mut self) {
        let Some(event) = self.engine.take_event() else {
            return;
        };

        match event {
            CalibrationEvent::BaselineRestored(baseline) => self.log_line(format_args!(
                "Setting new baseline: {}, {}",
                baseline.co2, baseline.voc
            )),
            CalibrationEvent::BaselineMissing => {
                self.log_line(format_args!("No valid baseline in storage, not setting."))
            }
            CalibrationEvent::BaselineSaved(baseline) => self.log_line(format_args!(
                "Saving baseline: {}, {}",
                baseline.co2, baseline.voc
            )),
            CalibrationEvent::BaselineSaveFailed(e) => {
                self.log_line(format_args!("Failed to save baseline: {}", e))
            }
            CalibrationEvent::CalibrationStarted => {
                self.log_line(format_args!("Starting calibration."))
            }
        }
    }
}
