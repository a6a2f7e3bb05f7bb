use log::{error, info, warn};

use crate::clock::{Clock, elapsed_ms};
use crate::error::{Error, Result};
use crate::sensor::{IaqBaseline, IaqMeasurement, IaqSensor, MAX_ABSOLUTE_HUMIDITY};
use crate::storage::{BaselineRecord, BaselineStore, ByteStorage};

/// Warm-up before the first baseline may be trusted
pub const INITIAL_CALIBRATION_MS: u32 = 12 * 60 * 60 * 1000;
/// Interval between baseline saves once calibrated
pub const BASELINE_SAVE_PERIOD_MS: u32 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationConfig {
    pub initial_calibration_ms: u32,
    pub baseline_save_period_ms: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            initial_calibration_ms: INITIAL_CALIBRATION_MS,
            baseline_save_period_ms: BASELINE_SAVE_PERIOD_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    /// Booted without a stored baseline
    Uncalibrated,
    /// A calibration cycle was explicitly restarted
    Calibrating,
    /// Readings are backed by a trusted baseline
    Calibrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationState {
    status: CalibrationStatus,
    /// Start of the running calibration cycle, or time of the last save once
    /// calibrated
    calibration_started_at: u32,
}

impl CalibrationState {
    const fn new(status: CalibrationStatus, now: u32) -> Self {
        Self {
            status,
            calibration_started_at: now,
        }
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    pub fn is_calibrated(&self) -> bool {
        self.status == CalibrationStatus::Calibrated
    }

    pub fn calibration_started_at(&self) -> u32 {
        self.calibration_started_at
    }
}

/// Notable calibration transitions, kept for the driver to report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationEvent {
    BaselineRestored(IaqBaseline),
    BaselineMissing,
    BaselineSaved(IaqBaseline),
    BaselineSaveFailed(Error),
    CalibrationStarted,
}

/// Convert absolute humidity in mg/m^3 to the sensor's compensation value.
/// Anything unusable disables compensation.
fn compensation_humidity(absolute_humidity: f32) -> u32 {
    if !absolute_humidity.is_finite() || absolute_humidity <= 0.0 {
        return 0;
    }

    (absolute_humidity as u32).min(MAX_ABSOLUTE_HUMIDITY)
}

/// Gas sensor wrapper that keeps the sensor's baseline in sync with
/// persistent storage.
///
/// A stored baseline is pushed into the sensor at [`begin`](Self::begin). If
/// there is none, the sensor has to run for the initial calibration period
/// before its own baseline is saved and readings count as calibrated. After
/// that the baseline is saved again every refresh period.
pub struct AirQuality<S, E, C> {
    sensor: S,
    store: BaselineStore<E>,
    clock: C,
    config: CalibrationConfig,
    state: CalibrationState,
    event: Option<CalibrationEvent>,
}

impl<S, E, C> AirQuality<S, E, C>
where
    S: IaqSensor,
    E: ByteStorage,
    C: Clock,
{
    pub fn new(sensor: S, storage: E, clock: C, config: CalibrationConfig) -> Self {
        let now = clock.now_ms();
        Self {
            sensor,
            store: BaselineStore::new(storage),
            clock,
            config,
            state: CalibrationState::new(CalibrationStatus::Uncalibrated, now),
            event: None,
        }
    }

    /// Bring the sensor up and restore a stored baseline if there is one.
    pub fn begin(&mut self) -> Result<()> {
        if let Err(e) = self.sensor.init() {
            error!("Failed to initialize the air quality sensor: {:?}", e);
            return Err(Error::SensorInit);
        }

        self.state = CalibrationState::new(CalibrationStatus::Uncalibrated, self.clock.now_ms());
        self.restore_baseline();
        Ok(())
    }

    /// Measure VOC and eCO2 with humidity compensation.
    ///
    /// `absolute_humidity` is in mg/m^3. Also advances the calibration
    /// lifecycle. A sensor failure leaves the calibration state untouched, so
    /// a due baseline save is retried on the next call.
    pub fn read_air_quality(&mut self, absolute_humidity: f32) -> Result<IaqMeasurement> {
        self.sensor
            .set_humidity(compensation_humidity(absolute_humidity))
            .map_err(|e| {
                warn!("Failed to set humidity compensation: {:?}", e);
                Error::SensorRead
            })?;

        let measurement = self.sensor.measure().map_err(|e| {
            warn!("Failed to read from the air quality sensor: {:?}", e);
            Error::SensorRead
        })?;

        self.update_calibration();
        Ok(measurement)
    }

    /// Throw away the stored baseline and begin a new calibration cycle.
    ///
    /// The stored baseline is invalidated before the in-memory state changes;
    /// if that write fails nothing changes and the error is returned.
    pub fn start_calibration(&mut self) -> Result<()> {
        info!("Starting calibration.");

        self.store.invalidate()?;
        self.state = CalibrationState::new(CalibrationStatus::Calibrating, self.clock.now_ms());
        self.event = Some(CalibrationEvent::CalibrationStarted);
        Ok(())
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.is_calibrated()
    }

    pub fn status(&self) -> CalibrationStatus {
        self.state.status()
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Most recent calibration event since the last call
    pub fn take_event(&mut self) -> Option<CalibrationEvent> {
        self.event.take()
    }

    /// Read the persisted record
    pub fn stored_baseline(&mut self) -> Result<BaselineRecord> {
        self.store.load()
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    fn restore_baseline(&mut self) {
        let record = match self.store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to load baseline: {}", e);
                self.event = Some(CalibrationEvent::BaselineMissing);
                return;
            }
        };

        let Some(baseline) = record.baseline() else {
            info!("No valid baseline in storage, not setting.");
            self.event = Some(CalibrationEvent::BaselineMissing);
            return;
        };

        if let Err(e) = self.sensor.set_baseline(baseline) {
            warn!("Failed to restore baseline into the sensor: {:?}", e);
            self.event = Some(CalibrationEvent::BaselineMissing);
            return;
        }

        info!("Setting new baseline: {}, {}", baseline.co2, baseline.voc);
        self.state.status = CalibrationStatus::Calibrated;
        self.event = Some(CalibrationEvent::BaselineRestored(baseline));
    }

    fn update_calibration(&mut self) {
        let now = self.clock.now_ms();
        let elapsed = elapsed_ms(self.state.calibration_started_at, now);

        let due = match self.state.status {
            CalibrationStatus::Calibrated => elapsed >= self.config.baseline_save_period_ms,
            CalibrationStatus::Uncalibrated | CalibrationStatus::Calibrating => {
                elapsed >= self.config.initial_calibration_ms
            }
        };

        if !due {
            return;
        }

        if !self.state.is_calibrated() {
            info!("Saving initial baseline.");
        }

        match self.save_baseline() {
            Ok(baseline) => {
                self.state = CalibrationState::new(CalibrationStatus::Calibrated, now);
                self.event = Some(CalibrationEvent::BaselineSaved(baseline));
            }
            Err(e) => {
                warn!("Failed to save baseline: {}", e);
                self.event = Some(CalibrationEvent::BaselineSaveFailed(e));
            }
        }
    }

    fn save_baseline(&mut self) -> Result<IaqBaseline> {
        let baseline = self.sensor.get_baseline().map_err(|e| {
            warn!("Failed to read baseline from the sensor: {:?}", e);
            Error::SensorRead
        })?;

        info!("Saving baseline: {}, {}", baseline.co2, baseline.voc);
        self.store.save(baseline)?;
        Ok(baseline)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::FakeIaqSensor;
    use super::*;
    use crate::clock::mock::MockClock;
    use crate::storage::mock::{PowerCutStorage, UnreadableStorage};
    use crate::storage::{BASELINE_RECORD_LEN, MemoryStorage};

    const MINUTE_MS: u32 = 60 * 1000;
    const STORED: IaqBaseline = IaqBaseline {
        co2: 0x8A00,
        voc: 0x8B00,
    };

    type Storage = MemoryStorage<BASELINE_RECORD_LEN>;

    fn stored(baseline: IaqBaseline) -> Storage {
        let mut store = BaselineStore::new(Storage::new());
        store.save(baseline).unwrap();
        store.into_inner()
    }

    fn engine<'a, E: ByteStorage>(
        storage: E,
        clock: &'a MockClock,
    ) -> AirQuality<FakeIaqSensor, E, &'a MockClock> {
        let mut engine = AirQuality::new(
            FakeIaqSensor::default(),
            storage,
            clock,
            CalibrationConfig::default(),
        );
        engine.begin().unwrap();
        engine
    }

    #[test]
    fn test_begin_without_baseline() {
        let clock = MockClock::default();
        let mut engine = engine(Storage::new(), &clock);

        assert_eq!(engine.status(), CalibrationStatus::Uncalibrated);
        assert!(!engine.is_calibrated());
        assert_eq!(engine.sensor().pushed_baseline, None);
        assert_eq!(engine.take_event(), Some(CalibrationEvent::BaselineMissing));
        assert_eq!(engine.take_event(), None);
    }

    #[test]
    fn test_begin_restores_stored_baseline() {
        let clock = MockClock::default();
        let mut engine = engine(stored(STORED), &clock);

        assert!(engine.is_calibrated());
        assert_eq!(engine.sensor().pushed_baseline, Some(STORED));
        assert_eq!(
            engine.take_event(),
            Some(CalibrationEvent::BaselineRestored(STORED))
        );
    }

    #[test]
    fn test_begin_sensor_failure() {
        let clock = MockClock::default();
        let sensor = FakeIaqSensor {
            fail_init: true,
            ..Default::default()
        };
        let mut engine =
            AirQuality::new(sensor, Storage::new(), &clock, CalibrationConfig::default());

        assert_eq!(engine.begin(), Err(Error::SensorInit));
        assert!(!engine.is_calibrated());
    }

    #[test]
    fn test_begin_baseline_push_failure() {
        let clock = MockClock::default();
        let sensor = FakeIaqSensor {
            fail_set_baseline: true,
            ..Default::default()
        };
        let mut engine =
            AirQuality::new(sensor, stored(STORED), &clock, CalibrationConfig::default());

        assert_eq!(engine.begin(), Ok(()));
        assert_eq!(engine.status(), CalibrationStatus::Uncalibrated);
        assert_eq!(engine.sensor().pushed_baseline, None);
        assert_eq!(engine.take_event(), Some(CalibrationEvent::BaselineMissing));
    }

    #[test]
    fn test_begin_with_unreadable_storage() {
        let clock = MockClock::default();
        let mut engine = AirQuality::new(
            FakeIaqSensor::default(),
            UnreadableStorage,
            &clock,
            CalibrationConfig::default(),
        );

        assert_eq!(engine.begin(), Ok(()));
        assert_eq!(engine.status(), CalibrationStatus::Uncalibrated);
        assert_eq!(engine.sensor().pushed_baseline, None);
        assert_eq!(engine.take_event(), Some(CalibrationEvent::BaselineMissing));
    }

    #[test]
    fn test_initial_calibration_saves_exactly_once() {
        let clock = MockClock::default();
        let mut engine = engine(Storage::new(), &clock);
        let mut transitions = 0;

        // One read a minute until just before the first refresh is due
        for minute in 1..780 {
            clock.advance(MINUTE_MS);
            let was_calibrated = engine.is_calibrated();
            engine.read_air_quality(11_500.0).unwrap();

            if !was_calibrated && engine.is_calibrated() {
                transitions += 1;
                assert_eq!(minute, 720);
            }
            assert_eq!(engine.is_calibrated(), minute >= 720, "minute {}", minute);
        }

        assert_eq!(transitions, 1);
        assert_eq!(engine.sensor().baseline_reads, 1);
        assert_eq!(
            engine.stored_baseline().unwrap().baseline(),
            Some(engine.sensor().baseline)
        );
    }

    #[test]
    fn test_periodic_refresh() {
        let clock = MockClock::default();
        let mut engine = engine(stored(STORED), &clock);

        clock.advance(59 * MINUTE_MS);
        engine.read_air_quality(0.0).unwrap();
        assert_eq!(engine.sensor().baseline_reads, 0);

        engine.sensor_mut().baseline = IaqBaseline { co2: 1, voc: 2 };
        clock.advance(MINUTE_MS);
        engine.read_air_quality(0.0).unwrap();

        assert!(engine.is_calibrated());
        assert_eq!(engine.sensor().baseline_reads, 1);
        assert_eq!(
            engine.stored_baseline().unwrap().baseline(),
            Some(IaqBaseline { co2: 1, voc: 2 })
        );
        assert_eq!(
            engine.take_event(),
            Some(CalibrationEvent::BaselineSaved(IaqBaseline { co2: 1, voc: 2 }))
        );

        clock.advance(60 * MINUTE_MS);
        engine.read_air_quality(0.0).unwrap();
        assert_eq!(engine.sensor().baseline_reads, 2);
        assert!(engine.is_calibrated());
    }

    #[test]
    fn test_start_calibration_from_calibrated() {
        let clock = MockClock::default();
        let mut engine = engine(stored(STORED), &clock);
        assert!(engine.is_calibrated());

        clock.advance(5 * MINUTE_MS);
        engine.start_calibration().unwrap();

        assert!(!engine.is_calibrated());
        assert_eq!(engine.status(), CalibrationStatus::Calibrating);
        assert!(!engine.stored_baseline().unwrap().valid);
        assert_eq!(engine.state().calibration_started_at(), 5 * MINUTE_MS);
        assert_eq!(engine.take_event(), Some(CalibrationEvent::CalibrationStarted));

        // The refresh period no longer applies; a full cycle is needed again
        clock.advance(60 * MINUTE_MS);
        engine.read_air_quality(0.0).unwrap();
        assert!(!engine.is_calibrated());
        assert_eq!(engine.sensor().baseline_reads, 0);

        clock.advance(INITIAL_CALIBRATION_MS - 60 * MINUTE_MS);
        engine.read_air_quality(0.0).unwrap();
        assert!(engine.is_calibrated());
        assert!(engine.stored_baseline().unwrap().valid);
    }

    #[test]
    fn test_start_calibration_from_uncalibrated() {
        let clock = MockClock::default();
        let mut engine = engine(Storage::new(), &clock);

        clock.advance(11 * 60 * MINUTE_MS);
        engine.start_calibration().unwrap();

        clock.advance(2 * 60 * MINUTE_MS);
        engine.read_air_quality(0.0).unwrap();

        assert!(!engine.is_calibrated());
        assert!(!engine.stored_baseline().unwrap().valid);
    }

    #[test]
    fn test_restarting_calibration_resets_timer() {
        let clock = MockClock::default();
        let mut engine = engine(Storage::new(), &clock);
        engine.start_calibration().unwrap();

        clock.advance(INITIAL_CALIBRATION_MS - MINUTE_MS);
        engine.start_calibration().unwrap();
        assert_eq!(engine.status(), CalibrationStatus::Calibrating);

        clock.advance(MINUTE_MS);
        engine.read_air_quality(0.0).unwrap();
        assert!(!engine.is_calibrated());

        clock.advance(INITIAL_CALIBRATION_MS - MINUTE_MS);
        engine.read_air_quality(0.0).unwrap();
        assert!(engine.is_calibrated());
        assert_eq!(engine.sensor().baseline_reads, 1);
    }

    #[test]
    fn test_start_calibration_storage_failure_keeps_state() {
        let clock = MockClock::default();
        let mut engine = engine(PowerCutStorage::new(stored(STORED), 0), &clock);
        assert!(engine.is_calibrated());

        assert_eq!(engine.start_calibration(), Err(Error::Storage));
        assert!(engine.is_calibrated());
        assert!(engine.stored_baseline().unwrap().valid);
    }

    #[test]
    fn test_read_failure_has_no_side_effects() {
        let clock = MockClock::default();
        let mut engine = engine(Storage::new(), &clock);
        engine.take_event();

        clock.advance(INITIAL_CALIBRATION_MS);
        engine.sensor_mut().fail_measure = true;

        assert_eq!(engine.read_air_quality(0.0), Err(Error::SensorRead));
        assert!(!engine.is_calibrated());
        assert_eq!(engine.sensor().baseline_reads, 0);
        assert_eq!(engine.state().calibration_started_at(), 0);
        assert_eq!(engine.take_event(), None);

        // Retried on the next cycle
        engine.sensor_mut().fail_measure = false;
        let measurement = engine.read_air_quality(0.0).unwrap();
        assert_eq!(measurement.co2_eq_ppm, 400);
        assert_eq!(measurement.voc_ppb, 12);
        assert!(engine.is_calibrated());
    }

    #[test]
    fn test_humidity_failure_has_no_side_effects() {
        let clock = MockClock::default();
        let mut engine = engine(Storage::new(), &clock);
        engine.take_event();

        clock.advance(INITIAL_CALIBRATION_MS);
        engine.sensor_mut().fail_humidity = true;

        assert_eq!(engine.read_air_quality(9_000.0), Err(Error::SensorRead));
        assert_eq!(engine.status(), CalibrationStatus::Uncalibrated);
        assert_eq!(engine.state().calibration_started_at(), 0);
        assert_eq!(engine.sensor().baseline_reads, 0);
        assert_eq!(engine.take_event(), None);
        assert!(!engine.stored_baseline().unwrap().valid);
    }

    #[test]
    fn test_save_failure_is_retried() {
        let clock = MockClock::default();
        let mut engine = engine(Storage::new(), &clock);

        clock.advance(INITIAL_CALIBRATION_MS);
        engine.sensor_mut().fail_baseline = true;

        assert!(engine.read_air_quality(0.0).is_ok());
        assert!(!engine.is_calibrated());
        assert_eq!(
            engine.take_event(),
            Some(CalibrationEvent::BaselineSaveFailed(Error::SensorRead))
        );

        engine.sensor_mut().fail_baseline = false;
        engine.read_air_quality(0.0).unwrap();
        assert!(engine.is_calibrated());
    }

    #[test]
    fn test_calibration_across_clock_wraparound() {
        let clock = MockClock::starting_at(u32::MAX - 1000);
        let mut engine = engine(Storage::new(), &clock);

        clock.advance(INITIAL_CALIBRATION_MS - 1);
        engine.read_air_quality(0.0).unwrap();
        assert!(!engine.is_calibrated());

        clock.advance(1);
        engine.read_air_quality(0.0).unwrap();
        assert!(engine.is_calibrated());
    }

    #[test]
    fn test_humidity_compensation_value() {
        assert_eq!(compensation_humidity(11_500.7), 11_500);
        assert_eq!(compensation_humidity(-3.0), 0);
        assert_eq!(compensation_humidity(f32::NAN), 0);
        assert_eq!(compensation_humidity(1.0e9), MAX_ABSOLUTE_HUMIDITY);

        let clock = MockClock::default();
        let mut engine = engine(Storage::new(), &clock);
        engine.read_air_quality(9_120.0).unwrap();
        assert_eq!(engine.sensor().humidity, Some(9_120));
    }
}
