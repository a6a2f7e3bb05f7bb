use std::convert::Infallible;
use std::f64::consts::PI;

use airsense_embedded::{
    ClimateReading, ClimateSensor, Clock, IaqBaseline, IaqMeasurement, IaqSensor, LightSensor,
    MonotonicClock,
};
use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Monotonic clock running `scale` times faster than real time.
#[derive(Debug, Clone)]
pub struct ScaledClock {
    inner: MonotonicClock,
    scale: u32,
}

impl ScaledClock {
    pub fn new(scale: u32) -> Self {
        Self {
            inner: MonotonicClock::new(),
            scale: scale.max(1),
        }
    }

    /// Simulated milliseconds since start, without wraparound
    pub fn scaled_uptime_ms(&self) -> u64 {
        self.inner.uptime_ms().saturating_mul(u64::from(self.scale))
    }

    pub fn day_fraction(&self) -> f64 {
        day_fraction_at(self.scaled_uptime_ms())
    }
}

impl Clock for ScaledClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound
        self.scaled_uptime_ms() as u32
    }
}

/// Position within the simulated day, 0.0 at midnight
pub fn day_fraction_at(uptime_ms: u64) -> f64 {
    (uptime_ms % DAY_MS) as f64 / DAY_MS as f64
}

pub fn simulation_lux(day_fraction: f64) -> f64 {
    let radians = day_fraction * 2.0 * PI;

    const MAX_SUNLIGHT_LUX: f64 = 500.0;
    const MAX_MOONLIGHT_LUX: f64 = 5.0;

    const SUNRISE_START: f64 = 0.23;
    const SUNRISE_END: f64 = 0.25;
    const SUNSET_START: f64 = 0.73;
    const SUNSET_END: f64 = 0.75;

    if (SUNRISE_START..=SUNSET_END).contains(&day_fraction) {
        if day_fraction <= SUNRISE_END {
            let sunrise = (day_fraction - SUNRISE_START) / (SUNRISE_END - SUNRISE_START);
            (sunrise * PI / 2.0).sin() * MAX_SUNLIGHT_LUX
        } else if day_fraction >= SUNSET_START {
            let sunset = (day_fraction - SUNSET_START) / (SUNSET_END - SUNSET_START);
            (sunset * PI / 2.0).cos() * MAX_SUNLIGHT_LUX
        } else {
            MAX_SUNLIGHT_LUX
        }
    } else {
        // Moonlight peaks at midnight
        (radians + PI).cos().max(0.0) * (MAX_MOONLIGHT_LUX - 0.01) + 0.01
    }
}

/// Relative humidity in percent
pub fn simulated_humidity(day_fraction: f64) -> f64 {
    let radians = day_fraction * 2.0 * PI;

    if (0.3..=0.7).contains(&day_fraction) {
        radians.sin().max(0.0) * 25.0 + 35.0
    } else {
        radians.cos().max(0.0) * 20.0 + 40.0
    }
}

/// Indoor temperature in Celsius, warmest mid-afternoon
pub fn simulated_temperature(day_fraction: f64) -> f64 {
    let radians = (day_fraction - 0.375) * 2.0 * PI;
    20.0 + radians.sin() * 3.0
}

/// Occupancy drives CO2 and VOC: high during the day, low overnight
pub fn simulated_occupancy(day_fraction: f64) -> f64 {
    let radians = (day_fraction - 0.25) * 2.0 * PI;
    (radians.sin() * 0.5 + 0.5).clamp(0.0, 1.0)
}

pub struct SimulatedClimate {
    clock: ScaledClock,
    noise: Normal<f64>,
}

impl SimulatedClimate {
    pub fn new(clock: ScaledClock) -> Result<Self, NormalError> {
        Ok(Self {
            clock,
            noise: Normal::new(0.0, 0.1)?,
        })
    }
}

impl ClimateSensor for SimulatedClimate {
    type Error = Infallible;

    fn read_climate(&mut self) -> Result<ClimateReading, Self::Error> {
        let day_fraction = self.clock.day_fraction();
        let mut rng = rand::rng();

        Ok(ClimateReading {
            temperature_c: (simulated_temperature(day_fraction) + self.noise.sample(&mut rng))
                as f32,
            relative_humidity: (simulated_humidity(day_fraction) + self.noise.sample(&mut rng))
                .clamp(0.0, 100.0) as f32,
        })
    }
}

pub struct SimulatedLight {
    clock: ScaledClock,
}

impl SimulatedLight {
    pub fn new(clock: ScaledClock) -> Self {
        Self { clock }
    }
}

impl LightSensor for SimulatedLight {
    type Error = Infallible;

    fn read_lux(&mut self) -> Result<f32, Self::Error> {
        let jitter = rand::rng().random_range(0.97..1.03);
        Ok((simulation_lux(self.clock.day_fraction()) * jitter) as f32)
    }
}

/// Gas sensor whose baseline slowly drifts while it runs.
pub struct SimulatedIaqSensor {
    clock: ScaledClock,
    noise: Normal<f64>,
    baseline: IaqBaseline,
    humidity: u32,
}

impl SimulatedIaqSensor {
    pub fn new(clock: ScaledClock) -> Result<Self, NormalError> {
        Ok(Self {
            clock,
            noise: Normal::new(0.0, 5.0)?,
            baseline: IaqBaseline {
                co2: 0x8F10,
                voc: 0x9022,
            },
            humidity: 0,
        })
    }

    pub fn humidity(&self) -> u32 {
        self.humidity
    }
}

impl IaqSensor for SimulatedIaqSensor {
    type Error = Infallible;

    fn init(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_humidity(&mut self, absolute_humidity: u32) -> Result<(), Self::Error> {
        self.humidity = absolute_humidity;
        Ok(())
    }

    fn measure(&mut self) -> Result<IaqMeasurement, Self::Error> {
        let occupancy = simulated_occupancy(self.clock.day_fraction());
        let mut rng = rand::rng();

        let co2 = 400.0 + occupancy * 800.0 + self.noise.sample(&mut rng);
        let voc = occupancy * 250.0 + self.noise.sample(&mut rng);

        // Baseline tracks the sensor's long-term drift
        if rng.random_bool(0.01) {
            self.baseline.co2 = self.baseline.co2.wrapping_add(1);
            self.baseline.voc = self.baseline.voc.wrapping_add(1);
        }

        Ok(IaqMeasurement {
            co2_eq_ppm: co2.clamp(400.0, 60_000.0) as u16,
            voc_ppb: voc.clamp(0.0, 60_000.0) as u16,
        })
    }

    fn get_baseline(&mut self) -> Result<IaqBaseline, Self::Error> {
        Ok(self.baseline)
    }

    fn set_baseline(&mut self, baseline: IaqBaseline) -> Result<(), Self::Error> {
        self.baseline = baseline;
        Ok(())
    }
}
