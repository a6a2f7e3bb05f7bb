mod sgp30;

pub use sgp30::*;

/// Largest absolute humidity accepted for compensation, in mg/m^3
pub const MAX_ABSOLUTE_HUMIDITY: u32 = 256_000;

/// One reading of the gas sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IaqMeasurement {
    /// Total VOC in ppb
    pub voc_ppb: u16,
    /// Equivalent CO2 in ppm
    pub co2_eq_ppm: u16,
}

/// The gas sensor's drift-compensation reference values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IaqBaseline {
    pub co2: u16,
    pub voc: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Temperature in Celsius
    pub temperature_c: f32,
    /// Relative humidity in percent
    pub relative_humidity: f32,
}

/// Capabilities the calibration engine needs from a gas sensor.
///
/// Every call is a bus transaction and may fail; failures are transient.
pub trait IaqSensor {
    type Error: core::fmt::Debug;

    fn init(&mut self) -> Result<(), Self::Error>;

    /// Set humidity compensation, absolute humidity in mg/m^3. Zero disables it.
    fn set_humidity(&mut self, absolute_humidity: u32) -> Result<(), Self::Error>;

    fn measure(&mut self) -> Result<IaqMeasurement, Self::Error>;

    fn get_baseline(&mut self) -> Result<IaqBaseline, Self::Error>;

    fn set_baseline(&mut self, baseline: IaqBaseline) -> Result<(), Self::Error>;
}

pub trait ClimateSensor {
    type Error: core::fmt::Debug;

    fn read_climate(&mut self) -> Result<ClimateReading, Self::Error>;
}

pub trait LightSensor {
    type Error: core::fmt::Debug;

    /// Light intensity in lux
    fn read_lux(&mut self) -> Result<f32, Self::Error>;
}

/// Absolute humidity in mg/m^3 from temperature (Celsius) and relative
/// humidity (percent), using the Magnus approximation.
pub fn absolute_humidity(temperature_c: f32, relative_humidity: f32) -> f32 {
    let saturation_pressure =
        6.112 * libm::expf((17.62 * temperature_c) / (243.12 + temperature_c));
    let grams_per_m3 =
        216.7 * ((relative_humidity / 100.0) * saturation_pressure / (273.15 + temperature_c));

    grams_per_m3 * 1000.0
}
