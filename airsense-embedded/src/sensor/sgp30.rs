use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::error::Error;

use super::{IaqBaseline, IaqMeasurement, IaqSensor, MAX_ABSOLUTE_HUMIDITY};

pub const SGP30_ADDRESS: u8 = 0x58;

const GET_SERIAL_ID: [u8; 2] = [0x36, 0x82];
const GET_FEATURE_SET: [u8; 2] = [0x20, 0x2F];
const IAQ_INIT: [u8; 2] = [0x20, 0x03];
const MEASURE_IAQ: [u8; 2] = [0x20, 0x08];
const GET_IAQ_BASELINE: [u8; 2] = [0x20, 0x15];
const SET_IAQ_BASELINE: [u8; 2] = [0x20, 0x1E];
const SET_ABSOLUTE_HUMIDITY: [u8; 2] = [0x20, 0x61];

const FEATURE_SET_MASK: u16 = 0x00F0;
const FEATURE_SET: u16 = 0x0020;

const WORD_LEN: usize = 3;
const MAX_WORDS: usize = 3;

/// Sensirion CRC-8: polynomial 0x31, initial value 0xFF.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Convert mg/m^3 to the sensor's 8.8 fixed-point g/m^3 encoding.
fn humidity_word(absolute_humidity: u32) -> u16 {
    (((absolute_humidity as u64) * 256 * 16777) >> 24) as u16
}

/// Sensirion SGP30 gas sensor over I2C.
pub struct Sgp30<I, D> {
    i2c: I,
    delay: D,
    serial_number: Option<[u16; 3]>,
}

impl<I, D> Sgp30<I, D>
where
    I: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            serial_number: None,
        }
    }

    /// Serial number read during `init`
    pub fn serial_number(&self) -> Option<[u16; 3]> {
        self.serial_number
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    fn write_command(
        &mut self,
        command: [u8; 2],
        words: &[u16],
        delay_ms: u32,
    ) -> Result<(), Error> {
        let mut frame = [0u8; 2 + 2 * WORD_LEN];
        frame[..2].copy_from_slice(&command);

        let mut len = 2;
        for &word in words.iter().take(2) {
            let bytes = word.to_be_bytes();
            frame[len..len + 2].copy_from_slice(&bytes);
            frame[len + 2] = crc8(&bytes);
            len += WORD_LEN;
        }

        self.i2c
            .write(SGP30_ADDRESS, &frame[..len])
            .map_err(|_| Error::Bus)?;
        self.delay.delay_ms(delay_ms);
        Ok(())
    }

    fn read_words<const N: usize>(
        &mut self,
        command: [u8; 2],
        delay_ms: u32,
    ) -> Result<[u16; N], Error> {
        self.write_command(command, &[], delay_ms)?;

        let mut buffer = [0u8; MAX_WORDS * WORD_LEN];
        let buffer = &mut buffer[..N * WORD_LEN];
        self.i2c
            .read(SGP30_ADDRESS, buffer)
            .map_err(|_| Error::Bus)?;

        let mut words = [0u16; N];
        for (word, chunk) in words.iter_mut().zip(buffer.chunks_exact(WORD_LEN)) {
            if crc8(&chunk[..2]) != chunk[2] {
                return Err(Error::ChecksumMismatch);
            }
            *word = u16::from_be_bytes([chunk[0], chunk[1]]);
        }

        Ok(words)
    }
}

impl<I, D> IaqSensor for Sgp30<I, D>
where
    I: I2c,
    D: DelayNs,
{
    type Error = Error;

    fn init(&mut self) -> Result<(), Error> {
        let serial_number = self.read_words::<3>(GET_SERIAL_ID, 1)?;
        let [feature_set] = self.read_words::<1>(GET_FEATURE_SET, 10)?;

        if feature_set & FEATURE_SET_MASK != FEATURE_SET {
            return Err(Error::InitializationError);
        }

        self.write_command(IAQ_INIT, &[], 10)?;
        self.serial_number = Some(serial_number);

        info!(
            "SGP30: serial {:04x}{:04x}{:04x}, feature set {:#06x}",
            serial_number[0], serial_number[1], serial_number[2], feature_set
        );
        Ok(())
    }

    fn set_humidity(&mut self, absolute_humidity: u32) -> Result<(), Error> {
        if absolute_humidity > MAX_ABSOLUTE_HUMIDITY {
            return Err(Error::SensorReadingOutOfRange);
        }

        self.write_command(SET_ABSOLUTE_HUMIDITY, &[humidity_word(absolute_humidity)], 10)
    }

    fn measure(&mut self) -> Result<IaqMeasurement, Error> {
        let [co2_eq_ppm, voc_ppb] = self.read_words::<2>(MEASURE_IAQ, 12)?;
        Ok(IaqMeasurement {
            voc_ppb,
            co2_eq_ppm,
        })
    }

    fn get_baseline(&mut self) -> Result<IaqBaseline, Error> {
        let [co2, voc] = self.read_words::<2>(GET_IAQ_BASELINE, 10)?;
        Ok(IaqBaseline { co2, voc })
    }

    fn set_baseline(&mut self, baseline: IaqBaseline) -> Result<(), Error> {
        debug!("SGP30: set baseline co2={:#06x} voc={:#06x}", baseline.co2, baseline.voc);
        // The sensor expects the words in reverse order of get_baseline
        self.write_command(SET_IAQ_BASELINE, &[baseline.voc, baseline.co2], 10)
    }
}
