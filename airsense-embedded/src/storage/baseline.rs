use core::fmt::Debug;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::sensor::IaqBaseline;

use super::ByteStorage;

/// Big-endian VOC baseline, two bytes
pub const VOC_BASELINE_ADDR: usize = 0x00;
/// Big-endian CO2 baseline, two bytes
pub const CO2_BASELINE_ADDR: usize = 0x02;
/// Validity marker, written last
pub const BASELINE_VALID_ADDR: usize = 0x04;
/// Bytes occupied by the record
pub const BASELINE_RECORD_LEN: usize = 5;

/// The only marker value treated as valid; erased cells read as invalid
pub const BASELINE_VALID: u8 = 0x01;
pub const BASELINE_INVALID: u8 = 0x00;

/// The persisted calibration baseline.
///
/// The numeric fields are meaningless unless `valid` is set; use
/// [`BaselineRecord::baseline`] to read them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaselineRecord {
    pub voc_baseline: u16,
    pub co2_baseline: u16,
    pub valid: bool,
}

impl BaselineRecord {
    pub const fn invalid() -> Self {
        Self {
            voc_baseline: 0,
            co2_baseline: 0,
            valid: false,
        }
    }

    pub const fn from_baseline(baseline: IaqBaseline) -> Self {
        Self {
            voc_baseline: baseline.voc,
            co2_baseline: baseline.co2,
            valid: true,
        }
    }

    pub fn baseline(&self) -> Option<IaqBaseline> {
        self.valid.then_some(IaqBaseline {
            co2: self.co2_baseline,
            voc: self.voc_baseline,
        })
    }
}

fn storage_error<E: Debug>(error: E) -> Error {
    warn!("Baseline storage access failed: {:?}", error);
    Error::Storage
}

/// Keeps exactly one [`BaselineRecord`] at fixed offsets of a [`ByteStorage`].
pub struct BaselineStore<S> {
    storage: S,
}

impl<S> BaselineStore<S>
where
    S: ByteStorage,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Read the stored record, decoding the numeric fields only when the
    /// validity marker is set.
    pub fn load(&mut self) -> Result<BaselineRecord> {
        let marker = self
            .storage
            .read_byte(BASELINE_VALID_ADDR)
            .map_err(storage_error)?;

        if marker != BASELINE_VALID {
            return Ok(BaselineRecord::invalid());
        }

        Ok(BaselineRecord {
            voc_baseline: self.read_u16(VOC_BASELINE_ADDR)?,
            co2_baseline: self.read_u16(CO2_BASELINE_ADDR)?,
            valid: true,
        })
    }

    /// Persist `baseline` and mark it valid.
    ///
    /// An identical valid record is left untouched. Otherwise the marker is
    /// cleared before the fields change and set again only after both are
    /// written, so an interrupted save never leaves a torn record marked valid.
    pub fn save(&mut self, baseline: IaqBaseline) -> Result<()> {
        let current = self.load()?;
        if current.baseline() == Some(baseline) {
            debug!("Stored baseline unchanged, skipping write");
            return Ok(());
        }

        if current.valid {
            self.invalidate()?;
        }

        self.update_u16(VOC_BASELINE_ADDR, baseline.voc)?;
        self.update_u16(CO2_BASELINE_ADDR, baseline.co2)?;
        self.storage
            .update_byte(BASELINE_VALID_ADDR, BASELINE_VALID)
            .map_err(storage_error)?;

        Ok(())
    }

    /// Clear the validity marker. Durable once this returns `Ok`.
    pub fn invalidate(&mut self) -> Result<()> {
        self.storage
            .update_byte(BASELINE_VALID_ADDR, BASELINE_INVALID)
            .map_err(storage_error)?;
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn read_u16(&mut self, address: usize) -> Result<u16> {
        let high = self.storage.read_byte(address).map_err(storage_error)?;
        let low = self.storage.read_byte(address + 1).map_err(storage_error)?;
        Ok(u16::from_be_bytes([high, low]))
    }

    fn update_u16(&mut self, address: usize, value: u16) -> Result<()> {
        let [high, low] = value.to_be_bytes();
        self.storage
            .update_byte(address, high)
            .map_err(storage_error)?;
        self.storage
            .update_byte(address + 1, low)
            .map_err(storage_error)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use crate::storage::MemoryStorage;

    /// Storage that loses power after a fixed number of writes: every write
    /// past the budget fails and leaves the medium untouched.
    pub struct PowerCutStorage {
        pub inner: MemoryStorage<BASELINE_RECORD_LEN>,
        pub writes_left: usize,
    }

    impl PowerCutStorage {
        pub fn new(inner: MemoryStorage<BASELINE_RECORD_LEN>, writes_left: usize) -> Self {
            Self { inner, writes_left }
        }
    }

    impl ByteStorage for PowerCutStorage {
        type Error = Error;

        fn read_byte(&mut self, address: usize) -> core::result::Result<u8, Self::Error> {
            self.inner.read_byte(address)
        }

        fn write_byte(
            &mut self,
            address: usize,
            value: u8,
        ) -> core::result::Result<(), Self::Error> {
            if self.writes_left == 0 {
                return Err(Error::Storage);
            }
            self.writes_left -= 1;
            self.inner.write_byte(address, value)
        }

        fn capacity(&self) -> usize {
            self.inner.capacity()
        }
    }

    /// Storage on a dead bus: every access fails
    pub struct UnreadableStorage;

    impl ByteStorage for UnreadableStorage {
        type Error = Error;

        fn read_byte(&mut self, _address: usize) -> core::result::Result<u8, Self::Error> {
            Err(Error::Bus)
        }

        fn write_byte(
            &mut self,
            _address: usize,
            _value: u8,
        ) -> core::result::Result<(), Self::Error> {
            Err(Error::Bus)
        }

        fn capacity(&self) -> usize {
            BASELINE_RECORD_LEN
        }
    }
}
