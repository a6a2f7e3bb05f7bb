use crate::error::Error;

use super::ByteStorage;

/// Value of a never-written cell
pub const ERASED_BYTE: u8 = 0xFF;

/// RAM-backed storage that starts out erased and counts physical writes.
pub struct MemoryStorage<const N: usize> {
    data: [u8; N],
    writes: usize,
}

impl<const N: usize> MemoryStorage<N> {
    pub const fn new() -> Self {
        Self {
            data: [ERASED_BYTE; N],
            writes: 0,
        }
    }

    /// Number of physical byte writes since creation
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }
}

impl<const N: usize> Default for MemoryStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteStorage for MemoryStorage<N> {
    type Error = Error;

    fn read_byte(&mut self, address: usize) -> Result<u8, Self::Error> {
        self.data.get(address).copied().ok_or(Error::InvalidAddress)
    }

    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), Self::Error> {
        let cell = self.data.get_mut(address).ok_or(Error::InvalidAddress)?;
        *cell = value;
        self.writes += 1;
        Ok(())
    }

    fn capacity(&self) -> usize {
        N
    }
}
