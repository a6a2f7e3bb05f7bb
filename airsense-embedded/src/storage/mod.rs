mod baseline;
mod memory;

pub use baseline::*;
pub use memory::*;

/// Byte-addressed non-volatile storage such as an EEPROM.
///
/// Writes are synchronous: once `write_byte` returns `Ok` the value survives
/// a power loss.
pub trait ByteStorage {
    type Error: core::fmt::Debug;

    fn read_byte(&mut self, address: usize) -> Result<u8, Self::Error>;

    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), Self::Error>;

    /// Write `value` only if it differs from the stored byte, sparing write
    /// endurance. Returns whether a physical write happened.
    fn update_byte(&mut self, address: usize, value: u8) -> Result<bool, Self::Error> {
        if self.read_byte(address)? == value {
            return Ok(false);
        }

        self.write_byte(address, value)?;
        Ok(true)
    }

    fn capacity(&self) -> usize;
}
