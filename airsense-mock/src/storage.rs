use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;

use airsense_embedded::{ByteStorage, ERASED_BYTE};

/// EEPROM stand-in backed by a file. Every write is flushed to disk
/// before it returns.
pub struct FileStorage {
    path: PathBuf,
    data: Vec<u8>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> io::Result<Self> {
        let path = path.into();

        let mut data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        data.resize(capacity, ERASED_BYTE);

        Ok(Self { path, data })
    }

    fn out_of_range(address: usize) -> io::Error {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("address {address} is out of range"),
        )
    }
}

impl ByteStorage for FileStorage {
    type Error = io::Error;

    fn read_byte(&mut self, address: usize) -> Result<u8, Self::Error> {
        self.data
            .get(address)
            .copied()
            .ok_or_else(|| Self::out_of_range(address))
    }

    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), Self::Error> {
        let byte = self
            .data
            .get_mut(address)
            .ok_or_else(|| Self::out_of_range(address))?;
        *byte = value;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, &self.data)
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}
