use crate::error::StorageError;

/// Default capacity of [`MemoryStorage`], the EEPROM size of the classic
/// 8-bit controller boards.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Byte-addressable non-volatile memory.
pub trait ByteStorage {
    fn capacity(&self) -> usize;

    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    fn write(&mut self, address: usize, bytes: &[u8]) -> Result<(), StorageError>;
}

fn check_range(address: usize, len: usize, capacity: usize) -> Result<(), StorageError> {
    match address.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StorageError::OutOfRange {
            address,
            len,
            capacity,
        }),
    }
}

/// RAM-backed storage image. Starts erased (every byte 0xFF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MemoryStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0xFF; capacity],
        }
    }

    /// Wraps an existing image, e.g. one read back from a file.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteStorage for MemoryStorage {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        check_range(address, buf.len(), self.bytes.len())?;
        buf.copy_from_slice(&self.bytes[address..address + buf.len()]);
        Ok(())
    }

    fn write(&mut self, address: usize, bytes: &[u8]) -> Result<(), StorageError> {
        check_range(address, bytes.len(), self.bytes.len())?;
        self.bytes[address..address + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
