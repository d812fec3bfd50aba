//! LS8 memory subsystem.
//!
//! 256 byte-wide cells addressed by a single 8-bit address. All address
//! arithmetic wraps modulo 256, so every `u8` is a valid address.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of memory cells in the LS8.
pub const MEMORY_SIZE: usize = 256;

/// LS8 memory: 256 eight-bit cells.
///
/// Serializes as a flat array of cells. Deserializing anything other than
/// exactly [`MEMORY_SIZE`] cells fails.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a cell.
    #[inline]
    pub fn read(&self, addr: u8) -> u8 {
        self.cells[addr as usize]
    }

    /// Write a cell.
    #[inline]
    pub fn write(&mut self, addr: u8, value: u8) {
        self.cells[addr as usize] = value;
    }

    /// Read `addr + offset`, wrapping past the top of memory.
    #[inline]
    pub fn read_offset(&self, addr: u8, offset: u8) -> u8 {
        self.read(addr.wrapping_add(offset))
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Load a program image starting at address 0.
    ///
    /// Images longer than memory are not rejected: byte `i` lands at
    /// `i mod 256`, overwriting whatever the earlier part of the image
    /// put there. Returns the number of bytes written.
    pub fn load_program(&mut self, program: &[u8]) -> usize {
        if program.len() > MEMORY_SIZE {
            log::warn!(
                "program image is {} bytes, wrapping past address 0xFF",
                program.len()
            );
        }

        let mut addr: u8 = 0;
        for &byte in program {
            self.write(addr, byte);
            addr = addr.wrapping_add(1);
        }

        log::debug!("loaded {} bytes into memory", program.len());
        program.len()
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(u8, u8)> {
        let end = (start + count).min(MEMORY_SIZE);
        (start..end)
            .map(|i| (i as u8, self.cells[i]))
            .collect()
    }

    /// All cells, address order.
    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<u8>> for Memory {
    type Error = MemoryError;

    fn try_from(cells: Vec<u8>) -> Result<Self, Self::Error> {
        if cells.len() != MEMORY_SIZE {
            return Err(MemoryError::WrongSize(cells.len()));
        }
        Ok(Self { cells })
    }
}

impl From<Memory> for Vec<u8> {
    fn from(mem: Memory) -> Self {
        mem.cells
    }
}

/// Errors building memory from raw cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory must have exactly 256 cells, found {0}")]
    WrongSize(usize),
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();

        mem.write(10, 42);
        assert_eq!(mem.read(10), 42);
        assert_eq!(mem.read(11), 0);
    }

    #[test]
    fn test_read_offset_wraps() {
        let mut mem = Memory::new();
        mem.write(0x00, 7);
        mem.write(0x01, 9);

        assert_eq!(mem.read_offset(0xFF, 1), 7);
        assert_eq!(mem.read_offset(0xFF, 2), 9);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        let written = mem.load_program(&[1, 2, 3]);

        assert_eq!(written, 3);
        assert_eq!(mem.read(0), 1);
        assert_eq!(mem.read(1), 2);
        assert_eq!(mem.read(2), 3);
    }

    #[test]
    fn test_oversized_program_wraps() {
        let mut mem = Memory::new();
        let mut program = vec![0xAA; MEMORY_SIZE];
        program.push(0x55);
        program.push(0x66);

        mem.load_program(&program);

        assert_eq!(mem.read(0), 0x55);
        assert_eq!(mem.read(1), 0x66);
        assert_eq!(mem.read(2), 0xAA);
        assert_eq!(mem.read(0xFF), 0xAA);
    }

    #[test]
    fn test_clear() {
        let mut mem = Memory::new();
        mem.load_program(&[9, 9, 9]);
        mem.clear();

        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_snapshot_keeps_cells() {
        let mut mem = Memory::new();
        mem.write(0x10, 0x42);

        let json = serde_json::to_string(&mem).unwrap();
        let restored: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.read(0x10), 0x42);
        assert_eq!(restored.as_slice().len(), MEMORY_SIZE);
    }

    #[test]
    fn test_short_snapshot_rejected() {
        let result = serde_json::from_str::<Memory>("[1]");
        assert!(result.is_err());

        let err = Memory::try_from(vec![0; 300]).unwrap_err();
        assert_eq!(err, MemoryError::WrongSize(300));
    }
}
