use thiserror::Error;

use crate::constants::{Address, Word, MEMORY_SIZE};

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address was invalid
    #[error("invalid address {0}")]
    InvalidAddress(usize),

    /// The program does not fit in memory
    #[error("program of {len} words does not fit in 32768 memory cells")]
    ProgramTooLarge { len: usize },
}

/// Holds the memory cells of the computer.
///
/// It has 32768 cells, all zero on startup. Cells hold raw 16-bit words, since
/// loaded programs contain register operands above the 15-bit value range.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    inner: Box<[Word; MEMORY_SIZE]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            inner: Box::new([0; MEMORY_SIZE]),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.inner.iter().filter(|w| **w != 0).count();
        write!(f, "Memory {{ non-zero cells: {used} }}")
    }
}

impl Memory {
    /// Get the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<Word, MemoryError> {
        let addr = usize::from(address);
        self.inner
            .get(addr)
            .copied()
            .ok_or(MemoryError::InvalidAddress(addr))
    }

    /// Set the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn set(&mut self, address: Address, value: Word) -> Result<(), MemoryError> {
        let addr = usize::from(address);
        let cell = self
            .inner
            .get_mut(addr)
            .ok_or(MemoryError::InvalidAddress(addr))?;
        *cell = value;
        Ok(())
    }

    /// Copy a program at the start of memory. Cells after it are cleared.
    ///
    /// # Errors
    ///
    /// It fails if the program is longer than the memory. Callers wanting to
    /// truncate should do so before loading.
    pub fn load(&mut self, program: &[Word]) -> Result<(), MemoryError> {
        if program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge { len: program.len() });
        }

        let (head, tail) = self.inner.split_at_mut(program.len());
        head.copy_from_slice(program);
        tail.fill(0);
        Ok(())
    }
}
