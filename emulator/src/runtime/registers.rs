use parse_display::Display;
use thiserror::Error;

use crate::constants::{Word, REGISTER_BASE, REGISTER_COUNT};

/// Index of a general purpose register, `r0` to `r7`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("r{0}")]
pub struct Reg(u8);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid register operand {0}")]
pub struct InvalidRegister(pub Word);

impl Reg {
    /// Get a register from its index
    #[must_use]
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < REGISTER_COUNT).then_some(Self(index))
    }

    /// Decode a register from an encoded operand (`32768..=32775`)
    ///
    /// # Errors
    ///
    /// Fails for any operand outside the register range.
    pub fn from_operand(operand: Word) -> Result<Self, InvalidRegister> {
        operand
            .checked_sub(REGISTER_BASE)
            .and_then(|index| u8::try_from(index).ok())
            .and_then(Self::new)
            .ok_or(InvalidRegister(operand))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Encode the register back into an operand
    #[must_use]
    pub const fn operand(self) -> Word {
        REGISTER_BASE + self.0 as Word
    }

    /// All the registers, in order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..).map(Self).take(REGISTER_COUNT)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    inner: [Word; REGISTER_COUNT],
}

impl Registers {
    #[must_use]
    pub fn get(&self, reg: Reg) -> Word {
        self.inner[reg.index()]
    }

    pub fn set(&mut self, reg: Reg, value: Word) {
        self.inner[reg.index()] = value;
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, reg) in Reg::all().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{reg} = {}", self.get(reg))?;
        }
        Ok(())
    }
}
