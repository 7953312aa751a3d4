//! Operand resolution
//!
//! Every operand word is either a literal value (`0..=32767`) or a reference to
//! one of the eight registers (`32768..=32775`). Anything above is invalid.

use parse_display::Display;
use thiserror::Error;

use super::registers::{Reg, Registers};
use crate::constants::{Word, MAX_OPERAND, REGISTER_BASE, WORD_MASK};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid operand {0}")]
pub struct InvalidOperand(pub Word);

/// An operand read as a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{0}")]
pub enum Operand {
    Literal(Word),
    Register(Reg),
}

impl TryFrom<Word> for Operand {
    type Error = InvalidOperand;

    fn try_from(raw: Word) -> Result<Self, Self::Error> {
        match raw {
            0..=WORD_MASK => Ok(Self::Literal(raw)),
            REGISTER_BASE..=MAX_OPERAND => Reg::from_operand(raw)
                .map(Self::Register)
                .map_err(|_| InvalidOperand(raw)),
            _ => Err(InvalidOperand(raw)),
        }
    }
}

impl Operand {
    /// Get the effective value of the operand
    #[must_use]
    pub fn resolve(self, registers: &Registers) -> Word {
        match self {
            Self::Literal(value) => value,
            Self::Register(reg) => registers.get(reg),
        }
    }
}
