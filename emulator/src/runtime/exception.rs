use thiserror::Error;

use crate::constants::Word;

use super::memory::MemoryError;
use super::operand::InvalidOperand;
use super::registers::InvalidRegister;

/// Fatal conditions raised while executing an instruction
#[derive(Error, Debug)]
pub enum Exception {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("division by zero")]
    DivByZero,

    #[error("invalid instruction {0}")]
    InvalidInstruction(Word),

    #[error(transparent)]
    InvalidOperand(#[from] InvalidOperand),

    #[error(transparent)]
    InvalidRegister(#[from] InvalidRegister),

    #[error("invalid memory access ({0})")]
    InvalidMemoryAccess(#[from] MemoryError),

    #[error("value {0} does not fit in a register")]
    InvalidValue(Word),

    #[error("value {0} is not a character")]
    InvalidCharacter(u32),

    #[error("end of input")]
    EndOfInput,

    #[error("console error: {0}")]
    Console(#[from] std::io::Error),
}
