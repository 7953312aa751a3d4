pub type Word = u16;
pub type Address = u16;

/// Total size of the computer memory, in words
pub const MEMORY_SIZE: usize = 1 << 15;

/// Number of general purpose registers
pub const REGISTER_COUNT: usize = 8;

/// First operand number referring to a register
///
/// Operands `REGISTER_BASE..REGISTER_BASE + REGISTER_COUNT` denote registers `r0..r7`.
pub const REGISTER_BASE: Word = 0x8000;

/// Arithmetic is done modulo 32768, so results are masked to 15 bits
pub const WORD_MASK: Word = 0x7FFF;

/// Highest valid operand number (`r7`)
#[allow(clippy::cast_possible_truncation)]
pub const MAX_OPERAND: Word = REGISTER_BASE + REGISTER_COUNT as Word - 1;
