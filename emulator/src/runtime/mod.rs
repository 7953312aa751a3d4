use parse_display::{Display, FromStr};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::{Address, Word, MEMORY_SIZE};

mod console;
mod exception;
mod instructions;
mod memory;
mod operand;
mod registers;
mod stack;

pub use self::console::{Console, StreamConsole};
pub use self::exception::Exception;
pub use self::instructions::{Instruction, Opcode, MAX_ARITY};
pub use self::memory::{Memory, MemoryError};
pub use self::operand::{InvalidOperand, Operand};
pub use self::registers::{InvalidRegister, Reg, Registers};
pub use self::stack::Stack;

use self::instructions::Flow;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("fault at pc={pc} (opcode {opcode})")]
    Fault {
        pc: Address,
        opcode: Word,
        #[source]
        exception: Exception,
    },

    #[error("computer is halted")]
    Halted,
}

type Result<T> = std::result::Result<T, ProcessorError>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum State {
    #[default]
    Running,
    Halted,
}

/// Why [`Computer::run`] stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "kebab-case")]
pub enum Termination {
    /// A `halt` instruction was executed
    Halted,
    /// The program counter went past the last memory cell
    EndOfMemory,
}

/// What to do with a word that is not in the instruction table
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, FromStr)]
#[display(style = "kebab-case")]
pub enum InvalidOpcodePolicy {
    /// Log it, skip one word and continue
    #[default]
    Skip,
    /// Stop with an `InvalidInstruction` fault
    Abort,
}

#[derive(Default, Clone)]
pub struct Computer {
    pub registers: Registers,
    pub memory: Memory,
    pub stack: Stack,
    pub pc: Address,
    pub state: State,
    /// Number of dispatch steps, skipped invalid opcodes included
    pub cycles: usize,
    /// Number of invalid opcodes skipped so far
    pub invalid_opcodes: usize,
    pub invalid_opcode_policy: InvalidOpcodePolicy,
}

impl std::fmt::Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ pc: {}, state: {:?}, registers: {:?}, stack: {:?}, memory: [...] }}",
            self.pc, self.state, self.registers, self.stack
        )
    }
}

impl Computer {
    /// Create a computer with a program loaded at address 0
    ///
    /// # Errors
    ///
    /// Fails if the program does not fit in memory.
    pub fn new(program: &[Word]) -> std::result::Result<Self, MemoryError> {
        let mut computer = Self::default();
        computer.memory.load(program)?;
        Ok(computer)
    }

    #[must_use]
    pub fn with_invalid_opcode_policy(mut self, policy: InvalidOpcodePolicy) -> Self {
        self.invalid_opcode_policy = policy;
        self
    }

    /// Get the effective value of an operand
    #[must_use]
    pub fn resolve(&self, operand: Operand) -> Word {
        operand.resolve(&self.registers)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == State::Running && usize::from(self.pc) < MEMORY_SIZE
    }

    /// Fetch the word under the program counter
    fn fetch(&self) -> std::result::Result<Word, Exception> {
        Ok(self.memory.get(self.pc)?)
    }

    /// Fetch the opcode and its operands. The program counter is left on the
    /// last operand.
    #[tracing::instrument(skip(self), err)]
    fn decode_instruction(&mut self) -> std::result::Result<Option<Instruction>, Exception> {
        let word = self.fetch()?;
        let Some(opcode) = Opcode::from_word(word) else {
            return match self.invalid_opcode_policy {
                InvalidOpcodePolicy::Skip => Ok(None),
                InvalidOpcodePolicy::Abort => Err(Exception::InvalidInstruction(word)),
            };
        };

        let mut operands = [0; MAX_ARITY];
        for operand in operands.iter_mut().take(opcode.arity()) {
            self.pc += 1;
            *operand = self.fetch()?;
        }

        Instruction::decode(opcode, operands).map(Some)
    }

    /// Execute one dispatch step
    ///
    /// # Errors
    ///
    /// Fails on any fatal exception, or if the computer already halted.
    #[tracing::instrument(skip(self, console), level = "debug")]
    pub fn step(&mut self, console: &mut dyn Console) -> Result<()> {
        if self.state == State::Halted {
            return Err(ProcessorError::Halted);
        }

        let pc = self.pc;
        let opcode = self.memory.get(pc).unwrap_or_default();
        let fault = |exception| ProcessorError::Fault {
            pc,
            opcode,
            exception,
        };

        self.cycles += 1;
        let Some(inst) = self.decode_instruction().map_err(fault)? else {
            warn!(pc, opcode, "Unimplemented instruction, skipping it");
            self.invalid_opcodes += 1;
            self.pc += 1;
            return Ok(());
        };

        debug!(pc, "Executing instruction \"{}\"", inst);
        match inst.execute(self, console).map_err(fault)? {
            Flow::Next => self.pc += 1,
            Flow::Jump(address) => self.pc = address,
            Flow::Halt => self.state = State::Halted,
        }

        Ok(())
    }

    /// Run until the program halts or runs off the end of memory
    ///
    /// # Errors
    ///
    /// Fails on the first fatal exception.
    #[tracing::instrument(skip(self, console))]
    pub fn run(&mut self, console: &mut dyn Console) -> Result<Termination> {
        while self.is_running() {
            self.step(console)?;
        }

        let termination = match self.state {
            State::Halted => Termination::Halted,
            State::Running => Termination::EndOfMemory,
        };
        info!(
            %termination,
            cycles = self.cycles,
            invalid_opcodes = self.invalid_opcodes,
            "Program stopped"
        );
        Ok(termination)
    }
}
