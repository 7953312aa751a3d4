use parse_display::Display;
use tracing::{debug, info};

use crate::constants::{Address, Word, WORD_MASK};

use super::{
    console::Console, exception::Exception, operand::Operand, registers::Reg, Computer,
};

/// Maximum number of operands an instruction takes
pub const MAX_ARITY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(style = "lowercase")]
pub enum Opcode {
    Halt,
    Set,
    Push,
    Pop,
    Eq,
    Gt,
    Jmp,
    Jt,
    Jf,
    Add,
    Mult,
    Mod,
    And,
    Or,
    Not,
    Wmem,
    Rmem,
    Call,
    Ret,
    Out,
    In,
    Noop,
}

/// The instruction table, indexed by opcode number, with the operand count of
/// each entry
const TABLE: [(Opcode, usize); 22] = [
    (Opcode::Halt, 0),
    (Opcode::Set, 2),
    (Opcode::Push, 1),
    (Opcode::Pop, 1),
    (Opcode::Eq, 3),
    (Opcode::Gt, 3),
    (Opcode::Jmp, 1),
    (Opcode::Jt, 2),
    (Opcode::Jf, 2),
    (Opcode::Add, 3),
    (Opcode::Mult, 3),
    (Opcode::Mod, 3),
    (Opcode::And, 3),
    (Opcode::Or, 3),
    (Opcode::Not, 2),
    (Opcode::Wmem, 2),
    (Opcode::Rmem, 2),
    (Opcode::Call, 1),
    (Opcode::Ret, 0),
    (Opcode::Out, 1),
    (Opcode::In, 1),
    (Opcode::Noop, 0),
];

impl Opcode {
    /// Look up an opcode in the instruction table
    #[must_use]
    pub fn from_word(word: Word) -> Option<Self> {
        TABLE.get(usize::from(word)).map(|(opcode, _)| *opcode)
    }

    /// Number of operand words following the opcode
    #[must_use]
    pub const fn arity(self) -> usize {
        TABLE[self as usize].1
    }
}

/// Registers only hold 15-bit values, but memory cells and the stack may hold
/// raw words
fn register_value(val: Word) -> Result<Word, Exception> {
    if val > WORD_MASK {
        return Err(Exception::InvalidValue(val));
    }
    Ok(val)
}

/// What the dispatch loop does once an instruction ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Move on to the word after the last operand
    Next,
    /// Continue at the given address
    Jump(Address),
    Halt,
}

/// A decoded instruction.
///
/// Destination registers are kept as [`Reg`], every other operand as an
/// [`Operand`] resolved when the instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Instruction {
    /// Stop the execution
    #[display("halt")]
    Halt,

    /// Load a register with a value
    #[display("set  {0}, {1}")]
    Set(Reg, Operand),

    /// Push a value onto the stack
    #[display("push {0}")]
    Push(Operand),

    /// Pop the top of the stack into a register
    #[display("pop  {0}")]
    Pop(Reg),

    /// Set a register to 1 if both values are equal, 0 otherwise
    #[display("eq   {0}, {1}, {2}")]
    Eq(Reg, Operand, Operand),

    /// Set a register to 1 if the first value is strictly greater, 0 otherwise
    #[display("gt   {0}, {1}, {2}")]
    Gt(Reg, Operand, Operand),

    /// Unconditional jump
    #[display("jmp  {0}")]
    Jmp(Operand),

    /// Jump if the condition is non-zero
    #[display("jt   {0}, {1}")]
    Jt(Operand, Operand),

    /// Jump if the condition is zero
    #[display("jf   {0}, {1}")]
    Jf(Operand, Operand),

    #[display("add  {0}, {1}, {2}")]
    Add(Reg, Operand, Operand),

    #[display("mult {0}, {1}, {2}")]
    Mult(Reg, Operand, Operand),

    #[display("mod  {0}, {1}, {2}")]
    Mod(Reg, Operand, Operand),

    #[display("and  {0}, {1}, {2}")]
    And(Reg, Operand, Operand),

    #[display("or   {0}, {1}, {2}")]
    Or(Reg, Operand, Operand),

    /// 15-bit bitwise negation
    #[display("not  {0}, {1}")]
    Not(Reg, Operand),

    /// Write a value at an address: `wmem address, value`
    #[display("wmem {0}, {1}")]
    Wmem(Operand, Operand),

    /// Read the memory cell at an address into a register
    #[display("rmem {0}, {1}")]
    Rmem(Reg, Operand),

    /// Push the address of the next instruction and jump
    #[display("call {0}")]
    Call(Operand),

    /// Pop an address from the stack and jump to it
    #[display("ret")]
    Ret,

    /// Write a character to the console
    #[display("out  {0}")]
    Out(Operand),

    /// Read a character from the console
    #[display("in   {0}")]
    In(Reg),

    #[display("noop")]
    Noop,
}

impl Instruction {
    /// Decode an instruction from its opcode and raw operand words.
    ///
    /// Only the first [`Opcode::arity`] operands are looked at.
    ///
    /// # Errors
    ///
    /// Fails if a destination is not a register or a value operand is out of range.
    pub fn decode(opcode: Opcode, operands: [Word; MAX_ARITY]) -> Result<Self, Exception> {
        use Instruction::*;

        let [a, b, c] = operands;
        let reg = |raw: Word| -> Result<Reg, Exception> { Ok(Reg::from_operand(raw)?) };
        let val = |raw: Word| -> Result<Operand, Exception> { Ok(Operand::try_from(raw)?) };

        let instruction = match opcode {
            Opcode::Halt => Halt,
            Opcode::Set => Set(reg(a)?, val(b)?),
            Opcode::Push => Push(val(a)?),
            Opcode::Pop => Pop(reg(a)?),
            Opcode::Eq => Eq(reg(a)?, val(b)?, val(c)?),
            Opcode::Gt => Gt(reg(a)?, val(b)?, val(c)?),
            Opcode::Jmp => Jmp(val(a)?),
            Opcode::Jt => Jt(val(a)?, val(b)?),
            Opcode::Jf => Jf(val(a)?, val(b)?),
            Opcode::Add => Add(reg(a)?, val(b)?, val(c)?),
            Opcode::Mult => Mult(reg(a)?, val(b)?, val(c)?),
            Opcode::Mod => Mod(reg(a)?, val(b)?, val(c)?),
            Opcode::And => And(reg(a)?, val(b)?, val(c)?),
            Opcode::Or => Or(reg(a)?, val(b)?, val(c)?),
            Opcode::Not => Not(reg(a)?, val(b)?),
            Opcode::Wmem => Wmem(val(a)?, val(b)?),
            Opcode::Rmem => Rmem(reg(a)?, val(b)?),
            Opcode::Call => Call(val(a)?),
            Opcode::Ret => Ret,
            Opcode::Out => Out(val(a)?),
            Opcode::In => In(reg(a)?),
            Opcode::Noop => Noop,
        };

        Ok(instruction)
    }

    /// Execute the instruction
    #[tracing::instrument(skip(computer, console))]
    pub(crate) fn execute(
        &self,
        computer: &mut Computer,
        console: &mut dyn Console,
    ) -> Result<Flow, Exception> {
        use Instruction::*;

        match *self {
            Halt => {
                info!(pc = computer.pc, "Halting");
                return Ok(Flow::Halt);
            }

            Set(dest, src) => {
                let val = computer.resolve(src);
                computer.registers.set(dest, val);
            }

            Push(src) => {
                let val = computer.resolve(src);
                debug!("push({})", val);
                computer.stack.push(val);
            }

            Pop(dest) => {
                let val = computer.stack.pop().ok_or(Exception::StackUnderflow)?;
                debug!("pop => {}", val);
                computer.registers.set(dest, register_value(val)?);
            }

            Eq(dest, b, c) => {
                let (b, c) = (computer.resolve(b), computer.resolve(c));
                let res = Word::from(b == c);
                debug!("{} == {} => {}", b, c, res);
                computer.registers.set(dest, res);
            }

            Gt(dest, b, c) => {
                let (b, c) = (computer.resolve(b), computer.resolve(c));
                let res = Word::from(b > c);
                debug!("{} > {} => {}", b, c, res);
                computer.registers.set(dest, res);
            }

            Jmp(target) => {
                let addr = computer.resolve(target);
                debug!("Jumping to address {}", addr);
                return Ok(Flow::Jump(addr));
            }

            Jt(cond, target) => {
                if computer.resolve(cond) != 0 {
                    let addr = computer.resolve(target);
                    debug!("Jumping to address {}", addr);
                    return Ok(Flow::Jump(addr));
                }
            }

            Jf(cond, target) => {
                if computer.resolve(cond) == 0 {
                    let addr = computer.resolve(target);
                    debug!("Jumping to address {}", addr);
                    return Ok(Flow::Jump(addr));
                }
            }

            // 2^16 is a multiple of 2^15, so wrapping on 16 bits then masking
            // gives the result modulo 32768
            Add(dest, b, c) => {
                let (b, c) = (computer.resolve(b), computer.resolve(c));
                let res = b.wrapping_add(c) & WORD_MASK;
                debug!("{} + {} = {}", b, c, res);
                computer.registers.set(dest, res);
            }

            Mult(dest, b, c) => {
                let (b, c) = (computer.resolve(b), computer.resolve(c));
                let res = b.wrapping_mul(c) & WORD_MASK;
                debug!("{} * {} = {}", b, c, res);
                computer.registers.set(dest, res);
            }

            Mod(dest, b, c) => {
                let (b, c) = (computer.resolve(b), computer.resolve(c));
                let res = b.checked_rem(c).ok_or(Exception::DivByZero)?;
                debug!("{} % {} = {}", b, c, res);
                computer.registers.set(dest, res);
            }

            And(dest, b, c) => {
                let (b, c) = (computer.resolve(b), computer.resolve(c));
                let res = b & c;
                debug!("{} & {} = {}", b, c, res);
                computer.registers.set(dest, res);
            }

            Or(dest, b, c) => {
                let (b, c) = (computer.resolve(b), computer.resolve(c));
                let res = b | c;
                debug!("{} | {} = {}", b, c, res);
                computer.registers.set(dest, res);
            }

            Not(dest, src) => {
                let val = computer.resolve(src);
                let res = !val & WORD_MASK;
                debug!("!{} = {}", val, res);
                computer.registers.set(dest, res);
            }

            Wmem(addr, src) => {
                let (addr, val) = (computer.resolve(addr), computer.resolve(src));
                debug!("memory[{}] = {}", addr, val);
                computer.memory.set(addr, val)?;
            }

            Rmem(dest, addr) => {
                let addr = computer.resolve(addr);
                let val = computer.memory.get(addr)?;
                debug!("memory[{}] => {}", addr, val);
                computer.registers.set(dest, register_value(val)?);
            }

            Call(target) => {
                // %pc is on the last operand, the next instruction is right after
                let ret = computer.pc + 1;
                let addr = computer.resolve(target);
                computer.stack.push(ret);
                debug!("Calling {}, returning to {}", addr, ret);
                return Ok(Flow::Jump(addr));
            }

            Ret => {
                let ret = computer.stack.pop().ok_or(Exception::StackUnderflow)?;
                debug!("Returning to {}", ret);
                return Ok(Flow::Jump(ret));
            }

            Out(src) => {
                let val = u32::from(computer.resolve(src));
                let c = char::from_u32(val).ok_or(Exception::InvalidCharacter(val))?;
                console.put(c)?;
            }

            In(dest) => {
                let c = console.get()?.ok_or(Exception::EndOfInput)?;
                let code = u32::from(c);
                let val = Word::try_from(code)
                    .ok()
                    .filter(|v| *v <= WORD_MASK)
                    .ok_or(Exception::InvalidCharacter(code))?;
                debug!("in => {:?}", c);
                computer.registers.set(dest, val);
            }

            Noop => {}
        };

        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::runtime::StreamConsole;

    fn r(index: u8) -> Reg {
        Reg::new(index).unwrap()
    }

    fn lit(value: Word) -> Operand {
        Operand::Literal(value)
    }

    fn exec(computer: &mut Computer, instruction: Instruction) -> Result<Flow, Exception> {
        let mut console = StreamConsole::new(io::empty(), io::sink());
        instruction.execute(computer, &mut console)
    }

    #[test]
    fn table_test() {
        for code in 0..22 {
            let opcode = Opcode::from_word(code).unwrap();
            assert_eq!(opcode as Word, code);
            assert!(opcode.arity() <= MAX_ARITY);
        }
        assert_eq!(Opcode::from_word(22), None);
        assert_eq!(Opcode::from_word(0xFFFF), None);

        assert_eq!(Opcode::Halt.arity(), 0);
        assert_eq!(Opcode::Out.arity(), 1);
        assert_eq!(Opcode::Wmem.arity(), 2);
        assert_eq!(Opcode::Add.arity(), 3);
        assert_eq!(Opcode::Wmem.to_string(), "wmem");
    }

    #[test]
    fn decode_test() {
        let add = Instruction::decode(Opcode::Add, [32768, 10, 5]).unwrap();
        assert_eq!(add, Instruction::Add(r(0), lit(10), lit(5)));

        let set = Instruction::decode(Opcode::Set, [32769, 32770, 0]).unwrap();
        assert_eq!(set, Instruction::Set(r(1), Operand::Register(r(2))));

        // Unused operand slots are ignored
        let halt = Instruction::decode(Opcode::Halt, [0xFFFF, 0xFFFF, 0xFFFF]).unwrap();
        assert_eq!(halt, Instruction::Halt);
    }

    #[test]
    fn decode_rejects_invalid_operands_test() {
        // A literal where a destination register is expected
        let err = Instruction::decode(Opcode::Add, [3, 10, 5]).unwrap_err();
        assert!(matches!(err, Exception::InvalidRegister(_)));

        let err = Instruction::decode(Opcode::Out, [32776, 0, 0]).unwrap_err();
        assert!(matches!(err, Exception::InvalidOperand(_)));
    }

    #[test]
    fn display_test() {
        let program = [
            Instruction::Add(r(0), lit(10), lit(5)),
            Instruction::Wmem(Operand::Register(r(1)), lit(7)),
            Instruction::Jt(Operand::Register(r(0)), lit(1234)),
            Instruction::Ret,
        ];
        let listing: Vec<_> = program.iter().map(ToString::to_string).collect();
        insta::assert_snapshot!(listing.join("\n"), @r###"
        add  r0, 10, 5
        wmem r1, 7
        jt   r0, 1234
        ret
        "###);
    }

    #[test]
    fn comparison_test() {
        let mut computer = Computer::default();
        exec(&mut computer, Instruction::Eq(r(0), lit(3), lit(3))).unwrap();
        exec(&mut computer, Instruction::Eq(r(1), lit(3), lit(4))).unwrap();
        exec(&mut computer, Instruction::Gt(r(2), lit(4), lit(3))).unwrap();
        exec(&mut computer, Instruction::Gt(r(3), lit(3), lit(3))).unwrap();

        assert_eq!(computer.registers.get(r(0)), 1);
        assert_eq!(computer.registers.get(r(1)), 0);
        assert_eq!(computer.registers.get(r(2)), 1);
        assert_eq!(computer.registers.get(r(3)), 0);
    }

    #[test]
    fn bitwise_test() {
        let mut computer = Computer::default();
        exec(&mut computer, Instruction::And(r(0), lit(0b1100), lit(0b1010))).unwrap();
        exec(&mut computer, Instruction::Or(r(1), lit(0b1100), lit(0b1010))).unwrap();
        exec(&mut computer, Instruction::Not(r(2), lit(0))).unwrap();
        exec(&mut computer, Instruction::Not(r(3), lit(0x7FFF))).unwrap();

        assert_eq!(computer.registers.get(r(0)), 0b1000);
        assert_eq!(computer.registers.get(r(1)), 0b1110);
        assert_eq!(computer.registers.get(r(2)), 0x7FFF);
        assert_eq!(computer.registers.get(r(3)), 0);
    }

    #[test]
    fn not_uses_resolved_value_test() {
        let mut computer = Computer::default();
        computer.registers.set(r(1), 0x00FF);
        exec(&mut computer, Instruction::Not(r(0), Operand::Register(r(1)))).unwrap();
        assert_eq!(computer.registers.get(r(0)), 0x7F00);
    }

    #[test]
    fn mod_test() {
        let mut computer = Computer::default();
        exec(&mut computer, Instruction::Mod(r(0), lit(17), lit(5))).unwrap();
        assert_eq!(computer.registers.get(r(0)), 2);

        computer.registers.set(r(0), 99);
        let err = exec(&mut computer, Instruction::Mod(r(0), lit(17), lit(0))).unwrap_err();
        assert!(matches!(err, Exception::DivByZero));
        // The destination is left untouched
        assert_eq!(computer.registers.get(r(0)), 99);
    }

    #[test]
    fn memory_test() {
        let mut computer = Computer::default();
        computer.registers.set(r(1), 300);

        let flow = exec(&mut computer, Instruction::Wmem(Operand::Register(r(1)), lit(42)));
        assert_eq!(flow.unwrap(), Flow::Next);
        assert_eq!(computer.memory.get(300), Ok(42));

        exec(&mut computer, Instruction::Rmem(r(2), lit(300))).unwrap();
        assert_eq!(computer.registers.get(r(2)), 42);
    }

    #[test]
    fn rmem_rejects_raw_words_test() {
        let mut computer = Computer::default();
        computer.memory.set(1, 32768).unwrap();
        computer.registers.set(r(0), 7);

        let err = exec(&mut computer, Instruction::Rmem(r(0), lit(1))).unwrap_err();
        assert!(matches!(err, Exception::InvalidValue(32768)));
        assert_eq!(err.to_string(), "value 32768 does not fit in a register");
        // The register keeps its previous value
        assert_eq!(computer.registers.get(r(0)), 7);

        computer.memory.set(1, 32767).unwrap();
        exec(&mut computer, Instruction::Rmem(r(0), lit(1))).unwrap();
        assert_eq!(computer.registers.get(r(0)), 32767);
    }

    #[test]
    fn pop_rejects_out_of_range_return_address_test() {
        // A call whose operand sits in the last cell pushes 32768
        let mut computer = Computer::default();
        computer.pc = 0x7FFF;
        exec(&mut computer, Instruction::Call(lit(0))).unwrap();
        assert_eq!(computer.stack.peek(), Some(32768));

        let err = exec(&mut computer, Instruction::Pop(r(3))).unwrap_err();
        assert!(matches!(err, Exception::InvalidValue(32768)));
        assert_eq!(computer.registers.get(r(3)), 0);
    }

    #[test]
    fn jumps_test() {
        let mut computer = Computer::default();

        let flow = exec(&mut computer, Instruction::Jmp(lit(100))).unwrap();
        assert_eq!(flow, Flow::Jump(100));

        let flow = exec(&mut computer, Instruction::Jt(lit(1), lit(100))).unwrap();
        assert_eq!(flow, Flow::Jump(100));
        let flow = exec(&mut computer, Instruction::Jt(lit(0), lit(100))).unwrap();
        assert_eq!(flow, Flow::Next);

        let flow = exec(&mut computer, Instruction::Jf(lit(0), lit(100))).unwrap();
        assert_eq!(flow, Flow::Jump(100));
        let flow = exec(&mut computer, Instruction::Jf(lit(7), lit(100))).unwrap();
        assert_eq!(flow, Flow::Next);
    }

    #[test]
    fn call_ret_test() {
        let mut computer = Computer::default();
        computer.pc = 11;

        let flow = exec(&mut computer, Instruction::Call(lit(500))).unwrap();
        assert_eq!(flow, Flow::Jump(500));
        assert_eq!(computer.stack.peek(), Some(12));

        let flow = exec(&mut computer, Instruction::Ret).unwrap();
        assert_eq!(flow, Flow::Jump(12));
        assert!(computer.stack.is_empty());

        let err = exec(&mut computer, Instruction::Ret).unwrap_err();
        assert!(matches!(err, Exception::StackUnderflow));
    }

    #[test]
    fn pop_empty_test() {
        let mut computer = Computer::default();
        computer.registers.set(r(0), 5);
        let err = exec(&mut computer, Instruction::Pop(r(0))).unwrap_err();
        assert!(matches!(err, Exception::StackUnderflow));
        assert_eq!(computer.registers.get(r(0)), 5);
    }

    #[test]
    fn console_test() {
        let mut computer = Computer::default();
        let mut console = StreamConsole::new(&b"x"[..], Vec::new());

        Instruction::Out(lit(65)).execute(&mut computer, &mut console).unwrap();
        Instruction::In(r(4)).execute(&mut computer, &mut console).unwrap();
        assert_eq!(computer.registers.get(r(4)), Word::from(b'x'));

        let err = Instruction::In(r(4))
            .execute(&mut computer, &mut console)
            .unwrap_err();
        assert!(matches!(err, Exception::EndOfInput));

        let (_, output) = console.into_inner();
        assert_eq!(output, b"A");
    }

    proptest! {
        #[test]
        fn add_is_modular(a in 0u16..32768, b in 0u16..32768) {
            let mut computer = Computer::default();
            exec(&mut computer, Instruction::Add(r(0), lit(a), lit(b))).unwrap();
            let res = computer.registers.get(r(0));
            prop_assert_eq!(u32::from(res), (u32::from(a) + u32::from(b)) % 32768);
            prop_assert!(res <= WORD_MASK);
        }

        #[test]
        fn mult_is_modular(a in 0u16..32768, b in 0u16..32768) {
            let mut computer = Computer::default();
            exec(&mut computer, Instruction::Mult(r(0), lit(a), lit(b))).unwrap();
            let res = computer.registers.get(r(0));
            prop_assert_eq!(u32::from(res), (u32::from(a) * u32::from(b)) % 32768);
            prop_assert!(res <= WORD_MASK);
        }

        #[test]
        fn comparisons_are_boolean(a in 0u16..32768, b in 0u16..32768) {
            let mut computer = Computer::default();
            exec(&mut computer, Instruction::Eq(r(0), lit(a), lit(b))).unwrap();
            exec(&mut computer, Instruction::Gt(r(1), lit(a), lit(b))).unwrap();
            prop_assert_eq!(computer.registers.get(r(0)), Word::from(a == b));
            prop_assert_eq!(computer.registers.get(r(1)), Word::from(a > b));
        }

        #[test]
        fn push_pop_moves_values(src in 0u8..8, dest in 0u8..8, value in 0u16..32768) {
            let mut computer = Computer::default();
            exec(&mut computer, Instruction::Set(r(src), lit(value))).unwrap();
            exec(&mut computer, Instruction::Push(Operand::Register(r(src)))).unwrap();
            exec(&mut computer, Instruction::Pop(r(dest))).unwrap();
            prop_assert_eq!(computer.registers.get(r(dest)), value);
            prop_assert!(computer.stack.is_empty());
        }
    }
}
