use crate::{FaultKind, Register};
use core::fmt;
use static_assertions::const_assert_eq;

/// Largest number of operands taken by any instruction
pub const MAX_WIDTH: usize = 3;

/// Instruction opcodes, in image encoding order
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// `HLT` (0): stop execution
    Hlt,
    /// `PSH val` (1): push an immediate
    Psh,
    /// `POP` (2): discard the top of the stack
    Pop,
    /// `ADD` (3)
    Add,
    /// `MUL` (4)
    Mul,
    /// `DIV` (5)
    Div,
    /// `SUB` (6)
    Sub,
    /// `SLT` (7): replace the top two values with `second < top`
    Slt,
    /// `MOV src dst` (8)
    Mov,
    /// `SET dst val` (9)
    Set,
    /// `LOG reg` (10)
    Log,
    /// `IF reg val target` (11)
    If,
    /// `IFN reg val target` (12)
    Ifn,
    /// `GLD reg` (13): push a register
    Gld,
    /// `GPT reg` (14): copy the top of the stack into a register
    Gpt,
    /// `NOP` (15)
    Nop,
}

/// Kind of a single operand, used for disassembly
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Register index
    Register,
    /// Immediate value
    Immediate,
    /// Absolute instruction index
    Target,
}

impl Opcode {
    /// Number of defined opcodes
    pub const COUNT: usize = 16;

    const ALL: [Opcode; Self::COUNT] = [
        Opcode::Hlt,
        Opcode::Psh,
        Opcode::Pop,
        Opcode::Add,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Sub,
        Opcode::Slt,
        Opcode::Mov,
        Opcode::Set,
        Opcode::Log,
        Opcode::If,
        Opcode::Ifn,
        Opcode::Gld,
        Opcode::Gpt,
        Opcode::Nop,
    ];

    /// Returns the operands which follow this opcode in the image
    pub const fn operands(self) -> &'static [Operand] {
        match self {
            Opcode::Psh => &[Operand::Immediate],
            Opcode::Mov => &[Operand::Register, Operand::Register],
            Opcode::Set => &[Operand::Register, Operand::Immediate],
            Opcode::Log | Opcode::Gld | Opcode::Gpt => &[Operand::Register],
            Opcode::If | Opcode::Ifn => {
                &[Operand::Register, Operand::Immediate, Operand::Target]
            }
            Opcode::Hlt
            | Opcode::Pop
            | Opcode::Add
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Sub
            | Opcode::Slt
            | Opcode::Nop => &[],
        }
    }

    /// Number of integers consumed after the opcode itself
    #[inline]
    pub const fn width(self) -> usize {
        self.operands().len()
    }

    /// Returns the upper-case mnemonic
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Psh => "PSH",
            Opcode::Pop => "POP",
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Sub => "SUB",
            Opcode::Slt => "SLT",
            Opcode::Mov => "MOV",
            Opcode::Set => "SET",
            Opcode::Log => "LOG",
            Opcode::If => "IF",
            Opcode::Ifn => "IFN",
            Opcode::Gld => "GLD",
            Opcode::Gpt => "GPT",
            Opcode::Nop => "NOP",
        }
    }

    /// Looks up an opcode by mnemonic (case-insensitive)
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(s))
    }
}

const_assert_eq!(Opcode::Nop as usize + 1, Opcode::COUNT);

impl TryFrom<i32> for Opcode {
    type Error = i32;
    fn try_from(v: i32) -> Result<Self, i32> {
        usize::try_from(v)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
            .ok_or(v)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction: opcode plus its fixed-width operands
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Opcode
    pub op: Opcode,
    args: [i32; MAX_WIDTH],
}

impl Instruction {
    /// Decodes the instruction whose opcode is at `code[ip]`
    pub fn decode(code: &[i32], ip: usize) -> Result<Self, FaultKind> {
        let raw = *code.get(ip).ok_or(FaultKind::TruncatedOperand)?;
        let op =
            Opcode::try_from(raw).map_err(|_| FaultKind::UnknownOpcode)?;
        let operands = code
            .get(ip + 1..ip + 1 + op.width())
            .ok_or(FaultKind::TruncatedOperand)?;
        let mut args = [0; MAX_WIDTH];
        args[..operands.len()].copy_from_slice(operands);
        Ok(Self { op, args })
    }

    /// Returns the raw operands (exactly [`Opcode::width`] values)
    #[inline]
    pub fn operands(&self) -> &[i32] {
        &self.args[..self.op.width()]
    }

    /// Returns the operand at index `i`
    ///
    /// # Panics
    /// If `i` is not less than [`MAX_WIDTH`]
    #[inline]
    pub(crate) fn arg(&self, i: usize) -> i32 {
        self.args[i]
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        for (kind, &v) in self.op.operands().iter().zip(self.operands()) {
            match (kind, Register::try_from(v)) {
                (Operand::Register, Ok(r)) => write!(f, " {r}")?,
                _ => write!(f, " {v}")?,
            }
        }
        Ok(())
    }
}
