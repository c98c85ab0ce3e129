use alloc::string::String;
use thiserror::Error;

/// Reason for an execution fault
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum FaultKind {
    /// The opcode is not one of the 16 defined instructions
    #[error("unknown opcode")]
    UnknownOpcode,

    /// A push would move the stack pointer past the last slot
    #[error("stack overflow")]
    StackOverflow,

    /// A pop or peek was attempted on an empty stack
    #[error("stack underflow")]
    StackUnderflow,

    /// `DIV` with a zero divisor
    #[error("division by zero")]
    DivisionByZero,

    /// A branch (or a write to `IP`) pointed outside the program
    #[error("jump target {target} is outside the program")]
    OutOfRangeJump {
        /// Requested instruction index
        target: i32,
    },

    /// The instruction's operands run past the end of the program
    #[error("operands run past the end of the program")]
    TruncatedOperand,

    /// A register operand does not name one of the 12 registers
    #[error("invalid register index {index}")]
    InvalidRegister {
        /// Raw operand value
        index: i32,
    },
}

/// Execution fault, reported with the instruction that caused it
///
/// Once a fault is returned, the machine is in [`State::Faulted`] and every
/// effect of earlier instructions remains observable.
///
/// [`State::Faulted`]: crate::State::Faulted
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} (opcode {opcode} at ip {ip})")]
pub struct Fault {
    /// Value of `IP` when the faulting instruction was fetched
    pub ip: i32,
    /// Raw opcode value at `ip`
    pub opcode: i32,
    /// What went wrong
    pub kind: FaultKind,
}

/// Error when parsing a textual program image
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token could not be parsed as a 32-bit decimal integer
    #[error("line {line}: invalid integer {token:?}")]
    InvalidToken {
        /// 1-indexed line number
        line: usize,
        /// Offending token
        token: String,
    },
}
