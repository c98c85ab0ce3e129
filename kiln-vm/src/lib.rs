//! Kiln virtual machine
//!
//! A small register/stack machine which executes a flat image of integer
//! opcodes and operands.  The machine has twelve registers, a 256-slot operand
//! stack, and sixteen instructions; see [`Opcode`] for the instruction set.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

extern crate alloc;

mod error;
mod opcode;

pub use error::{Fault, FaultKind, ParseError};
pub use opcode::{Instruction, MAX_WIDTH, Opcode, Operand};

use alloc::vec::Vec;
use core::{
    fmt,
    ops::{Index, IndexMut},
};
use static_assertions::const_assert_eq;

/// Number of slots in the operand stack
pub const STACK_SIZE: usize = 256;

/// Named register
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// General purpose (also holds the right-hand operand of arithmetic)
    A,
    /// General purpose (also holds the left-hand operand of arithmetic)
    B,
    /// General purpose (also holds the result of arithmetic)
    C,
    /// General purpose
    D,
    /// General purpose
    E,
    /// General purpose
    F,
    /// General purpose
    G,
    /// General purpose
    H,
    /// Excess register
    Ex,
    /// Excess register
    Exa,
    /// Instruction pointer
    Ip,
    /// Stack pointer
    Sp,
}

impl Register {
    /// Number of registers in the register file
    pub const COUNT: usize = 12;

    /// Every register, in encoding order
    pub const ALL: [Register; Self::COUNT] = [
        Register::A,
        Register::B,
        Register::C,
        Register::D,
        Register::E,
        Register::F,
        Register::G,
        Register::H,
        Register::Ex,
        Register::Exa,
        Register::Ip,
        Register::Sp,
    ];

    /// Returns the register's upper-case name
    pub const fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::D => "D",
            Register::E => "E",
            Register::F => "F",
            Register::G => "G",
            Register::H => "H",
            Register::Ex => "EX",
            Register::Exa => "EXA",
            Register::Ip => "IP",
            Register::Sp => "SP",
        }
    }

    /// Looks up a register by name (case-insensitive)
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name().eq_ignore_ascii_case(s))
    }
}

const_assert_eq!(Register::Sp as usize + 1, Register::COUNT);

impl TryFrom<i32> for Register {
    type Error = i32;
    fn try_from(v: i32) -> Result<Self, i32> {
        usize::try_from(v)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
            .ok_or(v)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registers([i32; Register::COUNT]);

impl Default for Registers {
    /// Zeroed registers, with `SP` marking an empty stack
    fn default() -> Self {
        let mut out = Self([0; Register::COUNT]);
        out[Register::Sp] = -1;
        out
    }
}

impl Registers {
    /// Iterates over `(register, value)` pairs in encoding order
    pub fn iter(&self) -> impl Iterator<Item = (Register, i32)> + '_ {
        Register::ALL.into_iter().zip(self.0.iter().copied())
    }
}

impl Index<Register> for Registers {
    type Output = i32;
    #[inline]
    fn index(&self, r: Register) -> &i32 {
        &self.0[r as usize]
    }
}

impl IndexMut<Register> for Registers {
    #[inline]
    fn index_mut(&mut self, r: Register) -> &mut i32 {
        &mut self.0[r as usize]
    }
}

/// Operand stack storage
///
/// The stack pointer is not stored here; it lives in [`Register::Sp`], so that
/// programs can read and write it like any other register.
#[derive(Debug)]
struct Stack {
    data: [i32; STACK_SIZE],
}

impl Default for Stack {
    fn default() -> Self {
        Self {
            data: [0; STACK_SIZE],
        }
    }
}

/// Checked view of the stack, pairing the storage with the `SP` register
///
/// Every operation validates the stack pointer before touching storage; a
/// failed operation leaves both the slots and `SP` unchanged.
struct StackView<'a> {
    data: &'a mut [i32; STACK_SIZE],

    /// Index of the topmost occupied slot, or -1 when empty
    sp: &'a mut i32,
}

impl StackView<'_> {
    /// Converts a stack pointer value into a slot index
    #[inline]
    fn slot(sp: i32) -> Result<usize, FaultKind> {
        match usize::try_from(sp) {
            Ok(i) if i < STACK_SIZE => Ok(i),
            Ok(_) => Err(FaultKind::StackOverflow),
            Err(_) => Err(FaultKind::StackUnderflow),
        }
    }

    #[inline]
    fn push(&mut self, v: i32) -> Result<(), FaultKind> {
        let next = self.sp.checked_add(1).ok_or(FaultKind::StackOverflow)?;
        self.data[Self::slot(next)?] = v;
        *self.sp = next;
        Ok(())
    }

    #[inline]
    fn pop(&mut self) -> Result<i32, FaultKind> {
        let v = self.peek()?;
        *self.sp -= 1;
        Ok(v)
    }

    #[inline]
    fn peek(&self) -> Result<i32, FaultKind> {
        self.peek_at(0)
    }

    /// Reads the value `depth` slots below the top of the stack
    #[inline]
    fn peek_at(&self, depth: i32) -> Result<i32, FaultKind> {
        let sp = self
            .sp
            .checked_sub(depth)
            .ok_or(FaultKind::StackUnderflow)?;
        Ok(self.data[Self::slot(sp)?])
    }

    /// Replaces the top item on the stack with the given value
    #[inline]
    fn emplace(&mut self, v: i32) -> Result<(), FaultKind> {
        self.data[Self::slot(*self.sp)?] = v;
        Ok(())
    }
}

/// Loaded program image
///
/// Opcodes and operands are interleaved without tagging; the decoder uses
/// [`Opcode::width`] to find the next opcode.  The program is immutable once
/// loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program(Vec<i32>);

impl Program {
    /// Parses a whitespace-separated list of decimal integers
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut code = Vec::with_capacity(4);
        for (i, line) in text.lines().enumerate() {
            for token in line.split_whitespace() {
                let v = token.parse::<i32>().map_err(|_| {
                    ParseError::InvalidToken {
                        line: i + 1,
                        token: token.into(),
                    }
                })?;
                code.push(v);
            }
        }
        Ok(Self(code))
    }

    /// Returns the number of integers in the program
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the program is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads the integer at the given index
    #[inline]
    pub fn get(&self, i: usize) -> Option<i32> {
        self.0.get(i).copied()
    }

    /// Borrows the raw image
    #[inline]
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}

impl From<Vec<i32>> for Program {
    fn from(code: Vec<i32>) -> Self {
        Self(code)
    }
}

/// Execution state of the machine
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// The next instruction can be executed
    Running,
    /// A `HLT` instruction was executed
    Halted,
    /// The instruction pointer ran off the end of the program
    Exhausted,
    /// An instruction raised a [`Fault`]
    Faulted,
}

impl State {
    /// Checks whether this state is terminal
    #[inline]
    pub fn is_terminal(self) -> bool {
        self != State::Running
    }
}

/// Diagnostic event, reported to a [`Monitor`] as instructions execute
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Result of `ADD`, `SUB`, `MUL`, or `DIV`
    Arith {
        /// Arithmetic opcode
        op: Opcode,
        /// Left-hand operand (pushed first)
        left: i32,
        /// Right-hand operand (pushed last)
        right: i32,
        /// Result pushed to the stack
        result: i32,
    },
    /// Register value printed by `LOG`
    Log {
        /// Register named by the instruction
        reg: Register,
        /// Its value
        value: i32,
    },
    /// `NOP` was executed
    Nop,
    /// `HLT` was executed
    Halt,
}

/// Trait for a receiver of diagnostics from the VM
pub trait Monitor {
    /// Handles an event produced by the instruction being executed
    fn event(&mut self, vm: &Vm, event: Event);

    /// Called before each instruction is executed
    fn step(&mut self, _vm: &Vm, _ip: usize, _instr: &Instruction) {
        // nothing to do by default
    }
}

/// Monitor which discards every event
pub struct EmptyMonitor;
impl Monitor for EmptyMonitor {
    fn event(&mut self, _vm: &Vm, _event: Event) {
        // nothing to do here
    }
}

/// Instruction pointer policy returned by an opcode handler
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Flow {
    /// Advance past the opcode and its operands
    Next,
    /// Continue at the given (validated) instruction index
    Jump(usize),
    /// Stop execution
    Halt,
}

/// The virtual machine itself
pub struct Vm {
    program: Program,
    regs: Registers,
    stack: Stack,
    state: State,
}

impl Vm {
    /// Builds a new VM, ready to execute the given program from index 0
    pub fn new(program: Program) -> Self {
        let mut out = Self {
            program,
            regs: Registers::default(),
            stack: Stack::default(),
            state: State::Running,
        };
        out.check_exhausted();
        out
    }

    /// Resets registers, stack, and state, keeping the loaded program
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.stack = Stack::default();
        self.state = State::Running;
        self.check_exhausted();
    }

    /// Returns the current execution state
    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Shared borrow of the loaded program
    #[inline]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Shared borrow of the register file
    #[inline]
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Returns the occupied portion of the stack, bottom first
    ///
    /// If `SP` has been moved outside the stack, this returns an empty slice.
    pub fn stack(&self) -> &[i32] {
        match usize::try_from(self.regs[Register::Sp]) {
            Ok(sp) if sp < STACK_SIZE => &self.stack.data[..=sp],
            _ => &[],
        }
    }

    /// Returns the instruction pointer
    #[inline]
    pub fn ip(&self) -> i32 {
        self.regs[Register::Ip]
    }

    #[inline]
    fn stack_view(&mut self) -> StackView<'_> {
        StackView {
            data: &mut self.stack.data,
            sp: &mut self.regs[Register::Sp],
        }
    }

    /// Marks the VM as exhausted if `IP` is past the end of the program
    fn check_exhausted(&mut self) {
        if self.state == State::Running
            && usize::try_from(self.ip())
                .is_ok_and(|ip| ip >= self.program.len())
        {
            self.state = State::Exhausted;
        }
    }

    /// Records a fault at the given instruction
    fn fault(&mut self, ip: i32, kind: FaultKind) -> Fault {
        self.state = State::Faulted;
        let opcode = usize::try_from(ip)
            .ok()
            .and_then(|i| self.program.get(i))
            .unwrap_or_default();
        Fault { ip, opcode, kind }
    }

    /// Decodes the instruction at the given index
    pub fn decode(&self, ip: usize) -> Result<Instruction, FaultKind> {
        Instruction::decode(self.program.as_slice(), ip)
    }

    /// Runs the VM until it halts, runs off the end of the program, or faults
    ///
    /// Returns the terminal state ([`State::Halted`] or [`State::Exhausted`]).
    pub fn run<M: Monitor>(&mut self, mon: &mut M) -> Result<State, Fault> {
        while !self.state.is_terminal() {
            self.step(mon)?;
        }
        Ok(self.state)
    }

    /// Runs the VM until termination or until the callback returns `true`
    ///
    /// The callback is invoked before each instruction with the number of
    /// instructions executed so far.  Returns `None` if the callback stopped
    /// execution, leaving the VM in [`State::Running`].
    pub fn run_until<M, F>(
        &mut self,
        mon: &mut M,
        mut f: F,
    ) -> Result<Option<State>, Fault>
    where
        M: Monitor,
        F: FnMut(&Vm, &mut M, usize) -> bool,
    {
        let mut i = 0;
        while !self.state.is_terminal() {
            if f(&*self, &mut *mon, i) {
                return Ok(None);
            }
            self.step(mon)?;
            i += 1;
        }
        Ok(Some(self.state))
    }

    /// Executes a single instruction, returning the resulting state
    ///
    /// If the VM is already in a terminal state, this does nothing.
    pub fn step<M: Monitor>(&mut self, mon: &mut M) -> Result<State, Fault> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        let start = self.ip();
        let Ok(ip) = usize::try_from(start) else {
            let kind = FaultKind::OutOfRangeJump { target: start };
            return Err(self.fault(start, kind));
        };
        let instr =
            self.decode(ip).map_err(|kind| self.fault(start, kind))?;
        mon.step(self, ip, &instr);

        match self.op(&instr, mon) {
            Ok(Flow::Next) => {
                let width = instr.op.width() as i32;
                match self.ip().checked_add(1 + width) {
                    Some(next) if next < 0 => {
                        // Undo the handler's write to IP
                        self.regs[Register::Ip] = start;
                        let kind = FaultKind::OutOfRangeJump { target: next };
                        return Err(self.fault(start, kind));
                    }
                    Some(next) => self.regs[Register::Ip] = next,
                    None => self.regs[Register::Ip] = i32::MAX,
                }
            }
            Ok(Flow::Jump(target)) => {
                // target was decoded from a non-negative i32 operand
                self.regs[Register::Ip] = target as i32;
            }
            Ok(Flow::Halt) => self.state = State::Halted,
            Err(kind) => return Err(self.fault(start, kind)),
        }
        self.check_exhausted();
        Ok(self.state)
    }

    /// Executes a single decoded instruction
    #[inline]
    fn op<M: Monitor>(
        &mut self,
        instr: &Instruction,
        mon: &mut M,
    ) -> Result<Flow, FaultKind> {
        match instr.op {
            Opcode::Hlt => op::hlt(self, mon),
            Opcode::Psh => op::psh(self, instr),
            Opcode::Pop => op::pop(self),
            Opcode::Add => op::arith(self, mon, Opcode::Add, |a, b| {
                Ok(a.wrapping_add(b))
            }),
            Opcode::Mul => op::arith(self, mon, Opcode::Mul, |a, b| {
                Ok(a.wrapping_mul(b))
            }),
            Opcode::Div => op::arith(self, mon, Opcode::Div, |a, b| {
                if b == 0 {
                    Err(FaultKind::DivisionByZero)
                } else {
                    Ok(a.wrapping_div(b))
                }
            }),
            Opcode::Sub => op::arith(self, mon, Opcode::Sub, |a, b| {
                Ok(a.wrapping_sub(b))
            }),
            Opcode::Slt => op::slt(self),
            Opcode::Mov => op::mov(self, instr),
            Opcode::Set => op::set(self, instr),
            Opcode::Log => op::log(self, mon, instr),
            Opcode::If => op::branch(self, instr, |a, b| a == b),
            Opcode::Ifn => op::branch(self, instr, |a, b| a != b),
            Opcode::Gld => op::gld(self, instr),
            Opcode::Gpt => op::gpt(self, instr),
            Opcode::Nop => op::nop(self, mon),
        }
    }
}

mod op {
    use super::*;

    /// Decodes a register operand
    #[inline]
    fn reg(index: i32) -> Result<Register, FaultKind> {
        Register::try_from(index)
            .map_err(|index| FaultKind::InvalidRegister { index })
    }

    /// Halt
    ///
    /// ```text
    /// HLT --
    /// ```
    ///
    /// Stops execution; the VM enters [`State::Halted`].
    #[inline]
    pub fn hlt<M: Monitor>(
        vm: &mut Vm,
        mon: &mut M,
    ) -> Result<Flow, FaultKind> {
        mon.event(vm, Event::Halt);
        Ok(Flow::Halt)
    }

    /// Push
    ///
    /// ```text
    /// PSH val -- val
    /// ```
    ///
    /// Pushes the immediate which follows the opcode.
    #[inline]
    pub fn psh(vm: &mut Vm, instr: &Instruction) -> Result<Flow, FaultKind> {
        vm.stack_view().push(instr.arg(0))?;
        Ok(Flow::Next)
    }

    /// Pop
    ///
    /// ```text
    /// POP a --
    /// ```
    ///
    /// Discards the value at the top of the stack.
    #[inline]
    pub fn pop(vm: &mut Vm) -> Result<Flow, FaultKind> {
        vm.stack_view().pop()?;
        Ok(Flow::Next)
    }

    /// Shared implementation of `ADD`, `SUB`, `MUL`, and `DIV`
    ///
    /// ```text
    /// ADD a b -- a+b
    /// SUB a b -- a-b
    /// MUL a b -- a*b
    /// DIV a b -- a/b
    /// ```
    ///
    /// The right-hand operand is the value on top of the stack.  As a side
    /// effect, `A` receives the right-hand operand, `B` the left-hand operand,
    /// and `C` the result.  Nothing is modified if `f` returns an error.
    ///
    /// ```text
    /// PSH 3 PSH 4 SUB   ( -1 )
    /// PSH 7 PSH 2 DIV   ( 3 )
    /// ```
    #[inline]
    pub fn arith<M: Monitor>(
        vm: &mut Vm,
        mon: &mut M,
        op: Opcode,
        f: fn(i32, i32) -> Result<i32, FaultKind>,
    ) -> Result<Flow, FaultKind> {
        let mut s = vm.stack_view();
        let right = s.peek_at(0)?;
        let left = s.peek_at(1)?;
        let result = f(left, right)?;
        s.pop()?;
        s.emplace(result)?;

        vm.regs[Register::A] = right;
        vm.regs[Register::B] = left;
        vm.regs[Register::C] = result;
        mon.event(
            vm,
            Event::Arith {
                op,
                left,
                right,
                result,
            },
        );
        Ok(Flow::Next)
    }

    /// Set Less Than
    ///
    /// ```text
    /// SLT a b -- bool
    /// ```
    ///
    /// Pushes `1` if the second value on the stack is strictly less than the
    /// value at the top of the stack, `0` otherwise.
    ///
    /// ```text
    /// PSH 2 PSH 5 SLT   ( 1 )
    /// PSH 5 PSH 2 SLT   ( 0 )
    /// ```
    #[inline]
    pub fn slt(vm: &mut Vm) -> Result<Flow, FaultKind> {
        let mut s = vm.stack_view();
        let b = s.peek_at(0)?;
        let a = s.peek_at(1)?;
        s.pop()?;
        s.emplace(i32::from(a < b))?;
        Ok(Flow::Next)
    }

    /// Move
    ///
    /// ```text
    /// MOV src dst
    /// ```
    ///
    /// Copies the value of register `src` into register `dst`.
    #[inline]
    pub fn mov(vm: &mut Vm, instr: &Instruction) -> Result<Flow, FaultKind> {
        let src = reg(instr.arg(0))?;
        let dst = reg(instr.arg(1))?;
        vm.regs[dst] = vm.regs[src];
        Ok(Flow::Next)
    }

    /// Set
    ///
    /// ```text
    /// SET dst val
    /// ```
    ///
    /// Writes the immediate `val` into register `dst`.
    #[inline]
    pub fn set(vm: &mut Vm, instr: &Instruction) -> Result<Flow, FaultKind> {
        let dst = reg(instr.arg(0))?;
        vm.regs[dst] = instr.arg(1);
        Ok(Flow::Next)
    }

    /// Log
    ///
    /// ```text
    /// LOG reg
    /// ```
    ///
    /// Reports the value of a register to the monitor.
    #[inline]
    pub fn log<M: Monitor>(
        vm: &mut Vm,
        mon: &mut M,
        instr: &Instruction,
    ) -> Result<Flow, FaultKind> {
        let r = reg(instr.arg(0))?;
        let value = vm.regs[r];
        mon.event(vm, Event::Log { reg: r, value });
        Ok(Flow::Next)
    }

    /// Conditional branch, shared by `IF` and `IFN`
    ///
    /// ```text
    /// IF  reg val target
    /// IFN reg val target
    /// ```
    ///
    /// If `cond(reg, val)` holds, moves the instruction pointer to the absolute
    /// index `target`; otherwise continues with the next instruction.  The
    /// target is only validated when the branch is taken.
    #[inline]
    pub fn branch(
        vm: &mut Vm,
        instr: &Instruction,
        cond: fn(i32, i32) -> bool,
    ) -> Result<Flow, FaultKind> {
        let r = reg(instr.arg(0))?;
        if !cond(vm.regs[r], instr.arg(1)) {
            return Ok(Flow::Next);
        }
        let target = instr.arg(2);
        usize::try_from(target)
            .ok()
            .filter(|&t| t < vm.program.len())
            .map(Flow::Jump)
            .ok_or(FaultKind::OutOfRangeJump { target })
    }

    /// Global Load
    ///
    /// ```text
    /// GLD reg -- v
    /// ```
    ///
    /// Pushes the value of a register.
    #[inline]
    pub fn gld(vm: &mut Vm, instr: &Instruction) -> Result<Flow, FaultKind> {
        let r = reg(instr.arg(0))?;
        let v = vm.regs[r];
        vm.stack_view().push(v)?;
        Ok(Flow::Next)
    }

    /// Global Put
    ///
    /// ```text
    /// GPT reg  a -- a
    /// ```
    ///
    /// Copies the value at the top of the stack into a register, without
    /// popping it.
    #[inline]
    pub fn gpt(vm: &mut Vm, instr: &Instruction) -> Result<Flow, FaultKind> {
        let r = reg(instr.arg(0))?;
        let v = vm.stack_view().peek()?;
        vm.regs[r] = v;
        Ok(Flow::Next)
    }

    /// No operation
    #[inline]
    pub fn nop<M: Monitor>(
        vm: &mut Vm,
        mon: &mut M,
    ) -> Result<Flow, FaultKind> {
        mon.event(vm, Event::Nop);
        Ok(Flow::Next)
    }
}
