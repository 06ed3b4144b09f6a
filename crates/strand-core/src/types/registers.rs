//! Register identifiers and the captured register set.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Address;

/// Identifier for a live register the engine reads or writes
///
/// The engine only ever touches the stack pointer, the program counter and
/// the callee-saved registers that the runtime's switch routine pushes.
///
/// ```rust
/// use strand_core::types::{CalleeSaved, RegisterId};
///
/// assert_eq!(RegisterId::Sp.name(), "sp");
/// assert_eq!(RegisterId::CalleeSaved(CalleeSaved::R15).name(), "r15");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterId
{
    /// Stack Pointer (RSP on x86-64)
    Sp,
    /// Program Counter (RIP on x86-64)
    Pc,
    /// One of the callee-saved general-purpose registers
    CalleeSaved(CalleeSaved),
}

impl RegisterId
{
    /// Every register that makes up a [`RegisterSet`], in restore order.
    pub const ALL: [RegisterId; 8] = [
        RegisterId::Sp,
        RegisterId::Pc,
        RegisterId::CalleeSaved(CalleeSaved::Rbp),
        RegisterId::CalleeSaved(CalleeSaved::Rbx),
        RegisterId::CalleeSaved(CalleeSaved::R12),
        RegisterId::CalleeSaved(CalleeSaved::R13),
        RegisterId::CalleeSaved(CalleeSaved::R14),
        RegisterId::CalleeSaved(CalleeSaved::R15),
    ];

    /// Debugger-facing register name (without the `$` sigil).
    #[must_use]
    pub const fn name(self) -> &'static str
    {
        match self {
            RegisterId::Sp => "sp",
            RegisterId::Pc => "pc",
            RegisterId::CalleeSaved(reg) => reg.name(),
        }
    }

    /// Parse a register name, accepting the x86-64 aliases `rsp` and `rip`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self>
    {
        match name {
            "sp" | "rsp" => Some(RegisterId::Sp),
            "pc" | "rip" => Some(RegisterId::Pc),
            other => CalleeSaved::ALL
                .iter()
                .find(|reg| reg.name() == other)
                .map(|reg| RegisterId::CalleeSaved(*reg)),
        }
    }
}

impl fmt::Display for RegisterId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "${}", self.name())
    }
}

/// x86-64 SysV callee-saved registers
///
/// These are the registers a cooperative switch routine has to preserve
/// across a call, and therefore the ones it pushes before swapping stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalleeSaved
{
    /// RBP - frame pointer
    Rbp,
    /// RBX - base register
    Rbx,
    /// R12
    R12,
    /// R13
    R13,
    /// R14
    R14,
    /// R15
    R15,
}

impl CalleeSaved
{
    /// All callee-saved registers, in the order a [`RegisterSet`] stores them.
    pub const ALL: [CalleeSaved; 6] = [
        CalleeSaved::Rbp,
        CalleeSaved::Rbx,
        CalleeSaved::R12,
        CalleeSaved::R13,
        CalleeSaved::R14,
        CalleeSaved::R15,
    ];

    /// Register name without the `$` sigil.
    #[must_use]
    pub const fn name(self) -> &'static str
    {
        match self {
            CalleeSaved::Rbp => "rbp",
            CalleeSaved::Rbx => "rbx",
            CalleeSaved::R12 => "r12",
            CalleeSaved::R13 => "r13",
            CalleeSaved::R14 => "r14",
            CalleeSaved::R15 => "r15",
        }
    }

    const fn index(self) -> usize
    {
        match self {
            CalleeSaved::Rbp => 0,
            CalleeSaved::Rbx => 1,
            CalleeSaved::R12 => 2,
            CalleeSaved::R13 => 3,
            CalleeSaved::R14 => 4,
            CalleeSaved::R15 => 5,
        }
    }
}

/// Immutable snapshot of the registers that emulation overwrites
///
/// A `RegisterSet` is captured once, before the live view is borrowed, and
/// is only ever used to put that view back. It cannot be edited after
/// construction, so it can never be partially applied.
///
/// ```rust
/// use strand_core::types::{Address, CalleeSaved, RegisterSet};
///
/// let set = RegisterSet::new(Address::from(0x7ff0), Address::from(0x401000), [1, 2, 3, 4, 5, 6]);
/// assert_eq!(set.callee_saved(CalleeSaved::Rbp), 1);
/// assert_eq!(set.callee_saved(CalleeSaved::R15), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSet
{
    sp: Address,
    pc: Address,
    callee_saved: [u64; 6],
}

impl RegisterSet
{
    /// Build a set; `callee_saved` is ordered as [`CalleeSaved::ALL`].
    #[must_use]
    pub const fn new(sp: Address, pc: Address, callee_saved: [u64; 6]) -> Self
    {
        Self { sp, pc, callee_saved }
    }

    /// Saved stack pointer.
    #[must_use]
    pub const fn sp(&self) -> Address
    {
        self.sp
    }

    /// Saved program counter.
    #[must_use]
    pub const fn pc(&self) -> Address
    {
        self.pc
    }

    /// Saved value of one callee-saved register.
    #[must_use]
    pub const fn callee_saved(&self, register: CalleeSaved) -> u64
    {
        self.callee_saved[register.index()]
    }

    /// Value of any register in the set.
    #[must_use]
    pub const fn get(&self, register: RegisterId) -> u64
    {
        match register {
            RegisterId::Sp => self.sp.value(),
            RegisterId::Pc => self.pc.value(),
            RegisterId::CalleeSaved(reg) => self.callee_saved(reg),
        }
    }
}

impl fmt::Display for RegisterSet
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for (i, register) in RegisterId::ALL.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:<4} 0x{:016x}", register.name(), self.get(*register))?;
        }
        Ok(())
    }
}
