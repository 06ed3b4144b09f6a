//! Stack frame types.

use std::fmt;

use super::symbols::SymbolName;
use super::{Address, KernelThreadId};

/// Indicates how a frame was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus
{
    /// Innermost frame, taken straight from the live registers.
    Registers,
    /// Recovered by following the saved frame-pointer chain.
    FramePointer,
}

/// One physical stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame
{
    /// Position in the trace, 0 = innermost.
    pub index: usize,
    /// Program counter for this frame.
    pub pc: Address,
    /// Stack pointer snapshot.
    pub sp: Address,
    /// Frame pointer snapshot.
    pub fp: Address,
    /// Best-effort symbol for the frame.
    pub symbol: Option<SymbolName>,
    /// Reliability indicator.
    pub status: FrameStatus,
}

impl fmt::Display for StackFrame
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.symbol {
            Some(symbol) => write!(f, "#{:<3} {} in {} ()", self.index, self.pc, symbol),
            None => write!(f, "#{:<3} {} in ?? ()", self.index, self.pc),
        }
    }
}

/// Call stack rendered by the debugger from the live register view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backtrace
{
    /// Kernel thread whose registers were unwound.
    pub thread: KernelThreadId,
    /// Frames, innermost first.
    pub frames: Vec<StackFrame>,
}

impl Backtrace
{
    /// Program counter of the innermost frame.
    pub fn innermost_pc(&self) -> Option<Address>
    {
        self.frames.first().map(|frame| frame.pc)
    }
}

impl fmt::Display for Backtrace
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{frame}")?;
        }
        Ok(())
    }
}
