//! # Debugger Capabilities
//!
//! The interface the engine consumes from the host debugger.
//!
//! The engine never parses commands, never evaluates expressions itself and
//! never unwinds stacks itself. It borrows those abilities from whatever
//! debugger it is embedded in, through this trait:
//!
//! - **Registers**: read and write the live register view of the selected kernel thread
//! - **Evaluation**: turn an [`Expr`] into a typed [`Value`]
//! - **Backtrace**: render a call stack from the current live registers
//!
//! ## Why use a trait?
//!
//! - The same engine can drive gdb, lldb or the bundled process image backend
//! - Tests can count every register write and inject failures
//!
//! The trait has no memory write. Emulation only ever changes registers.

use crate::error::Result;
use crate::types::{Backtrace, Expr, KernelThreadId, RegisterId, Value};

/// Capabilities borrowed from the host debugger
///
/// Every call happens while the inspected process is fully halted, from a
/// single operator. Implementations need no internal synchronisation.
pub trait TargetDebugger
{
    /// Read a live register of the selected kernel thread
    ///
    /// ## Errors
    ///
    /// - `RegisterAccess`: the register cannot be read
    fn read_register(&self, register: RegisterId) -> Result<u64>;

    /// Overwrite a live register of the selected kernel thread
    ///
    /// This only changes the debugger's register view. The target stays
    /// halted, so nothing executes with the borrowed values unless the
    /// operator resumes it.
    ///
    /// ## Errors
    ///
    /// - `RegisterAccess`: the register cannot be written
    fn write_register(&mut self, register: RegisterId, value: u64) -> Result<()>;

    /// Evaluate an expression in the context of the halted process
    ///
    /// ## Errors
    ///
    /// - `Evaluation`: unknown symbol, unreadable memory, malformed text
    fn evaluate(&self, expr: &Expr) -> Result<Value>;

    /// Render a call stack from the current live registers
    ///
    /// ## Errors
    ///
    /// - `Backtrace`: the debugger could not unwind from the current registers
    fn native_backtrace(&self) -> Result<Backtrace>;

    /// The kernel thread whose register view is currently selected
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: no thread is selected
    fn selected_kernel_thread(&self) -> Result<KernelThreadId>;
}
