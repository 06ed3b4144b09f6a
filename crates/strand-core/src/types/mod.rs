//! # Types
//!
//! Types shared by every inspection operation.
//!
//! These types describe what the engine reads and writes: addresses in the
//! halted process, the registers it borrows, the typed values the debugger
//! evaluates, and the frames a backtrace produces.

pub mod address;
pub mod process;
pub mod registers;
pub mod stack;
pub mod symbols;
pub mod value;

// Re-export all public types
pub use address::Address;
pub use process::{KernelThreadId, ThreadContext};
pub use registers::{CalleeSaved, RegisterId, RegisterSet};
pub use stack::{Backtrace, FrameStatus, StackFrame};
pub use symbols::{SymbolLanguage, SymbolName};
pub use value::{Expr, Value};
