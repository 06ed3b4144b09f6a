//! # strand-core
//!
//! Inspection engine for suspended cooperative threads.
//!
//! A cooperative threading runtime multiplexes many user-level threads onto
//! a few kernel threads. A debugger only knows about the kernel threads, so
//! every suspended cooperative thread is invisible to it: its registers sit
//! on its own stack, pushed there by the runtime's switch routine.
//!
//! This crate makes them visible by borrowing a kernel thread's register
//! view:
//! - Backtrace any suspended thread, or every thread on a core
//! - Switch the live view to a suspended thread and back again
//! - Measure how deep each thread's stack is
//!
//! ## How it fits together
//!
//! The engine consumes a [`TargetDebugger`] (register access, expression
//! evaluation, native backtraces) and never touches the inspected process's
//! memory. [`layout::RuntimeLayout`] describes where the runtime keeps its
//! state, with defaults for Arachne on x86-64. [`Session`] ties a backend, a
//! layout and the per-session switch state together behind the operator
//! commands.
//!
//! [`platform::ImageDebugger`] is a backend over a JSON snapshot of a halted
//! process.

pub mod backtrace;
pub mod debugger;
pub mod error;
pub mod guards;
pub mod identity;
pub mod layout;
pub mod occupancy;
pub mod platform;
pub mod prelude;
pub mod session;
pub mod snapshot;
pub mod stack_usage;
pub mod switch;
pub mod symbols;
pub mod types;
pub mod unwind;

pub use debugger::TargetDebugger;
// Re-export commonly used types
pub use error::{Result, StrandError, UsageError};
pub use session::Session;
pub use types::{Address, KernelThreadId, RegisterId, ThreadContext, Value};
