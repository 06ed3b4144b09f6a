//! Common module for library exports

pub use crate::backtrace::{BacktraceOperation, BacktraceReport, BacktraceTarget, ThreadBacktrace};
pub use crate::debugger::TargetDebugger;
pub use crate::error::{Result, StrandError, UsageError};
pub use crate::layout::RuntimeLayout;
pub use crate::platform::ImageDebugger;
pub use crate::session::Session;
pub use crate::stack_usage::{SlotStackUsage, StackUsageReport};
pub use crate::switch::{ContextSwitchOperation, SavedNativeState, SwitchOutcome};
pub use crate::types::{Address, Backtrace, Expr, KernelThreadId, RegisterId, RegisterSet, ThreadContext, Value};
