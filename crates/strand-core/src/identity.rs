//! Which cooperative thread is live in the hardware registers.

use crate::debugger::TargetDebugger;
use crate::error::Result;
use crate::layout::RuntimeLayout;
use crate::types::{Address, Expr, ThreadContext};

/// Scheduler state of the core the selected kernel thread runs
///
/// The runtime owns this state; the engine only reads it and never writes
/// it back, not even while emulating. Identity checks therefore always
/// reflect what the scheduler really has loaded, not the operator's
/// borrowed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreState
{
    loaded_context: Address,
}

impl CoreState
{
    /// State with a known loaded context (null when none is loaded).
    #[must_use]
    pub const fn new(loaded_context: Address) -> Self
    {
        Self { loaded_context }
    }

    /// Evaluate the layout's loaded-context global.
    ///
    /// ## Errors
    ///
    /// - `Evaluation`: the global is not visible from the selected thread
    pub fn read<D>(debugger: &D, layout: &RuntimeLayout) -> Result<Self>
    where
        D: TargetDebugger + ?Sized,
    {
        let loaded = debugger.evaluate(&Expr::Symbol(layout.loaded_context.clone()))?;
        tracing::trace!(loaded_context = %loaded.as_address(), "read core state");
        Ok(Self::new(loaded.as_address()))
    }

    /// Context whose registers are the live registers.
    #[must_use]
    pub const fn loaded_context(&self) -> Address
    {
        self.loaded_context
    }

    /// `true` when `candidate` is already running; emulating it is a no-op.
    #[must_use]
    pub fn is_currently_loaded(&self, candidate: ThreadContext) -> bool
    {
        candidate.address() == self.loaded_context
    }
}
