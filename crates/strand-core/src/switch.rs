//! # Context Switching
//!
//! Point a kernel thread's live registers at a suspended cooperative thread
//! so the operator can inspect it with ordinary debugger commands, and put
//! them back afterwards.
//!
//! Unlike a backtrace, a switch leaves the borrowed registers in place until
//! the operator switches back. Each kernel thread is in one of two states:
//!
//! ```text
//!   NATIVE   --switch_to(foreign)-->          DIVERTED  (entry saved)
//!   DIVERTED --switch_to(foreign)-->          DIVERTED  (entry unchanged)
//!   DIVERTED --switch_to(loaded) / none-->    NATIVE    (entry restored, removed)
//!   NATIVE   --switch_to_none-->              NATIVE    (no-op)
//! ```
//!
//! Only the stack pointer and program counter are swapped. The runtime's
//! notion of the loaded context is never updated.

use std::collections::HashMap;
use std::fmt;

use crate::debugger::TargetDebugger;
use crate::error::Result;
use crate::identity::CoreState;
use crate::layout::{RuntimeLayout, SuspendedRegisters};
use crate::types::{Address, KernelThreadId, RegisterId, ThreadContext};

/// Live stack pointer and program counter of a kernel thread before it was
/// first diverted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedNativeState
{
    /// Stack pointer to restore.
    pub stack_pointer: Address,
    /// Program counter to restore.
    pub program_counter: Address,
}

impl fmt::Display for SavedNativeState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "sp={} pc={}", self.stack_pointer, self.program_counter)
    }
}

/// What a switch command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome
{
    /// The live view now shows `context`
    Emulating
    {
        /// Thread being emulated
        context: ThreadContext,
        /// `true` if this switch saved the native state
        first_divergence: bool,
    },
    /// The kernel thread was diverted and is back on its native state
    RestoredNative(SavedNativeState),
    /// The kernel thread was not diverted; nothing was written
    AlreadyNative,
}

/// Session-scoped switch state, one saved entry per diverted kernel thread
#[derive(Debug, Default)]
pub struct ContextSwitchOperation
{
    saved: HashMap<KernelThreadId, SavedNativeState>,
}

impl ContextSwitchOperation
{
    /// No kernel thread diverted.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Emulate `target` on `kernel_thread`
    ///
    /// If `target` is the loaded context this is the same as
    /// [`ContextSwitchOperation::restore_if_diverted`]. Otherwise the native
    /// state is saved the first time the kernel thread is diverted, and kept
    /// unchanged on later switches, so a chain of switches always returns to
    /// where the operator started.
    ///
    /// ## Errors
    ///
    /// - `Evaluation`: the core state or the target's saved stack is unreadable
    /// - `RegisterAccess`: reading or writing sp/pc failed
    pub fn switch_to<D>(
        &mut self,
        debugger: &mut D,
        layout: &RuntimeLayout,
        target: ThreadContext,
        kernel_thread: KernelThreadId,
    ) -> Result<SwitchOutcome>
    where
        D: TargetDebugger + ?Sized,
    {
        let core = CoreState::read(&*debugger, layout)?;
        if core.is_currently_loaded(target) {
            tracing::debug!(context = %target, "target is loaded, switching back to native");
            return self.restore_if_diverted(debugger, kernel_thread);
        }

        let (stack_pointer, program_counter) = SuspendedRegisters::read_entry(&*debugger, layout, target)?;

        let first_divergence = !self.saved.contains_key(&kernel_thread);
        if first_divergence {
            let native = SavedNativeState {
                stack_pointer: Address::from(debugger.read_register(RegisterId::Sp)?),
                program_counter: Address::from(debugger.read_register(RegisterId::Pc)?),
            };
            tracing::debug!(thread = %kernel_thread, native = %native, "saving native state");
            self.saved.insert(kernel_thread, native);
        }

        debugger.write_register(RegisterId::Sp, stack_pointer.value())?;
        debugger.write_register(RegisterId::Pc, program_counter.value())?;

        tracing::info!(
            thread = %kernel_thread,
            context = %target,
            sp = %stack_pointer,
            pc = %program_counter,
            "switched to cooperative thread"
        );
        Ok(SwitchOutcome::Emulating {
            context: target,
            first_divergence,
        })
    }

    /// Put a diverted kernel thread back on its native state
    ///
    /// The saved entry is only dropped once both writes succeeded, so a
    /// failed restore can be retried.
    ///
    /// ## Errors
    ///
    /// - `RegisterAccess`: a restore write failed
    pub fn restore_if_diverted<D>(&mut self, debugger: &mut D, kernel_thread: KernelThreadId) -> Result<SwitchOutcome>
    where
        D: TargetDebugger + ?Sized,
    {
        let Some(native) = self.saved.get(&kernel_thread).copied() else {
            tracing::debug!(thread = %kernel_thread, "kernel thread not diverted");
            return Ok(SwitchOutcome::AlreadyNative);
        };

        debugger.write_register(RegisterId::Sp, native.stack_pointer.value())?;
        debugger.write_register(RegisterId::Pc, native.program_counter.value())?;
        self.saved.remove(&kernel_thread);

        tracing::info!(thread = %kernel_thread, native = %native, "restored native state");
        Ok(SwitchOutcome::RestoredNative(native))
    }

    /// Alias for [`ContextSwitchOperation::restore_if_diverted`].
    ///
    /// ## Errors
    ///
    /// Same as [`ContextSwitchOperation::restore_if_diverted`].
    pub fn switch_to_none<D>(&mut self, debugger: &mut D, kernel_thread: KernelThreadId) -> Result<SwitchOutcome>
    where
        D: TargetDebugger + ?Sized,
    {
        self.restore_if_diverted(debugger, kernel_thread)
    }

    /// Saved native state of a diverted kernel thread.
    #[must_use]
    pub fn saved_state(&self, kernel_thread: KernelThreadId) -> Option<SavedNativeState>
    {
        self.saved.get(&kernel_thread).copied()
    }

    /// Whether `kernel_thread` currently shows a borrowed view.
    #[must_use]
    pub fn is_diverted(&self, kernel_thread: KernelThreadId) -> bool
    {
        self.saved.contains_key(&kernel_thread)
    }

    /// Kernel threads currently diverted, in no particular order.
    pub fn diverted(&self) -> impl Iterator<Item = KernelThreadId> + '_
    {
        self.saved.keys().copied()
    }
}
