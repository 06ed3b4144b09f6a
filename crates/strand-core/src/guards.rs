//! # RAII Guards
//!
//! Guards that put the live register view back when dropped.
//!
//! Emulating a suspended thread means overwriting the live registers of the
//! selected kernel thread. The guard below captures them first and restores
//! them on every exit path: explicitly through [`BorrowedRegisterView::release`]
//! on the normal path, and from `Drop` if the caller returns early or panics.
//!
//! ## Example
//!
//! ```rust,no_run
//! use strand_core::guards::BorrowedRegisterView;
//! use strand_core::TargetDebugger;
//!
//! fn peek<D: TargetDebugger>(debugger: &mut D) -> strand_core::Result<()>
//! {
//!     let view = BorrowedRegisterView::enter(debugger)?;
//!     // ... write foreign registers, inspect ...
//!     view.release()
//! }
//! ```

use std::ops::{Deref, DerefMut};

use crate::debugger::TargetDebugger;
use crate::error::Result;
use crate::layout::SuspendedRegisters;
use crate::snapshot;
use crate::types::{RegisterId, RegisterSet};

/// Exclusive borrow of the live register view
///
/// While the guard exists the debugger is only reachable through it, so
/// nothing can observe or capture the borrowed registers by accident.
pub struct BorrowedRegisterView<'d, D>
where
    D: TargetDebugger + ?Sized,
{
    debugger: &'d mut D,
    original: RegisterSet,
    active: bool,
}

impl<'d, D> BorrowedRegisterView<'d, D>
where
    D: TargetDebugger + ?Sized,
{
    /// Capture the live registers and take the view.
    ///
    /// ## Errors
    ///
    /// - `RegisterAccess`: the capture failed; nothing was written
    pub fn enter(debugger: &'d mut D) -> Result<Self>
    {
        let original = snapshot::capture(&*debugger)?;
        tracing::trace!(sp = %original.sp(), pc = %original.pc(), "borrowed register view");
        Ok(Self {
            debugger,
            original,
            active: true,
        })
    }

    /// Registers as they were when the view was taken.
    pub fn original(&self) -> &RegisterSet
    {
        &self.original
    }

    /// Load a suspended thread's registers into the live view.
    ///
    /// Callee-saved registers go first, then the stack pointer, then the
    /// program counter.
    ///
    /// ## Errors
    ///
    /// - `RegisterAccess`: a write failed; the guard still restores on release
    pub fn load(&mut self, suspended: &SuspendedRegisters) -> Result<()>
    {
        for (register, value) in &suspended.callee_saved {
            self.debugger.write_register(RegisterId::CalleeSaved(*register), *value)?;
        }
        self.debugger.write_register(RegisterId::Sp, suspended.stack_pointer.value())?;
        self.debugger.write_register(RegisterId::Pc, suspended.program_counter.value())?;
        Ok(())
    }

    /// Restore the captured registers and give the view back.
    ///
    /// After calling this, dropping the guard is a no-op.
    ///
    /// ## Errors
    ///
    /// - `RegisterAccess`: a restore write failed
    pub fn release(mut self) -> Result<()>
    {
        self.active = false;
        snapshot::restore(&mut *self.debugger, &self.original)
    }
}

impl<D> Deref for BorrowedRegisterView<'_, D>
where
    D: TargetDebugger + ?Sized,
{
    type Target = D;

    fn deref(&self) -> &Self::Target
    {
        self.debugger
    }
}

impl<D> DerefMut for BorrowedRegisterView<'_, D>
where
    D: TargetDebugger + ?Sized,
{
    fn deref_mut(&mut self) -> &mut Self::Target
    {
        self.debugger
    }
}

impl<D> Drop for BorrowedRegisterView<'_, D>
where
    D: TargetDebugger + ?Sized,
{
    fn drop(&mut self)
    {
        if self.active {
            if let Err(err) = snapshot::restore(&mut *self.debugger, &self.original) {
                tracing::error!(error = %err, "failed to restore registers after emulation");
            }
        }
    }
}
