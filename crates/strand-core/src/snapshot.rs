//! Capture and restore of the live register set.

use crate::debugger::TargetDebugger;
use crate::error::Result;
use crate::types::{Address, CalleeSaved, RegisterId, RegisterSet};

/// Read the stack pointer, program counter and callee-saved registers.
///
/// ## Errors
///
/// - `RegisterAccess`: any of the reads fails
pub fn capture<D>(debugger: &D) -> Result<RegisterSet>
where
    D: TargetDebugger + ?Sized,
{
    let sp = Address::from(debugger.read_register(RegisterId::Sp)?);
    let pc = Address::from(debugger.read_register(RegisterId::Pc)?);
    let mut callee_saved = [0u64; 6];
    for (slot, register) in callee_saved.iter_mut().zip(CalleeSaved::ALL) {
        *slot = debugger.read_register(RegisterId::CalleeSaved(register))?;
    }
    Ok(RegisterSet::new(sp, pc, callee_saved))
}

/// Write a captured set back, stack pointer before program counter.
///
/// Every register is attempted even if an earlier write fails, so that a
/// single broken register leaves as much of the view restored as possible.
///
/// ## Errors
///
/// - `RegisterAccess`: the first write that failed
pub fn restore<D>(debugger: &mut D, snapshot: &RegisterSet) -> Result<()>
where
    D: TargetDebugger + ?Sized,
{
    let mut first_error = None;
    for register in RegisterId::ALL {
        if let Err(err) = debugger.write_register(register, snapshot.get(register)) {
            tracing::warn!(register = %register, error = %err, "failed to restore register");
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
