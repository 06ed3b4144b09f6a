//! Stack depth of the threads on a core.
//!
//! Reports, for every slot of the core, how far the saved stack pointer sits
//! above the lowest address of the thread's stack. Contexts are preallocated
//! per slot, so idle slots report the depth their last thread left behind.
//! The value of the loaded thread is stale: its context still holds the stack
//! pointer from its last suspension.

use crate::debugger::TargetDebugger;
use crate::error::Result;
use crate::identity::CoreState;
use crate::layout::{RuntimeLayout, SuspendedRegisters};
use crate::occupancy::OccupancyScanner;
use crate::types::{Address, ThreadContext};

/// Stack usage of one slot
#[derive(Debug)]
pub struct SlotStackUsage
{
    /// Slot index.
    pub slot: usize,
    /// Context address, zero if the slot could not be read.
    pub context: Address,
    /// The slot's bit is set in the occupancy mask.
    pub occupied: bool,
    /// The context is loaded on the core.
    pub loaded: bool,
    /// `saved sp - stack base` in bytes.
    pub outcome: Result<i64>,
}

/// Stack usage of every slot
#[derive(Debug, Default)]
pub struct StackUsageReport
{
    /// Entries in slot order.
    pub slots: Vec<SlotStackUsage>,
}

/// Measures saved stack depth per slot
pub struct StackUsage<'a>
{
    layout: &'a RuntimeLayout,
}

impl<'a> StackUsage<'a>
{
    /// Measurement for the given layout.
    pub fn new(layout: &'a RuntimeLayout) -> Self
    {
        Self { layout }
    }

    /// Measure every slot of the current core, occupied or not.
    ///
    /// Nothing is written. A slot that cannot be read is recorded and the
    /// scan continues.
    ///
    /// ## Errors
    ///
    /// - `NotATargetCore`: the selected thread is not a runtime core
    /// - `Evaluation`: the occupancy mask or loaded context is unreadable
    pub fn measure<D>(&self, debugger: &D) -> Result<StackUsageReport>
    where
        D: TargetDebugger + ?Sized,
    {
        let scanner = OccupancyScanner::new(self.layout);
        let mask = scanner.read_mask(debugger)?;
        let core = CoreState::read(debugger, self.layout)?;

        let mut report = StackUsageReport::default();
        for index in 0..mask.width() {
            let slot = index as usize;
            let occupied = mask.is_occupied(index);
            let entry = match scanner.slot(debugger, slot) {
                Ok(value) => match ThreadContext::resolve(&value, &self.layout.context_type) {
                    Ok(context) => SlotStackUsage {
                        slot,
                        context: context.address(),
                        occupied,
                        loaded: core.is_currently_loaded(context),
                        outcome: self.depth(debugger, context),
                    },
                    Err(err) => SlotStackUsage {
                        slot,
                        context: value.as_address(),
                        occupied,
                        loaded: false,
                        outcome: Err(err.into()),
                    },
                },
                Err(err) => SlotStackUsage {
                    slot,
                    context: Address::ZERO,
                    occupied,
                    loaded: false,
                    outcome: Err(err),
                },
            };
            if let Err(err) = &entry.outcome {
                if occupied {
                    tracing::warn!(slot, error = %err, "failed to measure stack usage");
                } else {
                    tracing::debug!(slot, error = %err, "idle slot has no readable context");
                }
            }
            report.slots.push(entry);
        }
        Ok(report)
    }

    fn depth<D>(&self, debugger: &D, context: ThreadContext) -> Result<i64>
    where
        D: TargetDebugger + ?Sized,
    {
        let sp = SuspendedRegisters::saved_stack_pointer(debugger, self.layout, context)?;
        let base = debugger
            .evaluate(&self.layout.context_field(context, &self.layout.stack_base_field))?
            .as_address();
        Ok(sp.distance_from(base))
    }
}
