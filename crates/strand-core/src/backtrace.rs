//! # Cooperative Thread Backtraces
//!
//! Backtrace a suspended cooperative thread by temporarily loading its saved
//! registers into the live register view and asking the host debugger to
//! unwind from there.
//!
//! ## How it works
//!
//! 1. Validate the argument (type first, then null). Nothing is read or
//!    written before this succeeds.
//! 2. If the thread is the one currently loaded on the core, its registers
//!    already are the live registers: take the native backtrace, write nothing.
//! 3. Otherwise read the whole saved region, borrow the live view, load the
//!    saved registers, take the native backtrace and restore the view.
//!
//! The live registers are identical before and after every single-thread
//! backtrace, whether the unwind succeeded or not.

use crate::debugger::TargetDebugger;
use crate::error::{Result, StrandError};
use crate::guards::BorrowedRegisterView;
use crate::identity::CoreState;
use crate::layout::{RuntimeLayout, SuspendedRegisters};
use crate::occupancy::OccupancyScanner;
use crate::types::{Address, Backtrace, ThreadContext, Value};

/// What to backtrace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BacktraceTarget
{
    /// One thread, given as an evaluated context pointer
    Context(Value),
    /// Every occupied slot of the current core
    AllOccupied,
}

/// Backtrace of one cooperative thread
#[derive(Debug)]
pub struct ThreadBacktrace
{
    /// Slot index, when the thread was found by enumeration.
    pub slot: Option<usize>,
    /// Context address, zero if the slot could not be read.
    pub context: Address,
    /// `false` when the thread was already loaded and no register was written.
    pub emulated: bool,
    /// The backtrace, or why this thread could not be traced.
    pub outcome: Result<Backtrace>,
}

impl ThreadBacktrace
{
    fn failed(slot: Option<usize>, context: Address, err: StrandError) -> Self
    {
        Self {
            slot,
            context,
            emulated: false,
            outcome: Err(err),
        }
    }
}

/// Result of one backtrace command
#[derive(Debug, Default)]
pub struct BacktraceReport
{
    /// One entry per thread, in slot order.
    pub threads: Vec<ThreadBacktrace>,
}

impl BacktraceReport
{
    /// Threads whose backtrace failed.
    pub fn failures(&self) -> impl Iterator<Item = &ThreadBacktrace>
    {
        self.threads.iter().filter(|thread| thread.outcome.is_err())
    }
}

/// Backtraces cooperative threads through a borrowed register view
pub struct BacktraceOperation<'a>
{
    layout: &'a RuntimeLayout,
}

impl<'a> BacktraceOperation<'a>
{
    /// Operation for the given layout.
    pub fn new(layout: &'a RuntimeLayout) -> Self
    {
        Self { layout }
    }

    /// Run a backtrace command
    ///
    /// In single-target mode any failure is returned as the error. In
    /// all-occupied mode only failures to read the core itself are; each
    /// thread's failure is recorded in its own entry and the scan goes on.
    ///
    /// ## Errors
    ///
    /// - `Usage`: the single target is null or not a context pointer
    /// - `NotATargetCore`: the selected thread is not a runtime core
    /// - `Evaluation`, `RegisterAccess`, `Backtrace`: capability failures
    pub fn execute<D>(&self, debugger: &mut D, target: BacktraceTarget) -> Result<BacktraceReport>
    where
        D: TargetDebugger + ?Sized,
    {
        match target {
            BacktraceTarget::Context(value) => {
                let context = ThreadContext::resolve(&value, &self.layout.context_type)?;
                let core = CoreState::read(&*debugger, self.layout)?;
                let ThreadBacktrace {
                    slot,
                    context,
                    emulated,
                    outcome,
                } = self.trace(debugger, &core, None, context);
                let backtrace = outcome?;
                Ok(BacktraceReport {
                    threads: vec![ThreadBacktrace {
                        slot,
                        context,
                        emulated,
                        outcome: Ok(backtrace),
                    }],
                })
            }
            BacktraceTarget::AllOccupied => self.trace_all_occupied(debugger),
        }
    }

    fn trace_all_occupied<D>(&self, debugger: &mut D) -> Result<BacktraceReport>
    where
        D: TargetDebugger + ?Sized,
    {
        let scanner = OccupancyScanner::new(self.layout);
        let slots = scanner.list_occupied(&*debugger)?;
        let core = CoreState::read(&*debugger, self.layout)?;

        let mut report = BacktraceReport::default();
        for slot in slots {
            let value = match scanner.slot(&*debugger, slot) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(slot, error = %err, "failed to read thread slot");
                    report.threads.push(ThreadBacktrace::failed(Some(slot), Address::ZERO, err));
                    continue;
                }
            };
            let context = match ThreadContext::resolve(&value, &self.layout.context_type) {
                Ok(context) => context,
                Err(err) => {
                    tracing::warn!(slot, error = %err, "occupied slot holds no usable context");
                    report.threads.push(ThreadBacktrace::failed(Some(slot), value.as_address(), err.into()));
                    continue;
                }
            };

            let thread = self.trace(debugger, &core, Some(slot), context);
            if let Err(err) = &thread.outcome {
                tracing::warn!(slot, context = %context, error = %err, "failed to backtrace thread");
            }
            report.threads.push(thread);
        }

        tracing::info!(
            threads = report.threads.len(),
            failed = report.failures().count(),
            "backtraced occupied threads"
        );
        Ok(report)
    }

    fn trace<D>(&self, debugger: &mut D, core: &CoreState, slot: Option<usize>, context: ThreadContext) -> ThreadBacktrace
    where
        D: TargetDebugger + ?Sized,
    {
        if core.is_currently_loaded(context) {
            tracing::debug!(context = %context, "thread is loaded, using native backtrace");
            return ThreadBacktrace {
                slot,
                context: context.address(),
                emulated: false,
                outcome: debugger.native_backtrace(),
            };
        }

        ThreadBacktrace {
            slot,
            context: context.address(),
            emulated: true,
            outcome: self.emulate(debugger, context),
        }
    }

    fn emulate<D>(&self, debugger: &mut D, context: ThreadContext) -> Result<Backtrace>
    where
        D: TargetDebugger + ?Sized,
    {
        // Everything is read before the view is borrowed, so a bad context
        // fails with zero register writes.
        let suspended = SuspendedRegisters::read(&*debugger, self.layout, context)?;

        let mut view = BorrowedRegisterView::enter(debugger)?;
        let traced = view.load(&suspended).and_then(|()| view.native_backtrace());
        let restored = view.release();

        match (traced, restored) {
            (Ok(backtrace), Ok(())) => Ok(backtrace),
            (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
            (Err(err), Err(restore_err)) => {
                tracing::warn!(error = %restore_err, "register restore also failed");
                Err(err)
            }
        }
    }
}
