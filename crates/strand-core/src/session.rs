//! # Inspection Session
//!
//! The boundary between operator commands and the engine.
//!
//! A [`Session`] owns the debugger backend, the runtime layout and the
//! switch state for as long as the operator is attached. Argument text is
//! evaluated exactly once here; everything below works on typed values.
//!
//! ## Example
//!
//! ```rust,no_run
//! use strand_core::layout::RuntimeLayout;
//! use strand_core::platform::ImageDebugger;
//! use strand_core::Session;
//!
//! # fn main() -> strand_core::Result<()> {
//! let debugger = ImageDebugger::from_file("core.json")?;
//! let mut session = Session::new(debugger, RuntimeLayout::arachne())?;
//!
//! let report = session.backtrace_thread(None)?;
//! println!("{} threads", report.threads.len());
//!
//! session.switch_thread(Some("Arachne::core.localThreadContexts[2]"))?;
//! session.switch_thread(None)?;
//! # Ok(())
//! # }
//! ```

use crate::backtrace::{BacktraceOperation, BacktraceReport, BacktraceTarget};
use crate::debugger::TargetDebugger;
use crate::error::Result;
use crate::layout::RuntimeLayout;
use crate::stack_usage::{StackUsage, StackUsageReport};
use crate::switch::{ContextSwitchOperation, SwitchOutcome};
use crate::types::{Expr, ThreadContext, Value};

/// One operator's attachment to a halted process
pub struct Session<D>
where
    D: TargetDebugger,
{
    debugger: D,
    layout: RuntimeLayout,
    switcher: ContextSwitchOperation,
}

impl<D> Session<D>
where
    D: TargetDebugger,
{
    /// Start a session
    ///
    /// ## Errors
    ///
    /// - `InvalidLayout`: the layout is inconsistent
    pub fn new(debugger: D, layout: RuntimeLayout) -> Result<Self>
    {
        layout.validate()?;
        tracing::debug!(runtime = %layout.runtime_name, "session started");
        Ok(Self {
            debugger,
            layout,
            switcher: ContextSwitchOperation::new(),
        })
    }

    /// The debugger backend.
    pub fn debugger(&self) -> &D
    {
        &self.debugger
    }

    /// Mutable access to the debugger backend, e.g. to select another thread.
    pub fn debugger_mut(&mut self) -> &mut D
    {
        &mut self.debugger
    }

    /// The runtime layout in use.
    pub fn layout(&self) -> &RuntimeLayout
    {
        &self.layout
    }

    /// Switch state of this session.
    pub fn switcher(&self) -> &ContextSwitchOperation
    {
        &self.switcher
    }

    /// End the session and hand the backend back.
    pub fn into_debugger(self) -> D
    {
        self.debugger
    }

    /// Evaluate operator text and validate it as a thread context
    ///
    /// Empty or blank text means "no argument" and yields `None`.
    ///
    /// ## Errors
    ///
    /// - `Evaluation`: the text does not evaluate
    /// - `Usage`: the value is null or of the wrong type
    pub fn resolve_context(&self, text: &str) -> Result<Option<ThreadContext>>
    {
        match self.evaluate_argument(Some(text))? {
            Some(value) => Ok(Some(ThreadContext::resolve(&value, &self.layout.context_type)?)),
            None => Ok(None),
        }
    }

    /// `backtrace-thread [context]`
    ///
    /// Without an argument every occupied slot of the current core is
    /// backtraced, best effort per thread.
    ///
    /// ## Errors
    ///
    /// See [`BacktraceOperation::execute`].
    pub fn backtrace_thread(&mut self, argument: Option<&str>) -> Result<BacktraceReport>
    {
        let target = match self.evaluate_argument(argument)? {
            Some(value) => BacktraceTarget::Context(value),
            None => BacktraceTarget::AllOccupied,
        };
        BacktraceOperation::new(&self.layout).execute(&mut self.debugger, target)
    }

    /// `switch-thread [context]`
    ///
    /// Without an argument the selected kernel thread goes back to its
    /// native registers, if it was diverted.
    ///
    /// ## Errors
    ///
    /// See [`ContextSwitchOperation::switch_to`].
    pub fn switch_thread(&mut self, argument: Option<&str>) -> Result<SwitchOutcome>
    {
        let target = match argument {
            Some(text) => self.resolve_context(text)?,
            None => None,
        };
        let kernel_thread = self.debugger.selected_kernel_thread()?;
        match target {
            Some(context) => self
                .switcher
                .switch_to(&mut self.debugger, &self.layout, context, kernel_thread),
            None => self.switcher.switch_to_none(&mut self.debugger, kernel_thread),
        }
    }

    /// `diff-stack`
    ///
    /// ## Errors
    ///
    /// See [`StackUsage::measure`].
    pub fn diff_stack(&self) -> Result<StackUsageReport>
    {
        StackUsage::new(&self.layout).measure(&self.debugger)
    }

    fn evaluate_argument(&self, argument: Option<&str>) -> Result<Option<Value>>
    {
        match argument.map(str::trim) {
            Some(text) if !text.is_empty() => {
                let value = self.debugger.evaluate(&Expr::Text(text.to_string()))?;
                tracing::debug!(argument = text, value = %value, "evaluated argument");
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }
}
