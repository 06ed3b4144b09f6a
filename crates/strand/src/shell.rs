//! Interactive command loop over a single session.
//!
//! Switch state lives in the [`Session`], so a `ta` issued on one line stays
//! in effect for every following command until `ta` with no argument undoes it.

use std::io::{self, BufRead, Write};

use strand_core::platform::ImageDebugger;
use strand_core::snapshot;
use strand_core::types::KernelThreadId;
use strand_core::{Session, StrandError};
use strand_utils::{debug, warn};

use crate::render;

const PROMPT: &str = "(strand) ";

const HELP: &str = "\
Commands:
  bta, backtrace-thread [EXPR]   Backtrace one thread context, or every occupied slot
  ta, switch-thread [EXPR]       Show the registers of a thread context; no EXPR restores
  diff-stack                     Stack bytes in use by each slot of the core
  registers                      Print the registers of the selected thread
  thread <id>                    Select a kernel thread
  help                           Show this message
  quit, exit                     Leave the shell";

/// Whether the loop keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow
{
    Continue,
    Quit,
}

pub struct Shell
{
    session: Session<ImageDebugger>,
}

impl Shell
{
    pub fn new(session: Session<ImageDebugger>) -> Self
    {
        Self { session }
    }

    /// Read commands from `input` until it ends or the user quits.
    ///
    /// Command failures are printed and the loop continues.
    ///
    /// ## Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> io::Result<()>
    {
        write!(out, "{PROMPT}")?;
        out.flush()?;
        for line in input.lines() {
            let line = line?;
            if self.execute(&line, out)? == Flow::Quit {
                return Ok(());
            }
            write!(out, "{PROMPT}")?;
            out.flush()?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Run one command line.
    ///
    /// ## Errors
    ///
    /// Returns an error only if writing output fails.
    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow>
    {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, Some(rest.trim())),
            None => (line, None),
        };
        debug!(command, ?argument, "shell command");

        let result = match command {
            "bta" | "backtrace-thread" => self.backtrace(argument, out),
            "ta" | "switch-thread" => self.switch(argument, out),
            "diff-stack" => self.diff_stack(out),
            "registers" => self.registers(out),
            "thread" => self.thread(argument, out),
            "help" => writeln!(out, "{HELP}").map_err(StrandError::from),
            "quit" | "exit" => return Ok(Flow::Quit),
            other => writeln!(out, "Undefined command: \"{other}\".  Try \"help\".").map_err(StrandError::from),
        };

        match result {
            Ok(()) => Ok(Flow::Continue),
            Err(StrandError::Io(err)) => Err(err),
            Err(err) => {
                if !err.is_usage() {
                    warn!(command, error = %err, "command failed");
                }
                writeln!(out, "{err}")?;
                Ok(Flow::Continue)
            }
        }
    }

    fn backtrace(&mut self, argument: Option<&str>, out: &mut impl Write) -> Result<(), StrandError>
    {
        let report = self.session.backtrace_thread(argument)?;
        render::backtrace_report(out, &report)?;
        Ok(())
    }

    fn switch(&mut self, argument: Option<&str>, out: &mut impl Write) -> Result<(), StrandError>
    {
        let outcome = self.session.switch_thread(argument)?;
        render::switch_outcome(out, &outcome)?;
        Ok(())
    }

    fn diff_stack(&self, out: &mut impl Write) -> Result<(), StrandError>
    {
        let report = self.session.diff_stack()?;
        render::stack_usage(out, &report)?;
        Ok(())
    }

    fn registers(&self, out: &mut impl Write) -> Result<(), StrandError>
    {
        let registers = snapshot::capture(self.session.debugger())?;
        writeln!(out, "{registers}")?;
        Ok(())
    }

    fn thread(&mut self, argument: Option<&str>, out: &mut impl Write) -> Result<(), StrandError>
    {
        let Some(argument) = argument else {
            let threads: Vec<String> = self.session.debugger().threads().map(|id| id.to_string()).collect();
            writeln!(out, "Threads: {}", threads.join(", "))?;
            return Ok(());
        };
        let id: u64 = argument
            .parse()
            .map_err(|_| StrandError::InvalidArgument(format!("Invalid thread id \"{argument}\".")))?;
        self.session.debugger_mut().select_thread(KernelThreadId(id))?;
        writeln!(out, "[Switching to thread {id}]")?;
        Ok(())
    }
}
