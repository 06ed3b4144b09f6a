//! Text output for command results.

use std::io::{self, Write};

use strand_core::backtrace::BacktraceReport;
use strand_core::stack_usage::StackUsageReport;
use strand_core::switch::SwitchOutcome;

pub fn backtrace_report(out: &mut impl Write, report: &BacktraceReport) -> io::Result<()>
{
    let many = report.threads.len() > 1 || report.threads.iter().any(|thread| thread.slot.is_some());
    for (i, thread) in report.threads.iter().enumerate() {
        if many {
            if i > 0 {
                writeln!(out)?;
            }
            let slot = thread.slot.map_or_else(String::new, |slot| format!("slot {slot}, "));
            let state = match (&thread.outcome, thread.emulated) {
                (_, true) => ", suspended",
                (Ok(_), false) => ", loaded",
                (Err(_), false) => "",
            };
            writeln!(out, "Thread ({slot}context 0x{:x}{state}):", thread.context)?;
        }
        match &thread.outcome {
            Ok(backtrace) => writeln!(out, "{backtrace}")?,
            Err(err) => writeln!(out, "{err}")?,
        }
    }
    if report.threads.is_empty() {
        writeln!(out, "No occupied thread slots on this core.")?;
    }
    Ok(())
}

pub fn switch_outcome(out: &mut impl Write, outcome: &SwitchOutcome) -> io::Result<()>
{
    match outcome {
        SwitchOutcome::Emulating {
            context,
            first_divergence: true,
        } => writeln!(out, "Switched to thread context {context}; native registers saved."),
        SwitchOutcome::Emulating {
            context,
            first_divergence: false,
        } => writeln!(out, "Switched to thread context {context}."),
        SwitchOutcome::RestoredNative(native) => writeln!(out, "Restored native registers ({native})."),
        SwitchOutcome::AlreadyNative => writeln!(out, "Already on native registers."),
    }
}

pub fn stack_usage(out: &mut impl Write, report: &StackUsageReport) -> io::Result<()>
{
    for entry in &report.slots {
        let state = if entry.occupied { "occupied" } else { "idle    " };
        let marker = if entry.loaded { " (loaded, stale)" } else { "" };
        match &entry.outcome {
            Ok(bytes) => writeln!(out, "{:>2}  {state}  0x{:x}  {bytes}{marker}", entry.slot, entry.context)?,
            Err(err) => writeln!(out, "{:>2}  {state}  0x{:x}  {err}", entry.slot, entry.context)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use strand_core::switch::SavedNativeState;
    use strand_core::types::{Address, ThreadContext, Value};

    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_switch_messages()
    {
        let context = ThreadContext::resolve(&Value::new("T *", 0x20), "T *").unwrap();
        let text = render(|out| {
            switch_outcome(
                out,
                &SwitchOutcome::Emulating {
                    context,
                    first_divergence: true,
                },
            )
        });
        assert_eq!(text, "Switched to thread context 0x20; native registers saved.\n");

        let native = SavedNativeState {
            stack_pointer: Address::from(0x10),
            program_counter: Address::from(0x20),
        };
        let text = render(|out| switch_outcome(out, &SwitchOutcome::RestoredNative(native)));
        assert!(text.starts_with("Restored native registers (sp=0x0000000000000010"));
    }

    #[test]
    fn test_stack_usage_marks_idle_slots()
    {
        use strand_core::stack_usage::SlotStackUsage;

        let report = StackUsageReport {
            slots: vec![
                SlotStackUsage {
                    slot: 0,
                    context: Address::from(0x10),
                    occupied: true,
                    loaded: true,
                    outcome: Ok(64),
                },
                SlotStackUsage {
                    slot: 1,
                    context: Address::from(0x20),
                    occupied: false,
                    loaded: false,
                    outcome: Ok(128),
                },
            ],
        };
        let text = render(|out| stack_usage(out, &report));
        assert_eq!(text, " 0  occupied  0x10  64 (loaded, stale)\n 1  idle      0x20  128\n");
    }

    #[test]
    fn test_empty_backtrace_report()
    {
        let text = render(|out| backtrace_report(out, &BacktraceReport::default()));
        assert_eq!(text, "No occupied thread slots on this core.\n");
    }
}
