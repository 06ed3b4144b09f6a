use crate::error::Result;
use crate::symbols::SymbolTable;
use crate::types::{Address, FrameStatus, StackFrame};

/// Upper bound on frames produced by one unwind.
pub const MAX_FRAMES: usize = 256;

/// Minimal memory accessor required for stack unwinding.
pub trait MemoryAccess
{
    fn read_u64(&self, address: Address) -> Result<u64>;
}

/// Registers an unwind starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwindRegisters
{
    pub pc: Address,
    pub sp: Address,
    pub fp: Address,
}

/// Frame-pointer chain unwinder for x86-64.
///
/// Each frame stores the caller's `rbp` at `[rbp]` and the return address at
/// `[rbp + 8]`. The walk ends at a zero pc, a zero or non-increasing frame
/// pointer, an unreadable frame, or after [`MAX_FRAMES`] frames.
pub struct StackUnwinder<'a, M>
{
    symbols: &'a SymbolTable,
    memory: &'a M,
}

impl<'a, M: MemoryAccess> StackUnwinder<'a, M>
{
    pub fn new(symbols: &'a SymbolTable, memory: &'a M) -> Self
    {
        Self { symbols, memory }
    }

    pub fn unwind(&self, regs: UnwindRegisters, max_frames: usize) -> Vec<StackFrame>
    {
        let mut frames = Vec::new();
        let mut cursor = regs;
        let mut status = FrameStatus::Registers;

        while frames.len() < max_frames.min(MAX_FRAMES) && cursor.pc != Address::ZERO {
            frames.push(StackFrame {
                index: frames.len(),
                pc: cursor.pc,
                sp: cursor.sp,
                fp: cursor.fp,
                symbol: self.symbols.lookup(cursor.pc).cloned(),
                status,
            });

            let Some(next) = self.frame_pointer_step(cursor) else {
                break;
            };
            cursor = next;
            status = FrameStatus::FramePointer;
        }

        frames
    }

    fn frame_pointer_step(&self, regs: UnwindRegisters) -> Option<UnwindRegisters>
    {
        let fp = regs.fp;
        if fp == Address::ZERO {
            return None;
        }

        let saved_fp = self.memory.read_u64(fp).ok()?;
        let return_addr = self.memory.read_u64(fp.checked_add(8)?).ok()?;

        // The chain must move towards the stack base, otherwise it is corrupt
        // or loops.
        if saved_fp != 0 && saved_fp <= fp.value() {
            tracing::trace!(fp = %fp, saved_fp, "frame pointer chain does not grow, stopping");
            return None;
        }

        Some(UnwindRegisters {
            pc: Address::from(return_addr),
            sp: fp.checked_add(16)?,
            fp: Address::from(saved_fp),
        })
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;
    use crate::error::StrandError;
    use crate::symbols::SymbolRange;

    struct Words(HashMap<u64, u64>);

    impl MemoryAccess for Words
    {
        fn read_u64(&self, address: Address) -> Result<u64>
        {
            self.0
                .get(&address.value())
                .copied()
                .ok_or_else(|| StrandError::evaluation(format!("*0x{address:x}"), "unmapped"))
        }
    }

    fn table() -> SymbolTable
    {
        SymbolTable::new(&[
            SymbolRange {
                start: Address::from(0x1000),
                end: Address::from(0x1100),
                name: "inner".into(),
            },
            SymbolRange {
                start: Address::from(0x2000),
                end: Address::from(0x2100),
                name: "outer".into(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_walks_frame_pointer_chain()
    {
        let memory = Words(HashMap::from([(0x7000, 0x7100), (0x7008, 0x2010), (0x7100, 0), (0x7108, 0)]));
        let symbols = table();
        let frames = StackUnwinder::new(&symbols, &memory).unwind(
            UnwindRegisters {
                pc: Address::from(0x1010),
                sp: Address::from(0x6ff0),
                fp: Address::from(0x7000),
            },
            MAX_FRAMES,
        );

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].status, FrameStatus::Registers);
        assert_eq!(frames[0].symbol.as_ref().map(|s| s.raw()), Some("inner"));
        assert_eq!(frames[1].pc, Address::from(0x2010));
        assert_eq!(frames[1].sp, Address::from(0x7010));
        assert_eq!(frames[1].status, FrameStatus::FramePointer);
        assert_eq!(frames[1].symbol.as_ref().map(|s| s.raw()), Some("outer"));
    }

    #[test]
    fn test_stops_on_unreadable_frame()
    {
        let memory = Words(HashMap::new());
        let symbols = table();
        let frames = StackUnwinder::new(&symbols, &memory).unwind(
            UnwindRegisters {
                pc: Address::from(0x1010),
                sp: Address::from(0x6ff0),
                fp: Address::from(0x7000),
            },
            MAX_FRAMES,
        );
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_stops_on_looping_chain()
    {
        let memory = Words(HashMap::from([(0x7000, 0x7000), (0x7008, 0x2010)]));
        let symbols = table();
        let frames = StackUnwinder::new(&symbols, &memory).unwind(
            UnwindRegisters {
                pc: Address::from(0x1010),
                sp: Address::from(0x6ff0),
                fp: Address::from(0x7000),
            },
            MAX_FRAMES,
        );
        assert_eq!(frames.len(), 1);
    }
}
