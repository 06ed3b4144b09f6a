//! Scripted debugger shared by the integration tests
//!
//! Every expression the engine evaluates is looked up by its rendered text,
//! so a test scripts exactly what the target contains and nothing else.
//! Register writes, evaluations and backtrace invocations are recorded.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use strand_core::error::{Result, StrandError};
use strand_core::types::{
    Address, Backtrace, CalleeSaved, Expr, FrameStatus, KernelThreadId, RegisterId, StackFrame, Value,
};
use strand_core::TargetDebugger;

pub const CONTEXT_TYPE: &str = "Arachne::ThreadContext *";
pub const OCCUPANCY_TYPE: &str = "std::atomic<Arachne::MaskAndCount> *";

/// Live registers at the start of every test.
pub const NATIVE_SP: u64 = 0x7fff_0000;
pub const NATIVE_PC: u64 = 0x40_1010;
pub const NATIVE_CALLEE_SAVED: [u64; 6] = [0x7fff_0040, 0x11, 0x12, 0x13, 0x14, 0x15];

pub struct ScriptedDebugger
{
    pub registers: HashMap<RegisterId, u64>,
    pub values: HashMap<String, Value>,
    pub thread: KernelThreadId,
    pub fail_backtrace: bool,
    pub fail_write: Option<RegisterId>,
    pub writes: Vec<(RegisterId, u64)>,
    pub evaluations: RefCell<Vec<String>>,
    pub backtraces: Cell<usize>,
    /// Live registers as seen by each native backtrace.
    pub seen: RefCell<Vec<HashMap<RegisterId, u64>>>,
}

impl ScriptedDebugger
{
    pub fn new() -> Self
    {
        let mut registers = HashMap::from([
            (RegisterId::Sp, NATIVE_SP),
            (RegisterId::Pc, NATIVE_PC),
        ]);
        for (register, value) in CalleeSaved::ALL.into_iter().zip(NATIVE_CALLEE_SAVED) {
            registers.insert(RegisterId::CalleeSaved(register), value);
        }
        Self {
            registers,
            values: HashMap::new(),
            thread: KernelThreadId(1),
            fail_backtrace: false,
            fail_write: None,
            writes: Vec::new(),
            evaluations: RefCell::new(Vec::new()),
            backtraces: Cell::new(0),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn set(&mut self, expr: &Expr, value: Value)
    {
        self.values.insert(expr.to_string(), value);
    }

    /// `loadedContext = context`
    pub fn loaded(mut self, context: u64) -> Self
    {
        self.set(
            &Expr::Symbol("Arachne::core.loadedContext".into()),
            Value::new(CONTEXT_TYPE, context),
        );
        self
    }

    /// Occupancy pointer and its bitmask.
    pub fn occupancy(mut self, pointer: u64, mask: u64) -> Self
    {
        self.set(
            &Expr::Symbol("Arachne::core.localOccupiedAndCount".into()),
            Value::new(OCCUPANCY_TYPE, pointer),
        );
        self.set(
            &Expr::Member {
                base: Address::from(pointer),
                pointer_type: OCCUPANCY_TYPE.into(),
                path: "_M_i.occupied".into(),
            },
            Value::new("uint64_t", mask),
        );
        self
    }

    /// `localThreadContexts[index] = context`
    pub fn slot(mut self, index: usize, context: u64) -> Self
    {
        self.set(
            &Expr::Element {
                array: "Arachne::core.localThreadContexts".into(),
                index,
            },
            Value::new(CONTEXT_TYPE, context),
        );
        self
    }

    /// A suspended context: saved sp, the six pushed words and the return address.
    pub fn suspended(mut self, context: u64, sp: u64, pushed: [u64; 6], return_address: u64) -> Self
    {
        self.set(&context_field(context, "sp"), Value::new("void *", sp));
        for (word, value) in (0u64..).zip(pushed) {
            self.set(&Expr::Word(Address::from(sp + 8 * word)), Value::new("uint64_t", value));
        }
        self.set(&Expr::Word(Address::from(sp + 48)), Value::new("uint64_t", return_address));
        self
    }

    pub fn stack_base(mut self, context: u64, base: u64) -> Self
    {
        self.set(&context_field(context, "stack"), Value::new("void *", base));
        self
    }

    pub fn text(mut self, text: &str, value: Value) -> Self
    {
        self.set(&Expr::Text(text.into()), value);
        self
    }

    pub fn register(&self, register: RegisterId) -> u64
    {
        self.registers[&register]
    }

    pub fn snapshot(&self) -> HashMap<RegisterId, u64>
    {
        self.registers.clone()
    }

    pub fn evaluation_count(&self) -> usize
    {
        self.evaluations.borrow().len()
    }
}

pub fn context_field(context: u64, field: &str) -> Expr
{
    Expr::Member {
        base: Address::from(context),
        pointer_type: CONTEXT_TYPE.into(),
        path: field.into(),
    }
}

impl TargetDebugger for ScriptedDebugger
{
    fn read_register(&self, register: RegisterId) -> Result<u64>
    {
        self.registers.get(&register).copied().ok_or(StrandError::RegisterAccess {
            register,
            details: "not scripted".into(),
        })
    }

    fn write_register(&mut self, register: RegisterId, value: u64) -> Result<()>
    {
        if self.fail_write == Some(register) {
            return Err(StrandError::RegisterAccess {
                register,
                details: "write refused".into(),
            });
        }
        self.writes.push((register, value));
        self.registers.insert(register, value);
        Ok(())
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value>
    {
        let text = expr.to_string();
        self.evaluations.borrow_mut().push(text.clone());
        self.values.get(&text).cloned().ok_or(StrandError::Evaluation {
            expression: text,
            details: "Cannot access memory".into(),
        })
    }

    fn native_backtrace(&self) -> Result<Backtrace>
    {
        self.backtraces.set(self.backtraces.get() + 1);
        self.seen.borrow_mut().push(self.registers.clone());
        if self.fail_backtrace {
            return Err(StrandError::Backtrace("unwinder gave up".into()));
        }
        Ok(Backtrace {
            thread: self.thread,
            frames: vec![StackFrame {
                index: 0,
                pc: Address::from(self.registers[&RegisterId::Pc]),
                sp: Address::from(self.registers[&RegisterId::Sp]),
                fp: Address::from(self.registers[&RegisterId::CalleeSaved(CalleeSaved::Rbp)]),
                symbol: None,
                status: FrameStatus::Registers,
            }],
        })
    }

    fn selected_kernel_thread(&self) -> Result<KernelThreadId>
    {
        Ok(self.thread)
    }
}
