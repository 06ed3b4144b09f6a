//! On-disk format of a halted process image.
//!
//! ```json
//! {
//!   "selected_thread": 1,
//!   "threads": [{ "id": 1, "registers": { "sp": 28672, "pc": 4112, "rbp": 28688 } }],
//!   "variables": { "Arachne::core.loadedContext": { "type": "Arachne::ThreadContext *", "value": 8192 } },
//!   "arrays": { "Arachne::core.localThreadContexts": [{ "type": "Arachne::ThreadContext *", "value": 8192 }] },
//!   "objects": [{ "address": 8192, "type": "Arachne::ThreadContext", "fields": { "sp": { "type": "void *", "value": 12288 } } }],
//!   "memory": [{ "address": 12288, "value": 0 }],
//!   "symbols": [{ "start": 4096, "end": 4352, "name": "Arachne::schedulerMainLoop" }]
//! }
//! ```
//!
//! Registers left out of a thread read as zero. Everything but the threads
//! is optional.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::layout::RuntimeLayout;
use crate::symbols::SymbolRange;
use crate::types::{Address, CalleeSaved, KernelThreadId, RegisterId, Value};

/// Complete image of a halted process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessImage
{
    /// Thread whose registers are live when the image is opened.
    pub selected_thread: KernelThreadId,
    /// Kernel threads and their register files.
    pub threads: Vec<ImageThread>,
    /// Scalar globals by expression text.
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    /// Global arrays by expression text.
    #[serde(default)]
    pub arrays: BTreeMap<String, Vec<Value>>,
    /// Typed objects reachable through pointers.
    #[serde(default)]
    pub objects: Vec<ImageObject>,
    /// Raw 8-byte memory words.
    #[serde(default)]
    pub memory: Vec<MemoryWord>,
    /// Function address ranges.
    #[serde(default)]
    pub symbols: Vec<SymbolRange>,
    /// Runtime layout the image was taken with, if not the default.
    #[serde(default)]
    pub layout: Option<RuntimeLayout>,
}

/// One kernel thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageThread
{
    pub id: KernelThreadId,
    pub registers: ImageRegisters,
}

/// Register file of one kernel thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRegisters
{
    pub sp: u64,
    pub pc: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

impl ImageRegisters
{
    /// Value of one register.
    #[must_use]
    pub const fn get(&self, register: RegisterId) -> u64
    {
        match register {
            RegisterId::Sp => self.sp,
            RegisterId::Pc => self.pc,
            RegisterId::CalleeSaved(CalleeSaved::Rbp) => self.rbp,
            RegisterId::CalleeSaved(CalleeSaved::Rbx) => self.rbx,
            RegisterId::CalleeSaved(CalleeSaved::R12) => self.r12,
            RegisterId::CalleeSaved(CalleeSaved::R13) => self.r13,
            RegisterId::CalleeSaved(CalleeSaved::R14) => self.r14,
            RegisterId::CalleeSaved(CalleeSaved::R15) => self.r15,
        }
    }

    /// Overwrite one register.
    pub fn set(&mut self, register: RegisterId, value: u64)
    {
        let slot = match register {
            RegisterId::Sp => &mut self.sp,
            RegisterId::Pc => &mut self.pc,
            RegisterId::CalleeSaved(CalleeSaved::Rbp) => &mut self.rbp,
            RegisterId::CalleeSaved(CalleeSaved::Rbx) => &mut self.rbx,
            RegisterId::CalleeSaved(CalleeSaved::R12) => &mut self.r12,
            RegisterId::CalleeSaved(CalleeSaved::R13) => &mut self.r13,
            RegisterId::CalleeSaved(CalleeSaved::R14) => &mut self.r14,
            RegisterId::CalleeSaved(CalleeSaved::R15) => &mut self.r15,
        };
        *slot = value;
    }
}

/// A typed object at a fixed address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageObject
{
    pub address: Address,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Field values by path, nested paths written with dots (`_M_i.occupied`).
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

/// One 8-byte word of memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryWord
{
    pub address: Address,
    pub value: u64,
}
