//! # Halted Process Image Backend
//!
//! A [`TargetDebugger`] over a JSON snapshot of a halted process.
//!
//! The image holds what a debugger would read from a live process: register
//! files per kernel thread, runtime globals, the objects they point to, the
//! raw stack words and the function ranges. Register writes go to an
//! in-memory register file; the image's memory is read-only.
//!
//! ## Example
//!
//! ```rust
//! use strand_core::platform::ImageDebugger;
//! use strand_core::types::{Expr, RegisterId};
//! use strand_core::TargetDebugger;
//!
//! let image = ImageDebugger::from_json(
//!     r#"{
//!         "selected_thread": 1,
//!         "threads": [{ "id": 1, "registers": { "sp": 4096 } }],
//!         "variables": { "answer": { "type": "int", "value": 42 } }
//!     }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(image.read_register(RegisterId::Sp).unwrap(), 4096);
//! assert_eq!(image.evaluate(&Expr::Symbol("answer".into())).unwrap().raw(), 42);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::debugger::TargetDebugger;
use crate::error::{Result, StrandError};
use crate::layout::RuntimeLayout;
use crate::symbols::SymbolTable;
use crate::types::{Address, Backtrace, Expr, KernelThreadId, RegisterId, Value};
use crate::unwind::{MemoryAccess, StackUnwinder, UnwindRegisters, MAX_FRAMES};

mod expr;
pub mod model;

pub use model::{ImageObject, ImageRegisters, ImageThread, MemoryWord, ProcessImage};

/// Debugger backend over a [`ProcessImage`]
#[derive(Debug, Clone)]
pub struct ImageDebugger
{
    selected: KernelThreadId,
    threads: BTreeMap<KernelThreadId, ImageRegisters>,
    variables: BTreeMap<String, Value>,
    arrays: BTreeMap<String, Vec<Value>>,
    objects: HashMap<Address, Vec<model::ImageObject>>,
    memory: HashMap<Address, u64>,
    symbols: SymbolTable,
    layout: Option<RuntimeLayout>,
}

impl ImageDebugger
{
    /// Load an image from a JSON file
    ///
    /// ## Errors
    ///
    /// - `Io`: the file cannot be read
    /// - `Json`: the file is not a process image
    /// - `Image`: the image is inconsistent
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self>
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let debugger = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), threads = debugger.threads.len(), "loaded process image");
        Ok(debugger)
    }

    /// Parse an image from JSON text
    ///
    /// ## Errors
    ///
    /// - `Json`: the text is not a process image
    /// - `Image`: the image is inconsistent
    pub fn from_json(text: &str) -> Result<Self>
    {
        Self::new(serde_json::from_str(text)?)
    }

    /// Index a parsed image
    ///
    /// ## Errors
    ///
    /// - `Image`: duplicate thread ids, unknown selected thread, duplicate
    ///   memory words or overlapping symbols
    pub fn new(image: ProcessImage) -> Result<Self>
    {
        let mut threads = BTreeMap::new();
        for thread in image.threads {
            if threads.insert(thread.id, thread.registers).is_some() {
                return Err(StrandError::Image(format!("thread {} appears twice", thread.id)));
            }
        }
        if !threads.contains_key(&image.selected_thread) {
            return Err(StrandError::Image(format!(
                "selected thread {} is not in the image",
                image.selected_thread
            )));
        }

        let mut objects: HashMap<Address, Vec<model::ImageObject>> = HashMap::new();
        for object in image.objects {
            objects.entry(object.address).or_default().push(object);
        }

        let mut memory = HashMap::with_capacity(image.memory.len());
        for word in image.memory {
            if memory.insert(word.address, word.value).is_some() {
                return Err(StrandError::Image(format!("memory word {} appears twice", word.address)));
            }
        }

        if let Some(layout) = &image.layout {
            layout.validate()?;
        }

        Ok(Self {
            selected: image.selected_thread,
            threads,
            variables: image.variables,
            arrays: image.arrays,
            objects,
            memory,
            symbols: SymbolTable::new(&image.symbols)?,
            layout: image.layout,
        })
    }

    /// Layout stored in the image, if any.
    #[must_use]
    pub fn layout(&self) -> Option<&RuntimeLayout>
    {
        self.layout.as_ref()
    }

    /// Kernel threads in the image, ascending.
    pub fn threads(&self) -> impl Iterator<Item = KernelThreadId> + '_
    {
        self.threads.keys().copied()
    }

    /// Make another kernel thread's registers the live view
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: no such thread
    pub fn select_thread(&mut self, thread: KernelThreadId) -> Result<()>
    {
        if !self.threads.contains_key(&thread) {
            return Err(StrandError::InvalidArgument(format!("Unknown thread {thread}.")));
        }
        tracing::debug!(thread = %thread, "selected thread");
        self.selected = thread;
        Ok(())
    }

    fn live(&self) -> Result<&ImageRegisters>
    {
        self.threads
            .get(&self.selected)
            .ok_or_else(|| StrandError::InvalidArgument(format!("Unknown thread {}.", self.selected)))
    }

    fn read_word(&self, address: Address) -> Option<u64>
    {
        self.memory.get(&address).copied()
    }

    fn evaluate_member(&self, expression: &Expr, base: Address, pointer_type: &str, path: &str) -> Result<Value>
    {
        let Some(pointee) = crate::types::value::pointee_type(pointer_type) else {
            return Err(StrandError::evaluation(
                expression,
                format!("The -> operator needs a pointer, `{pointer_type}` is not one."),
            ));
        };
        let object = self
            .objects
            .get(&base)
            .and_then(|objects| {
                objects
                    .iter()
                    .find(|object| crate::types::value::same_type(&object.type_name, pointee))
            })
            .ok_or_else(|| StrandError::evaluation(expression, format!("Cannot access memory at address {base:#x}")))?;

        object
            .fields
            .get(path)
            .cloned()
            .ok_or_else(|| StrandError::evaluation(expression, format!("There is no member named {path}.")))
    }
}

impl MemoryAccess for ImageDebugger
{
    fn read_u64(&self, address: Address) -> Result<u64>
    {
        self.read_word(address).ok_or_else(|| {
            StrandError::evaluation(Expr::Word(address), format!("Cannot access memory at address {address:#x}"))
        })
    }
}

impl TargetDebugger for ImageDebugger
{
    fn read_register(&self, register: RegisterId) -> Result<u64>
    {
        Ok(self.live()?.get(register))
    }

    fn write_register(&mut self, register: RegisterId, value: u64) -> Result<()>
    {
        let selected = self.selected;
        let registers = self.threads.get_mut(&selected).ok_or_else(|| StrandError::RegisterAccess {
            register,
            details: format!("thread {selected} has no register file"),
        })?;
        tracing::trace!(register = %register, value = format_args!("{value:#x}"), "write register");
        registers.set(register, value);
        Ok(())
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value>
    {
        match expr {
            Expr::Text(text) => self.evaluate_text(text),
            Expr::Symbol(name) => self.variable(name, expr),
            Expr::Element { array, index } => self.element(array, *index, expr),
            Expr::Member {
                base,
                pointer_type,
                path,
            } => self.evaluate_member(expr, *base, pointer_type, path),
            Expr::Word(address) => self
                .read_u64(*address)
                .map(|word| Value::new("uint64_t", word)),
        }
    }

    fn native_backtrace(&self) -> Result<Backtrace>
    {
        let live = self.live()?;
        let regs = UnwindRegisters {
            pc: Address::from(live.pc),
            sp: Address::from(live.sp),
            fp: Address::from(live.rbp),
        };
        if regs.pc == Address::ZERO {
            return Err(StrandError::Backtrace(format!("thread {} has a null program counter", self.selected)));
        }

        let frames = StackUnwinder::new(&self.symbols, self).unwind(regs, MAX_FRAMES);
        tracing::debug!(thread = %self.selected, frames = frames.len(), "unwound frame-pointer chain");
        Ok(Backtrace {
            thread: self.selected,
            frames,
        })
    }

    fn selected_kernel_thread(&self) -> Result<KernelThreadId>
    {
        Ok(self.selected)
    }
}
