//! # Runtime Layout
//!
//! Where the runtime keeps things, and how its switch routine lays out a
//! suspended thread's stack.
//!
//! When the runtime switches away from a cooperative thread it pushes the
//! callee-saved registers onto that thread's stack, stores the resulting
//! stack pointer in the thread's context and swaps stacks. The return
//! address of the switch call sits directly above the pushed registers:
//!
//! ```text
//!   saved sp + 8*n  -> return address into the suspended thread
//!   saved sp + 8*(n-1)
//!   ...                pushed callee-saved registers, in push order
//!   saved sp + 0
//! ```
//!
//! None of the numbers here are hardcoded into the operations. Another
//! runtime with a different switch routine only needs a different
//! [`RuntimeLayout`].

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::debugger::TargetDebugger;
use crate::error::{Result, StrandError};
use crate::types::{Address, CalleeSaved, Expr, ThreadContext};

/// Size of one saved stack word.
pub const WORD_SIZE: u64 = 8;

/// Runtime-specific configuration
///
/// Defaults describe the Arachne runtime on x86-64. Every field can be
/// overridden from JSON; missing fields keep their default.
///
/// ```rust
/// use strand_core::layout::RuntimeLayout;
///
/// let layout: RuntimeLayout = serde_json::from_str(r#"{ "occupancy_width": 8 }"#).unwrap();
/// assert_eq!(layout.occupancy_width, 8);
/// assert_eq!(layout.saved_region_words, 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeLayout
{
    /// Runtime name used in operator messages.
    pub runtime_name: String,
    /// Pointer type an operator argument must evaluate to.
    pub context_type: String,
    /// Registers in the order the switch routine leaves them, lowest address first.
    pub register_push_order: Vec<CalleeSaved>,
    /// Words between the saved stack pointer and the return address.
    pub saved_region_words: usize,
    /// Number of meaningful bits in the occupancy bitmask.
    pub occupancy_width: u32,
    /// Global holding the context live in the current core's registers.
    pub loaded_context: String,
    /// Global holding the pointer to the current core's occupancy word.
    pub occupancy: String,
    /// Path of the bitmask below the occupancy pointer.
    pub occupancy_mask_path: String,
    /// Global array mapping slot index to context pointer.
    pub slot_table: String,
    /// Context field holding the saved stack pointer.
    pub stack_pointer_field: String,
    /// Context field holding the lowest address of the thread's stack.
    pub stack_base_field: String,
}

impl Default for RuntimeLayout
{
    fn default() -> Self
    {
        Self::arachne()
    }
}

impl RuntimeLayout
{
    /// The Arachne runtime's layout.
    #[must_use]
    pub fn arachne() -> Self
    {
        Self {
            runtime_name: "Arachne".to_string(),
            context_type: "Arachne::ThreadContext *".to_string(),
            register_push_order: vec![
                CalleeSaved::Rbp,
                CalleeSaved::Rbx,
                CalleeSaved::R15,
                CalleeSaved::R14,
                CalleeSaved::R13,
                CalleeSaved::R12,
            ],
            saved_region_words: 6,
            occupancy_width: 56,
            loaded_context: "Arachne::core.loadedContext".to_string(),
            occupancy: "Arachne::core.localOccupiedAndCount".to_string(),
            occupancy_mask_path: "_M_i.occupied".to_string(),
            slot_table: "Arachne::core.localThreadContexts".to_string(),
            stack_pointer_field: "sp".to_string(),
            stack_base_field: "stack".to_string(),
        }
    }

    /// Check the layout is internally consistent
    ///
    /// ## Errors
    ///
    /// - `InvalidLayout`: the push order does not cover the saved region
    ///   exactly once, or the occupancy width does not fit a 64-bit word
    pub fn validate(&self) -> Result<()>
    {
        if self.register_push_order.len() != self.saved_region_words {
            return Err(StrandError::InvalidLayout(format!(
                "register_push_order names {} registers but saved_region_words is {}",
                self.register_push_order.len(),
                self.saved_region_words
            )));
        }
        for (i, register) in self.register_push_order.iter().enumerate() {
            if self.register_push_order[..i].contains(register) {
                return Err(StrandError::InvalidLayout(format!(
                    "register {} appears twice in register_push_order",
                    register.name()
                )));
            }
        }
        if self.occupancy_width == 0 || self.occupancy_width > 64 {
            return Err(StrandError::InvalidLayout(format!(
                "occupancy_width must be between 1 and 64, got {}",
                self.occupancy_width
            )));
        }
        if self.context_type.trim().is_empty() {
            return Err(StrandError::InvalidLayout("context_type is empty".to_string()));
        }
        Ok(())
    }

    /// Size in bytes of the pushed register region.
    #[must_use]
    pub fn saved_region_bytes(&self) -> u64
    {
        self.saved_region_words as u64 * WORD_SIZE
    }

    /// Expression for one field of a context.
    pub(crate) fn context_field(&self, context: ThreadContext, field: &str) -> Expr
    {
        Expr::Member {
            base: context.address(),
            pointer_type: self.context_type.clone(),
            path: field.to_string(),
        }
    }
}

/// One pushed register's location on a suspended stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedSlot
{
    /// Register the slot restores.
    pub register: CalleeSaved,
    /// Address of the saved word.
    pub address: Address,
}

/// Decoded saved-register region of one suspended thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRegion
{
    /// Pushed registers, in push order.
    pub slots: SmallVec<[SavedSlot; 8]>,
    /// Address of the switch routine's return address.
    pub return_address_slot: Address,
    /// Stack pointer the thread has when control returns to it.
    pub entry_stack_pointer: Address,
}

/// Maps a saved stack pointer to its register slots
///
/// ```rust
/// use strand_core::layout::{RuntimeLayout, StackLayoutDecoder};
/// use strand_core::types::Address;
///
/// let layout = RuntimeLayout::arachne();
/// let decoder = StackLayoutDecoder::new(&layout);
/// let region = decoder.decode(Address::from(0x1000)).unwrap();
/// assert_eq!(region.slots[5].address, Address::from(0x1028));
/// assert_eq!(region.return_address_slot, Address::from(0x1030));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StackLayoutDecoder<'a>
{
    layout: &'a RuntimeLayout,
}

impl<'a> StackLayoutDecoder<'a>
{
    /// Decoder for the given layout.
    pub fn new(layout: &'a RuntimeLayout) -> Self
    {
        Self { layout }
    }

    /// Slot addresses for a saved stack pointer
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: the region would wrap past the end of the address space
    pub fn decode(&self, sp: Address) -> Result<SavedRegion>
    {
        let entry_stack_pointer = self.entry_stack_pointer(sp)?;
        let slots: SmallVec<[SavedSlot; 8]> = self
            .layout
            .register_push_order
            .iter()
            .zip(0u64..)
            .map(|(register, word)| SavedSlot {
                register: *register,
                address: sp + word * WORD_SIZE,
            })
            .collect();

        Ok(SavedRegion {
            slots,
            return_address_slot: entry_stack_pointer,
            entry_stack_pointer,
        })
    }

    /// `sp` plus the saved region size
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: the addition overflows
    pub fn entry_stack_pointer(&self, sp: Address) -> Result<Address>
    {
        sp.checked_add(self.layout.saved_region_bytes()).ok_or_else(|| {
            StrandError::InvalidArgument(format!("saved stack pointer {sp} is too close to the top of memory"))
        })
    }
}

/// Register values a suspended thread resumes with
///
/// This is everything emulation writes into the live view, read from the
/// target before a single register is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedRegisters
{
    /// Context the values were read from.
    pub context: ThreadContext,
    /// Saved stack pointer as stored in the context.
    pub saved_stack_pointer: Address,
    /// Pushed callee-saved values, in push order.
    pub callee_saved: SmallVec<[(CalleeSaved, u64); 8]>,
    /// Stack pointer at the instant control returns.
    pub stack_pointer: Address,
    /// Return address of the switch call.
    pub program_counter: Address,
}

impl SuspendedRegisters
{
    /// Read a context's saved stack pointer field.
    ///
    /// ## Errors
    ///
    /// - `Evaluation`: the field cannot be read
    pub fn saved_stack_pointer<D>(debugger: &D, layout: &RuntimeLayout, context: ThreadContext) -> Result<Address>
    where
        D: TargetDebugger + ?Sized,
    {
        let expr = layout.context_field(context, &layout.stack_pointer_field);
        Ok(debugger.evaluate(&expr)?.as_address())
    }

    /// Read the full saved register view of a context
    ///
    /// ## Errors
    ///
    /// - `Evaluation`: the context or one of its stack words is unreadable
    /// - `InvalidArgument`: the saved stack pointer is out of range
    pub fn read<D>(debugger: &D, layout: &RuntimeLayout, context: ThreadContext) -> Result<Self>
    where
        D: TargetDebugger + ?Sized,
    {
        let saved_stack_pointer = Self::saved_stack_pointer(debugger, layout, context)?;
        let region = StackLayoutDecoder::new(layout).decode(saved_stack_pointer)?;

        let callee_saved: SmallVec<[(CalleeSaved, u64); 8]> = region
            .slots
            .iter()
            .map(|slot| Ok((slot.register, debugger.evaluate(&Expr::Word(slot.address))?.raw())))
            .collect::<Result<_>>()?;
        let program_counter = debugger.evaluate(&Expr::Word(region.return_address_slot))?.as_address();

        tracing::debug!(
            context = %context,
            sp = %saved_stack_pointer,
            pc = %program_counter,
            "read suspended register region"
        );

        Ok(Self {
            context,
            saved_stack_pointer,
            callee_saved,
            stack_pointer: region.entry_stack_pointer,
            program_counter,
        })
    }

    /// Read only what a context switch needs: entry sp and return address
    ///
    /// ## Errors
    ///
    /// Same as [`SuspendedRegisters::read`].
    pub fn read_entry<D>(debugger: &D, layout: &RuntimeLayout, context: ThreadContext) -> Result<(Address, Address)>
    where
        D: TargetDebugger + ?Sized,
    {
        let saved_stack_pointer = Self::saved_stack_pointer(debugger, layout, context)?;
        let entry = StackLayoutDecoder::new(layout).entry_stack_pointer(saved_stack_pointer)?;
        let program_counter = debugger.evaluate(&Expr::Word(entry))?.as_address();
        Ok((entry, program_counter))
    }
}
