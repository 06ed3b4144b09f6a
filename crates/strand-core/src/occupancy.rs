//! Enumeration of occupied thread-context slots on a core.

use std::iter::FusedIterator;

use crate::debugger::TargetDebugger;
use crate::error::{Result, StrandError};
use crate::layout::RuntimeLayout;
use crate::types::{Expr, Value};

/// Fixed-width occupancy bitmask
///
/// ```rust
/// use strand_core::occupancy::OccupancyMask;
///
/// let mask = OccupancyMask::new(0b101, 3);
/// assert_eq!(mask.occupied().collect::<Vec<_>>(), vec![0, 2]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyMask
{
    bits: u64,
    width: u32,
}

impl OccupancyMask
{
    /// Mask over the low `width` bits of `bits`; `width` is clamped to 64.
    #[must_use]
    pub const fn new(bits: u64, width: u32) -> Self
    {
        let width = if width > 64 { 64 } else { width };
        let bits = if width == 64 { bits } else { bits & ((1u64 << width) - 1) };
        Self { bits, width }
    }

    /// Bits inside the width.
    #[must_use]
    pub const fn bits(&self) -> u64
    {
        self.bits
    }

    /// Number of slots the mask describes.
    #[must_use]
    pub const fn width(&self) -> u32
    {
        self.width
    }

    /// Whether slot `index` is occupied.
    #[must_use]
    pub const fn is_occupied(&self, index: u32) -> bool
    {
        index < self.width && (self.bits >> index) & 1 == 1
    }

    /// Number of occupied slots.
    #[must_use]
    pub const fn count(&self) -> u32
    {
        self.bits.count_ones()
    }

    /// Occupied slot indices, ascending. Clone the iterator to restart it.
    #[must_use]
    pub const fn occupied(&self) -> OccupiedSlots
    {
        OccupiedSlots {
            mask: *self,
            next: 0,
        }
    }
}

/// Lazy ascending iterator over occupied slot indices.
#[derive(Debug, Clone)]
pub struct OccupiedSlots
{
    mask: OccupancyMask,
    next: u32,
}

impl Iterator for OccupiedSlots
{
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item>
    {
        while self.next < self.mask.width {
            let index = self.next;
            self.next += 1;
            if self.mask.is_occupied(index) {
                return Some(index as usize);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>)
    {
        (0, Some((self.mask.width - self.next) as usize))
    }
}

impl FusedIterator for OccupiedSlots {}

/// Reads a core's occupancy mask and slot table
pub struct OccupancyScanner<'a>
{
    layout: &'a RuntimeLayout,
}

impl<'a> OccupancyScanner<'a>
{
    /// Scanner for the given layout.
    pub fn new(layout: &'a RuntimeLayout) -> Self
    {
        Self { layout }
    }

    /// Read the occupancy bitmask once
    ///
    /// ## Errors
    ///
    /// - `NotATargetCore`: the occupancy pointer is null
    /// - `Evaluation`: the pointer or the mask cannot be read
    pub fn read_mask<D>(&self, debugger: &D) -> Result<OccupancyMask>
    where
        D: TargetDebugger + ?Sized,
    {
        let pointer = debugger.evaluate(&Expr::Symbol(self.layout.occupancy.clone()))?;
        if pointer.is_null() {
            return Err(StrandError::NotATargetCore {
                runtime: self.layout.runtime_name.clone(),
            });
        }

        let mask = debugger.evaluate(&Expr::Member {
            base: pointer.as_address(),
            pointer_type: pointer.type_name().to_string(),
            path: self.layout.occupancy_mask_path.clone(),
        })?;
        let mask = OccupancyMask::new(mask.raw(), self.layout.occupancy_width);
        tracing::debug!(mask = format_args!("{:#x}", mask.bits()), occupied = mask.count(), "read occupancy");
        Ok(mask)
    }

    /// Occupied slot indices of the current core.
    ///
    /// ## Errors
    ///
    /// Same as [`OccupancyScanner::read_mask`].
    pub fn list_occupied<D>(&self, debugger: &D) -> Result<OccupiedSlots>
    where
        D: TargetDebugger + ?Sized,
    {
        Ok(self.read_mask(debugger)?.occupied())
    }

    /// Evaluate `slotTable[index]`.
    ///
    /// ## Errors
    ///
    /// - `Evaluation`: the slot table element cannot be read
    pub fn slot<D>(&self, debugger: &D, index: usize) -> Result<Value>
    where
        D: TargetDebugger + ?Sized,
    {
        debugger.evaluate(&Expr::Element {
            array: self.layout.slot_table.clone(),
            index,
        })
    }
}
