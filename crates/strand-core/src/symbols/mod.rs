//! # Symbols
//!
//! Address to function-name lookup for the process image backend.
//!
//! A halted process image carries its function ranges directly, so no
//! object file parsing happens here. Names are demangled once, when the
//! table is built.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrandError};
use crate::types::{Address, SymbolName};

mod demangle;

pub(crate) use demangle::make_symbol_name;

/// One function's address range as stored in a process image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRange
{
    /// First address of the function.
    pub start: Address,
    /// One past the last address.
    pub end: Address,
    /// Raw (possibly mangled) name.
    pub name: String,
}

/// Sorted, non-overlapping function ranges
#[derive(Debug, Clone, Default)]
pub struct SymbolTable
{
    entries: Vec<(Address, Address, SymbolName)>,
}

impl SymbolTable
{
    /// Build a table from unordered ranges
    ///
    /// ## Errors
    ///
    /// - `Image`: a range is empty or two ranges overlap
    pub fn new(ranges: &[SymbolRange]) -> Result<Self>
    {
        let mut entries: Vec<_> = ranges
            .iter()
            .map(|range| (range.start, range.end, make_symbol_name(range.name.clone())))
            .collect();
        entries.sort_by_key(|(start, _, _)| *start);

        for (start, end, name) in &entries {
            if end <= start {
                return Err(StrandError::Image(format!("symbol `{}` has an empty range", name.raw())));
            }
        }
        for pair in entries.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err(StrandError::Image(format!(
                    "symbols `{}` and `{}` overlap",
                    pair[0].2.raw(),
                    pair[1].2.raw()
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Function containing `address`.
    #[must_use]
    pub fn lookup(&self, address: Address) -> Option<&SymbolName>
    {
        let index = self.entries.partition_point(|(start, _, _)| *start <= address);
        let (_, end, name) = self.entries.get(index.checked_sub(1)?)?;
        (address < *end).then_some(name)
    }

    /// Number of functions.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// `true` if the table has no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }
}
