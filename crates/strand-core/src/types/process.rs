//! Kernel thread and cooperative thread context handles.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Address, Value};
use crate::error::UsageError;

/// Debugger-visible identifier of an OS-level thread
///
/// This is the thread whose register view gets borrowed. In gdb terms it is
/// the number of the selected thread, not the kernel TID.
///
/// ```rust
/// use strand_core::types::KernelThreadId;
///
/// let thread = KernelThreadId::from(3);
/// assert_eq!(thread.raw(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KernelThreadId(pub u64);

impl KernelThreadId
{
    /// Raw numeric identifier.
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for KernelThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for KernelThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Address of a cooperative thread's control block
///
/// Only obtainable by validating a typed [`Value`], so holding one means the
/// value was non-null and had the runtime's context pointer type.
///
/// ```rust
/// use strand_core::types::{ThreadContext, Value};
///
/// let value = Value::new("Arachne::ThreadContext *", 0x1000);
/// let context = ThreadContext::resolve(&value, "Arachne::ThreadContext *").unwrap();
/// assert_eq!(context.address().value(), 0x1000);
///
/// let null = Value::new("Arachne::ThreadContext *", 0);
/// assert!(ThreadContext::resolve(&null, "Arachne::ThreadContext *").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadContext(Address);

impl ThreadContext
{
    /// Validate an evaluated value as a context pointer.
    ///
    /// The type is checked before the value so that a null pointer of the
    /// wrong type reports the type mismatch.
    ///
    /// ## Errors
    ///
    /// - `UsageError::WrongType`: the value's type is not `expected_type`
    /// - `UsageError::NullPointer`: the pointer is null
    pub fn resolve(value: &Value, expected_type: &str) -> std::result::Result<Self, UsageError>
    {
        if !value.has_type(expected_type) {
            return Err(UsageError::WrongType {
                expected: expected_type.trim().to_string(),
                found: value.type_name().to_string(),
            });
        }
        if value.is_null() {
            return Err(UsageError::NullPointer);
        }
        Ok(Self(value.as_address()))
    }

    /// Address of the control block.
    #[must_use]
    pub const fn address(self) -> Address
    {
        self.0
    }
}

impl fmt::Display for ThreadContext
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:x}", self.0)
    }
}
