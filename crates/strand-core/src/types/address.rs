//! Target address type.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Strongly typed address in the inspected process
///
/// Thread contexts, saved stack pointers, stack slots and program counters
/// are all addresses. Wrapping them keeps them from being mixed up with
/// register numbers, slot indices or byte distances.
///
/// ## Example
///
/// ```rust
/// use strand_core::types::Address;
///
/// let sp = Address::from(0x7000);
/// assert_eq!((sp + 48).value(), 0x7030);
/// assert!(Address::ZERO.is_null());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw `u64` value, as handed to the debugger.
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// `true` for the null address.
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use strand_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x30), Some(Address::from(0x1030)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Signed distance `self - base` in bytes.
    ///
    /// Used for stack usage reports, where a corrupt context may put the
    /// saved stack pointer below its own stack base.
    ///
    /// ```rust
    /// use strand_core::types::Address;
    ///
    /// assert_eq!(Address::from(0x2000).distance_from(Address::from(0x1000)), 0x1000);
    /// assert_eq!(Address::from(0x1000).distance_from(Address::from(0x1010)), -0x10);
    /// ```
    #[allow(clippy::cast_possible_wrap)]
    pub const fn distance_from(self, base: Address) -> i64
    {
        self.0.wrapping_sub(base.0) as i64
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
