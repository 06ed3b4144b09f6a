//! Typed evaluation results and the expressions the engine evaluates.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Address;

/// A typed scalar produced by the debugger's expression evaluator
///
/// Every value the engine consumes fits in one 64-bit word: pointers,
/// bitmasks and saved register words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value
{
    #[serde(rename = "type")]
    type_name: String,
    #[serde(rename = "value")]
    raw: u64,
}

impl Value
{
    /// Create a value of the given C++ type.
    pub fn new(type_name: impl Into<String>, raw: u64) -> Self
    {
        Self {
            type_name: type_name.into(),
            raw,
        }
    }

    /// Type as reported by the debugger, e.g. `Arachne::ThreadContext *`.
    #[must_use]
    pub fn type_name(&self) -> &str
    {
        &self.type_name
    }

    /// Raw 64-bit contents.
    #[must_use]
    pub const fn raw(&self) -> u64
    {
        self.raw
    }

    /// Contents reinterpreted as an address.
    #[must_use]
    pub const fn as_address(&self) -> Address
    {
        Address::new(self.raw)
    }

    /// `true` for a zero value.
    #[must_use]
    pub const fn is_null(&self) -> bool
    {
        self.raw == 0
    }

    /// Compare the type name, ignoring whitespace.
    ///
    /// Debuggers disagree on whether to print `T *` or `T*`.
    #[must_use]
    pub fn has_type(&self, expected: &str) -> bool
    {
        same_type(&self.type_name, expected)
    }

    /// Pointee type of a pointer type, `None` when not a pointer.
    #[must_use]
    pub fn pointee_type(&self) -> Option<&str>
    {
        pointee_type(&self.type_name)
    }
}

impl fmt::Display for Value
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.pointee_type().is_some() {
            write!(f, "({}) 0x{:x}", self.type_name, self.raw)
        } else {
            write!(f, "{}", self.raw)
        }
    }
}

/// Compare two C++ type names ignoring whitespace.
pub(crate) fn same_type(a: &str, b: &str) -> bool
{
    a.chars()
        .filter(|c| !c.is_whitespace())
        .eq(b.chars().filter(|c| !c.is_whitespace()))
}

/// Strip one level of pointer from a type name.
pub(crate) fn pointee_type(type_name: &str) -> Option<&str>
{
    type_name.trim().strip_suffix('*').map(str::trim_end)
}

/// An expression handed to the debugger's evaluator
///
/// The engine never builds free-form strings; it asks for one of these
/// shapes and lets the backend decide how to evaluate it. `Display` renders
/// the gdb/C++ spelling, which a gdb-backed implementation can pass through
/// verbatim.
///
/// ```rust
/// use strand_core::types::{Address, Expr};
///
/// let sp = Expr::Member {
///     base: Address::from(0x1000),
///     pointer_type: "Arachne::ThreadContext *".into(),
///     path: "sp".into(),
/// };
/// assert_eq!(sp.to_string(), "((Arachne::ThreadContext *)0x1000)->sp");
/// assert_eq!(Expr::Word(Address::from(0x20)).to_string(), "*(uint64_t *)0x20");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr
{
    /// Operator-supplied expression text, evaluated as-is
    Text(String),
    /// A global, e.g. `Arachne::core.loadedContext`
    Symbol(String),
    /// One element of a global array, e.g. `Arachne::core.localThreadContexts[3]`
    Element
    {
        /// Array expression
        array: String,
        /// Element index
        index: usize,
    },
    /// A field reached through a typed pointer, e.g. `((T *)0x1000)->sp`
    ///
    /// `path` may be nested (`_M_i.occupied`).
    Member
    {
        /// Pointer value
        base: Address,
        /// Pointer type used for the cast
        pointer_type: String,
        /// Field path below the pointer
        path: String,
    },
    /// One 8-byte word of target memory
    Word(Address),
}

impl fmt::Display for Expr
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Expr::Text(text) => write!(f, "{text}"),
            Expr::Symbol(name) => write!(f, "{name}"),
            Expr::Element { array, index } => write!(f, "{array}[{index}]"),
            Expr::Member {
                base,
                pointer_type,
                path,
            } => write!(f, "(({pointer_type})0x{base:x})->{path}"),
            Expr::Word(address) => write!(f, "*(uint64_t *)0x{address:x}"),
        }
    }
}
