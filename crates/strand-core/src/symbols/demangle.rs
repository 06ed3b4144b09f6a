//! Symbol demangling utilities.
//!
//! Compilers "mangle" symbol names to encode namespaces and types. The
//! runtime itself is C++, but applications embedding it may well be Rust,
//! so both schemes show up in the same backtrace:
//!
//! - **Rust v0**: `_R...`
//! - **Rust legacy**: `_ZN...E` with a trailing `17h<hash>E` segment
//! - **C++**: Itanium ABI, `_Z...`
//!
//! Rust names are demangled with `rustc-demangle` and shown without the
//! hash. C++ names are kept as-is, which is also what the runtime's own
//! symbol files carry when they were written already demangled.

use rustc_demangle::try_demangle;

use crate::types::{SymbolLanguage, SymbolName};

/// Create a `SymbolName` from a raw symbol string.
pub(crate) fn make_symbol_name(raw: String) -> SymbolName
{
    let language = detect_language(&raw);
    let demangled = match language {
        SymbolLanguage::Rust => try_demangle(&raw).ok().map(|d| format!("{d:#}")),
        SymbolLanguage::Cpp | SymbolLanguage::Unknown => None,
    };

    SymbolName::new(raw, demangled, language)
}

fn detect_language(raw: &str) -> SymbolLanguage
{
    if raw.starts_with("_R") || is_rust_legacy(raw) {
        SymbolLanguage::Rust
    } else if raw.starts_with("_Z") || raw.contains("::") {
        SymbolLanguage::Cpp
    } else {
        SymbolLanguage::Unknown
    }
}

// Legacy Rust symbols are a bare nested name: nothing follows the closing `E`
// and the last path segment is the hash. C++ functions always carry a
// parameter encoding after the nested name.
fn is_rust_legacy(raw: &str) -> bool
{
    raw.starts_with("_ZN") && raw.ends_with('E') && raw.contains("17h")
}
