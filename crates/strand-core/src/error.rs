//! # Error Types
//!
//! General error handling for the inspection engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::RegisterId;

/// Main error type for inspection operations
///
/// ## Error Categories
///
/// 1. **Operator errors**: Usage, NotATargetCore
/// 2. **Capability errors**: RegisterAccess, Evaluation, Backtrace
/// 3. **Configuration errors**: InvalidLayout, InvalidArgument
/// 4. **Image errors**: Image, Json, Io (the halted process image backend)
///
/// Per-thread failures during bulk enumeration are not a variant of their
/// own: they are carried as the `Err` side of each element's result.
#[derive(Error, Debug)]
pub enum StrandError
{
    /// The operator passed something that is not a usable thread context
    ///
    /// Raised before any register is touched.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// The occupancy pointer of the current core is null
    ///
    /// The selected kernel thread is not one of the runtime's scheduler
    /// cores, so it has no thread pool to enumerate.
    #[error("Current core is not an {runtime} core!")]
    NotATargetCore
    {
        /// Name of the runtime, taken from the layout.
        runtime: String,
    },

    /// Reading or writing a live register failed
    #[error("Failed to access register {register}: {details}")]
    RegisterAccess
    {
        /// Register that was being accessed
        register: RegisterId,
        /// Additional error details
        details: String,
    },

    /// The debugger could not evaluate an expression
    #[error("Failed to evaluate `{expression}`: {details}")]
    Evaluation
    {
        /// Rendered expression text
        expression: String,
        /// Additional error details
        details: String,
    },

    /// The native backtrace capability failed
    #[error("Backtrace failed: {0}")]
    Backtrace(String),

    /// Invalid argument passed to an operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The runtime layout configuration is inconsistent
    #[error("Invalid runtime layout: {0}")]
    InvalidLayout(String),

    /// The halted process image is malformed
    #[error("Invalid process image: {0}")]
    Image(String),

    /// The process image or layout file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (reading image or layout files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrandError
{
    /// `true` for errors caused by the operator's argument.
    #[must_use]
    pub fn is_usage(&self) -> bool
    {
        matches!(self, Self::Usage(_))
    }

    pub(crate) fn evaluation(expression: impl ToString, details: impl Into<String>) -> Self
    {
        Self::Evaluation {
            expression: expression.to_string(),
            details: details.into(),
        }
    }
}

/// Argument validation failures
///
/// The messages are the ones shown to the operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError
{
    /// The argument evaluated to a null context pointer
    #[error("A null pointer was passed!")]
    NullPointer,

    /// The argument evaluated to something other than a context pointer
    #[error("Please pass a `{expected}` (got `{found}`)")]
    WrongType
    {
        /// The layout's context pointer type
        expected: String,
        /// Type reported by the debugger
        found: String,
    },
}

/// Convenience type alias for `Result<T, StrandError>`
///
/// ```rust
/// use strand_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, StrandError>;
