//! # Debugger Backends
//!
//! Concrete implementations of [`TargetDebugger`](crate::TargetDebugger).
//!
//! - **image**: a halted process image loaded from JSON, used by the `strand`
//!   command line tool and the integration tests
//!
//! A gdb or lldb binding implements the same trait from inside the host
//! debugger's scripting interface and lives outside this crate.

pub mod image;

pub use image::ImageDebugger;
