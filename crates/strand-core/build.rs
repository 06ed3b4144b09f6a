//! Build script for strand-core
//!
//! This script checks the minimum Rust version before compilation.
//!
//! ## Requirements
//!
//! - **Rust**: 1.65.0 or newer (`let ... else`)

fn main()
{
    // Check minimum Rust version
    // `let ... else` was stabilised in Rust 1.65.0
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 65, 0);

        if rustc_version < min_rust_version {
            panic!("strand-core requires Rust {min_rust_version} or newer, found {rustc_version}");
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }
}
