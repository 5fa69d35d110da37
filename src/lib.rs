//! Slipway - a makefile generator and build driver for C++ applications
//!
//! Given one or more application source files, slipway discovers the full
//! transitive graph of sources, headers and link-libraries by statically
//! interpreting `#include` directives under a simulated preprocessor, then
//! emits a make-compatible build script and can drive it to compile, clean
//! or run the resulting executables.

pub mod emit;
pub mod ops;
pub mod preprocess;
pub mod probe;
pub mod scan;
pub mod util;
pub mod validate;

/// Test fixtures for scanner and emitter tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides scratch project trees rooted in temporary
/// directories.
#[cfg(test)]
pub mod test_support;

pub use preprocess::{Evaluator, Verdict};
pub use scan::{DependencyScanner, ScanError};
