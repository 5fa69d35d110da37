//! The `runall` operation: build and run every application via make.

use std::io::Write;

use anyhow::{Context, Result};

use crate::emit;

use super::{make, prepare, temporary_makefile, DriverOptions};

/// Build and run every given application through the makefile's `run`
/// target. Returns the exit code of `make run`.
pub fn runall(opts: &DriverOptions, sources: &[String]) -> Result<i32> {
    let (scanner, emit_opts) = prepare(opts, sources)?;

    let mut makefile = temporary_makefile()?;
    let path = makefile.path().display().to_string();

    let blob = emit::render_makefile(&scanner, &emit_opts, &path, None);
    makefile
        .write_all(blob.as_bytes())
        .with_context(|| format!("failed to write to: {path}"))?;

    let _ = make(&path, "clean", opts.verbose);
    let exit_status = make(&path, "run", opts.verbose)?;
    let _ = make(&path, "clean", opts.verbose);

    Ok(exit_status)
}
