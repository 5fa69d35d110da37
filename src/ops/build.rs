//! The `build` operation: scan, emit a temporary makefile, drive make.

use std::io::Write;

use anyhow::{Context, Result};

use crate::emit;

use super::{make, prepare, temporary_makefile, DriverOptions};

/// Build every given application. Returns the exit code of `make all`.
pub fn build(opts: &DriverOptions, sources: &[String]) -> Result<i32> {
    let (scanner, emit_opts) = prepare(opts, sources)?;

    let mut makefile = temporary_makefile()?;
    let path = makefile.path().display().to_string();

    let blob = emit::render_makefile(&scanner, &emit_opts, &path, None);
    makefile
        .write_all(blob.as_bytes())
        .with_context(|| format!("failed to write to: {path}"))?;

    let _ = make(&path, "clean", opts.verbose);
    let exit_status = make(&path, "all", opts.verbose)?;
    let _ = make(&path, "clean-object-files", opts.verbose);

    Ok(exit_status)
}
