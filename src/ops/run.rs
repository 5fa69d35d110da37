//! The `run` operation: build a single application and execute it.

use std::io::Write;

use anyhow::{Context, Result};

use crate::emit;

use super::{make, prepare, spawn, temporary_makefile, DriverOptions};

/// Build `source` and, if the build succeeds, spawn the executable with
/// `args`. Returns the executable's exit code.
pub fn run(opts: &DriverOptions, source: &str, args: &[String]) -> Result<i32> {
    let executable = format!("./{}", source.strip_suffix(".cc").unwrap_or(source));

    let sources = vec![source.to_string()];
    let (scanner, emit_opts) = prepare(opts, &sources)?;

    let mut makefile = temporary_makefile()?;
    let path = makefile.path().display().to_string();

    let blob = emit::render_makefile(&scanner, &emit_opts, &path, None);
    makefile
        .write_all(blob.as_bytes())
        .with_context(|| format!("failed to write to: {path}"))?;

    let _ = make(&path, "clean", opts.verbose);
    let mut exit_status = make(&path, "all", opts.verbose)?;

    if exit_status == 0 {
        exit_status = spawn(&executable, args, opts.verbose)?;
    }

    let _ = make(&path, "clean", opts.verbose);

    Ok(exit_status)
}
