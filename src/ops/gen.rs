//! The `gen` operation: scan and write a persistent makefile.

use std::path::Path;

use anyhow::{bail, Result};

use crate::emit;
use crate::util::fs::{write_new, write_string};
use crate::validate;

use super::{prepare, DriverOptions};

/// Generate `makefile` (default `"makefile"`) and a sibling `.depend` file
/// for the given applications. Refuses to overwrite an existing makefile.
pub fn gen(opts: &DriverOptions, makefile: Option<&str>, sources: &[String]) -> Result<i32> {
    let makefile = makefile.unwrap_or("makefile");

    if !validate::is_file_path(makefile) {
        bail!("invalid makefile name: {makefile}");
    }
    if Path::new(makefile).exists() {
        bail!("makefile already exists: {makefile}");
    }

    let (scanner, emit_opts) = prepare(opts, sources)?;

    let makefile_depend = format!("{makefile}.depend");

    tracing::debug!("generating: {makefile}");
    let blob = emit::render_makefile(&scanner, &emit_opts, makefile, Some(&makefile_depend));
    write_new(makefile, &blob)?;

    tracing::debug!("generating: {makefile_depend}");
    let depend_blob = emit::render_depend(&scanner);
    write_string(&makefile_depend, &depend_blob)?;

    Ok(0)
}
