//! High-level operations.
//!
//! This module contains the implementation of the slipway commands: the
//! shared scan-and-probe preparation, and the `build`/`gen`/`run`/`runall`
//! drivers on top of it.

pub mod build;
pub mod gen;
pub mod run;
pub mod runall;

use std::process::ExitStatus;

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

use crate::emit::EmitOptions;
use crate::probe;
use crate::scan::DependencyScanner;
use crate::util::process::ProcessBuilder;
use crate::validate;

pub use build::build;
pub use gen::gen;
pub use run::run;
pub use runall::runall;

pub const COMPILER_DEFAULT: &str = "clang++";

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// Compiler name; empty selects [`COMPILER_DEFAULT`].
    pub compiler: String,
    /// Comma-separated macros to define (the `-d` option).
    pub defines: String,
    pub optimize: bool,
    pub sanitize: bool,
    pub fuzz: bool,
    pub time_execution: bool,
    /// Verbosity level, 0 to 3.
    pub verbose: u8,
}

/// Validate the compiler, locate its config file, probe it for defaults,
/// register the application sources and scan them.
fn prepare(
    opts: &DriverOptions,
    sources: &[String],
) -> Result<(DependencyScanner, EmitOptions)> {
    let compiler = if opts.compiler.is_empty() {
        COMPILER_DEFAULT
    } else {
        opts.compiler.as_str()
    };
    if !validate::is_compiler(compiler) {
        bail!(
            "invalid compiler: {compiler} \
             (the compiler must match (clang|g)++(-devel|[0-9]{{0,2}}))"
        );
    }

    let config_file = probe::find_config_file(compiler).with_context(|| {
        format!(
            "\"{}\" config not found in the current directory or in any parent directory",
            probe::config_name(compiler)
        )
    })?;

    let defaults = probe::fetch_defaults(compiler, &config_file, opts.optimize)?;

    let mut scanner = DependencyScanner::new(defaults.macros, defaults.include_paths);
    scanner.define_macros(&opts.defines)?;
    scanner.log_environment();

    for source in sources {
        scanner.add_application(source)?;
    }
    if scanner.applications().is_empty() {
        bail!("no application source files to process");
    }

    scanner.parse_all()?;

    let emit = EmitOptions {
        compiler: compiler.to_string(),
        config_file,
        macros: opts.defines.clone(),
        optimize: opts.optimize,
        sanitize: opts.sanitize,
        fuzz: opts.fuzz,
        time_execution: opts.time_execution,
    };

    Ok((scanner, emit))
}

/// A uniquely named makefile in the current directory, removed on drop on
/// every exit path.
fn temporary_makefile() -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("tmp-")
        .suffix(".mk")
        .tempfile_in(".")
        .context("failed to create temporary makefile")
}

/// Invoke `make -f <makefile> <target>`.
///
/// Commands are echoed by make itself unless the verbosity level calls
/// for silence: level 0 always, level 1 for the clean targets.
fn make(makefile: &str, target: &str, verbose: u8) -> Result<i32> {
    let mut cmd = ProcessBuilder::new("make");
    if verbose == 0 || (verbose == 1 && target.starts_with("clean")) {
        cmd = cmd.arg("-s");
    }
    cmd = cmd.args(["-f", makefile, target]);

    tracing::info!("{}", cmd.display_command());

    let status = cmd.status()?;
    exit_code(status, "make")
}

/// Spawn an executable with pass-through stdio and return its exit code.
fn spawn(path: &str, args: &[String], verbose: u8) -> Result<i32> {
    if verbose >= 1 {
        if args.is_empty() {
            eprintln!("{path}");
        } else {
            eprintln!("{path} ...");
        }
    }

    let status = ProcessBuilder::new(path)
        .args(args)
        .status()
        .with_context(|| format!("failed to execute: {path}"))?;
    exit_code(status, path)
}

fn exit_code(status: ExitStatus, what: &str) -> Result<i32> {
    match status.code() {
        Some(code) => Ok(code),
        None => bail!("exited abnormally: {what}"),
    }
}
