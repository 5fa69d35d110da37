//! CLI definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;

const VERBOSITY_HELP: &str = "Verbosity levels:
  1. Show compile/run commands
  2. Show all commands
  3. Debug";

/// Slipway - a makefile generator and build driver for C++ applications
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build one or more applications
    Build(BuildArgs),

    /// Generate a makefile for one or more applications
    Gen(GenArgs),

    /// Build and run a single application with optional arguments
    Run(RunArgs),

    /// Build and run one or more applications
    Runall(RunallArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by all build-driving commands.
#[derive(Args)]
pub struct CommonArgs {
    /// Compiler
    #[arg(short, long, default_value = "clang++", value_name = "COMPILER")]
    pub compiler: String,

    /// Define macro(s)
    #[arg(
        short,
        long,
        default_value = "",
        value_name = "MACRO[,...]",
        overrides_with = "define"
    )]
    pub define: String,

    /// Optimize (-O2)
    #[arg(short, long)]
    pub optimize: bool,

    /// Enable sanitizers (Address & UndefinedBehavior)
    #[arg(short, long)]
    pub sanitize: bool,

    /// Time command execution (implies verbose)
    #[arg(short, long)]
    pub time_execution: bool,

    /// Increase verbosity (up to three times)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl CommonArgs {
    /// The effective verbosity level: `-t` implies at least 1, capped at 3.
    pub fn verbose_level(&self) -> u8 {
        let level = if self.time_execution {
            self.verbose.max(1)
        } else {
            self.verbose
        };
        level.min(3)
    }
}

#[derive(Args)]
#[command(after_help = VERBOSITY_HELP)]
pub struct BuildArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Application source files
    #[arg(required = true, value_name = "APP.cc")]
    pub sources: Vec<String>,
}

#[derive(Args)]
#[command(after_help = VERBOSITY_HELP)]
pub struct GenArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Build libFuzzer binaries (implies sanitizers)
    #[arg(short = 'z', long)]
    pub fuzz: bool,

    /// Write to FILE instead of "makefile"
    #[arg(short = 'f', long, value_name = "FILE")]
    pub makefile: Option<String>,

    /// Application source files
    #[arg(required = true, value_name = "APP.cc")]
    pub sources: Vec<String>,
}

#[derive(Args)]
#[command(after_help = VERBOSITY_HELP)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Application source file
    #[arg(value_name = "APP.cc")]
    pub source: String,

    /// Arguments passed through to the application
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

#[derive(Args)]
#[command(after_help = VERBOSITY_HELP)]
pub struct RunallArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Application source files
    #[arg(required = true, value_name = "APP.cc")]
    pub sources: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
