//! `slipway completions` command

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::{Cli, CompletionsArgs};

pub fn execute(args: CompletionsArgs) -> Result<i32> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "slipway", &mut std::io::stdout());
    Ok(0)
}
