//! `slipway gen` command

use anyhow::Result;

use crate::cli::GenArgs;

use super::driver_options;

pub fn execute(args: GenArgs) -> Result<i32> {
    let opts = driver_options(&args.common, args.fuzz);
    slipway::ops::gen(&opts, args.makefile.as_deref(), &args.sources)
}
