//! `slipway run` command

use anyhow::Result;

use crate::cli::RunArgs;

use super::driver_options;

pub fn execute(args: RunArgs) -> Result<i32> {
    let opts = driver_options(&args.common, false);
    slipway::ops::run(&opts, &args.source, &args.args)
}
