//! `slipway build` command

use anyhow::Result;

use crate::cli::BuildArgs;

use super::driver_options;

pub fn execute(args: BuildArgs) -> Result<i32> {
    let opts = driver_options(&args.common, false);
    slipway::ops::build(&opts, &args.sources)
}
