//! `slipway runall` command

use anyhow::Result;

use crate::cli::RunallArgs;

use super::driver_options;

pub fn execute(args: RunallArgs) -> Result<i32> {
    let opts = driver_options(&args.common, false);
    slipway::ops::runall(&opts, &args.sources)
}
