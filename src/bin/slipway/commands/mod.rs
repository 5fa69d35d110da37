//! Command implementations

pub mod build;
pub mod completions;
pub mod gen;
pub mod run;
pub mod runall;

use slipway::ops::DriverOptions;

use crate::cli::CommonArgs;

pub(crate) fn driver_options(common: &CommonArgs, fuzz: bool) -> DriverOptions {
    DriverOptions {
        compiler: common.compiler.clone(),
        defines: common.define.clone(),
        optimize: common.optimize,
        sanitize: common.sanitize,
        fuzz,
        time_execution: common.time_execution,
        verbose: common.verbose_level(),
    }
}
