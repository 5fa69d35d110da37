//! Compiler defaults probe.
//!
//! Asks the configured compiler for its predefined macros and its system
//! include search paths by preprocessing an empty translation unit with
//! `-v -dM -E`, and locates the compiler config file (`.clang` / `.gcc`)
//! that every compile will be driven through.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use crate::util::fs::is_regular;
use crate::util::process::ProcessBuilder;

/// What the compiler reports about itself.
#[derive(Debug, Default)]
pub struct CompilerDefaults {
    /// Predefined macro name -> value.
    pub macros: BTreeMap<String, String>,
    /// System include search directories, each with a trailing `/`.
    pub include_paths: Vec<String>,
}

const INCLUDE_LIST_START: &str = "#include <...> search starts here:";

/// The config file name for the compiler family.
pub fn config_name(compiler: &str) -> &'static str {
    if compiler.starts_with("clang") {
        ".clang"
    } else {
        ".gcc"
    }
}

/// Search the current directory and up to nine parent directories for the
/// compiler config file.
///
/// The returned path always contains a directory separator, even for the
/// current directory - clang resolves a bare config file name against its
/// own search locations instead:
/// <https://clang.llvm.org/docs/UsersManual.html#configuration-files>
pub fn find_config_file(compiler: &str) -> Option<String> {
    let name = config_name(compiler);

    let candidate = format!("./{name}");
    if is_regular(&candidate) {
        return Some(candidate);
    }

    let mut prefix = String::from("../");
    let mut levels = 1;
    loop {
        let candidate = format!("{prefix}{name}");
        if is_regular(&candidate) {
            return Some(candidate);
        }

        prefix.push_str("../");
        levels += 1;
        if levels >= 10 {
            return None;
        }
    }
}

/// Run the compiler once and parse its preprocessor defaults.
///
/// Succeeds only when the compiler exits successfully and reports at least
/// one macro and one include path.
pub fn fetch_defaults(
    compiler: &str,
    config_file: &str,
    optimize: bool,
) -> Result<CompilerDefaults> {
    let mut cmd = ProcessBuilder::new(compiler);

    if compiler.starts_with("clang") {
        cmd = cmd.arg("--config").arg(config_file);
    } else {
        // GCC
        cmd = cmd.arg(format!("@{config_file}"));
    }

    if optimize {
        cmd = cmd.arg("-O2");
    }
    cmd = cmd.args(["-v", "-x", "c++", "/dev/null", "-dM", "-E"]);

    tracing::info!("{}", cmd.display_command());

    let output = cmd
        .exec()
        .with_context(|| format!("failed to run compiler: {compiler}"))?;

    let mut defaults = CompilerDefaults::default();

    // The include list arrives on stderr (`-v`), the defines on stdout
    // (`-dM -E`); the two-state reader is insensitive to the seam.
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(stderr.lines().chain(stdout.lines()), &mut defaults);

    if defaults.macros.is_empty() || defaults.include_paths.is_empty() || !output.status.success()
    {
        bail!("could not get predefined macros and include paths from compiler: {compiler}");
    }

    Ok(defaults)
}

enum ReadState {
    MaybeDefine,
    IncludeList,
}

fn parse_probe_output<'a>(lines: impl Iterator<Item = &'a str>, defaults: &mut CompilerDefaults) {
    let mut state = ReadState::MaybeDefine;

    for line in lines {
        let line = line.trim_matches(|c: char| c.is_ascii_control() || c == ' ');

        match state {
            ReadState::MaybeDefine => {
                if let Some(rest) = line.strip_prefix("#define ") {
                    let (name, value) = rest.split_once(' ').unwrap_or((rest, ""));
                    if !name.is_empty() {
                        defaults
                            .macros
                            .insert(name.to_string(), value.to_string());
                    }
                } else if line == INCLUDE_LIST_START {
                    state = ReadState::IncludeList;
                }
            }
            ReadState::IncludeList => {
                if line.starts_with('/') {
                    let mut path = line.to_string();
                    if !path.ends_with('/') {
                        path.push('/');
                    }
                    defaults.include_paths.push(path);
                } else {
                    state = ReadState::MaybeDefine;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_name_by_family() {
        assert_eq!(config_name("clang++"), ".clang");
        assert_eq!(config_name("clang++-devel"), ".clang");
        assert_eq!(config_name("g++"), ".gcc");
        assert_eq!(config_name("g++12"), ".gcc");
    }

    #[test]
    fn parses_defines_and_include_list() {
        let output = "\
clang version 16.0.6
#define __STDC__ 1
#define __linux__ 1
#define __VERSION__ \"Clang 16.0.6\"
ignoring nonexistent directory \"/usr/local/include/x86_64\"
#include \"...\" search starts here:
#include <...> search starts here:
 /usr/lib/clang/16/include
 /usr/local/include/
 /usr/include
End of search list.
#define LATE 1
";

        let mut defaults = CompilerDefaults::default();
        parse_probe_output(output.lines(), &mut defaults);

        assert_eq!(defaults.macros.len(), 4);
        assert_eq!(defaults.macros["__STDC__"], "1");
        assert_eq!(defaults.macros["__VERSION__"], "\"Clang 16.0.6\"");
        assert_eq!(defaults.macros["LATE"], "1");
        assert_eq!(
            defaults.include_paths,
            [
                "/usr/lib/clang/16/include/",
                "/usr/local/include/",
                "/usr/include/",
            ]
        );
    }

    #[test]
    fn define_without_value_is_kept() {
        let mut defaults = CompilerDefaults::default();
        parse_probe_output("#define BARE\n".lines(), &mut defaults);
        assert_eq!(defaults.macros["BARE"], "");
    }

    #[test]
    fn probe_failure_surfaces_as_error() {
        let result = fetch_defaults("clang++", "./nonexistent-config", false);
        // Either the compiler is missing or it rejects the bogus config;
        // both must surface as an error, never as empty defaults.
        assert!(result.is_err());
    }
}
