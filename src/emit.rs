//! Makefile rendering.
//!
//! Turns a populated [`DependencyScanner`] into a classical make-compatible
//! build script with per-application variables, suffix rules and phony
//! targets, plus an optional dependency file mapping each object file to
//! the headers it was built against. Rendering is pure; the driver owns
//! the file lifetimes.

use crate::scan::DependencyScanner;

/// Mode flags and compiler facts the makefile is rendered under.
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    pub compiler: String,
    pub config_file: String,
    /// Comma-separated macros for `-D` flags, as given on the command line.
    pub macros: String,
    pub optimize: bool,
    pub sanitize: bool,
    pub fuzz: bool,
    pub time_execution: bool,
}

const WRAP_WIDTH: usize = 90;

/// Render the build script.
///
/// `makefile` is the file the blob will be written to (the `destruct`
/// target removes it); `makefile_depend` names the dependency file to be
/// included, if one is generated alongside.
pub fn render_makefile(
    scanner: &DependencyScanner,
    opts: &EmitOptions,
    makefile: &str,
    makefile_depend: Option<&str>,
) -> String {
    let apps: Vec<&str> = scanner.applications().iter().map(String::as_str).collect();
    let mut mk = String::with_capacity(1024);

    // Shared variables.

    mk.push_str("CC = ");
    if opts.time_execution {
        mk.push_str("time ");
    }
    mk.push_str(&opts.compiler);
    mk.push('\n');

    mk.push_str("CFLAGS =");
    if opts.compiler.starts_with("clang") {
        mk.push_str(&format!(" --config {}", opts.config_file));
    } else {
        // GCC
        mk.push_str(&format!(" @{}", opts.config_file));
    }
    if opts.optimize {
        mk.push_str(" -O2");
    }

    let mut cflags: Vec<String> = Vec::new();
    if opts.fuzz {
        cflags.push("-fsanitize=fuzzer,address,undefined,integer".to_string());
        cflags.push("-fno-sanitize-recover=all".to_string());
        cflags.push("-DFUZZING_BUILD_MODE_UNSAFE_FOR_PRODUCTION".to_string());
    } else if opts.sanitize {
        cflags.push("-fsanitize=address,undefined,integer".to_string());
        cflags.push("-fno-sanitize-recover=all".to_string());
    }
    let macros = opts.macros.trim_end_matches(',');
    if !macros.is_empty() {
        for name in macros.split(',') {
            cflags.push(format!("-D{name}"));
        }
    }
    for flag in &cflags {
        mk.push_str("\\\n\t\t ");
        mk.push_str(flag);
    }
    mk.push('\n');

    match scanner.include_root() {
        Some(root) => mk.push_str(&format!("INC = -iquote {root}\n")),
        None => mk.push_str("INC = -iquote ./\n"),
    }

    mk.push_str("LINK = -L/usr/local/lib/\n");

    if cfg!(target_os = "freebsd") {
        if let Some(depend) = makefile_depend {
            mk.push_str(&format!("\n.MAKE.DEPENDFILE={depend}\n"));
        }
    }

    // Variables for each application.

    for (index, app) in apps.iter().copied().enumerate() {
        let executable = &app[..app.len() - ".cc".len()];
        mk.push_str(&format!("\nAPP{index} = {executable}\n"));

        mk.push_str(&format!("SRC{index} = "));
        mk.push_str(&scanner.source_dependencies(app).join("\\\n\t   "));
        mk.push('\n');

        mk.push_str(&format!("OBJ{index} = $(SRC{index}:.cc=.o)\n"));

        mk.push_str(&format!("LIB{index} ="));
        for library in scanner.library_dependencies(app) {
            mk.push_str(&format!(" -l{library}"));
        }
        mk.push('\n');
    }

    // How to build object files (suffixes).

    mk.push_str("\n");
    mk.push_str("# Suffixes (how to build object files).\n");
    mk.push_str("# First line deletes all previously specified suffixes.\n");
    mk.push_str(".SUFFIXES:\n");
    mk.push_str(".SUFFIXES: .cc .o\n");
    mk.push_str(".cc.o:\n");
    mk.push_str("\t$(CC) $(CFLAGS) $(INC) -c -o $@ $<\n");

    let mut phony_targets: Vec<&str> = Vec::with_capacity(8);

    // Target: all

    phony_targets.push("all");
    mk.push_str("\nall:");
    let mut all = String::new();
    for index in 0..apps.len() {
        all.push_str(&format!(" $(APP{index})"));
    }
    mk.push_str(&wrap(&all, WRAP_WIDTH, " \\\n\t "));
    mk.push('\n');

    for index in 0..apps.len() {
        mk.push_str(&format!("\n$(APP{index}): ${{OBJ{index}}}\n"));
        mk.push_str(&format!(
            "\t$(CC) $(CFLAGS) -o $(APP{index}) $(OBJ{index}) $(LINK) $(LIB{index})\n"
        ));
    }

    // Target: clean-executables

    phony_targets.push("clean-executables");
    mk.push_str("\nclean-executables:\n");
    for index in 0..apps.len() {
        mk.push_str(&format!("\trm -f $(APP{index})\n"));
    }

    // Target: clean-object-files

    phony_targets.push("clean-object-files");
    mk.push_str("\nclean-object-files:\n");
    for index in 0..apps.len() {
        mk.push_str(&format!("\trm -f $(OBJ{index})\n"));
    }

    // Target: clean

    phony_targets.push("clean");
    mk.push_str("\nclean: clean-object-files clean-executables\n");

    // Target: destruct

    phony_targets.push("destruct");
    mk.push_str(&format!("\ndestruct: clean\n\trm -f {makefile}"));
    if let Some(depend) = makefile_depend {
        mk.push_str(&format!(" {depend}"));
    }
    mk.push('\n');

    if !opts.fuzz {
        // Target: run

        phony_targets.push("run");
        mk.push_str("\nrun: all\n");
        for index in 0..apps.len() {
            mk.push_str(&format!("\t./$(APP{index})\n"));
        }
    } else {
        for index in 0..apps.len() {
            mk.push_str(&format!("\trm -rf $(APP{index}).corpus\n"));
        }

        // Target: minimize-corpus
        // Target: compress-corpus
        // Target: run

        let mut minimize = String::new();
        let mut compress = String::new();
        let mut run = String::new();

        for app in apps.iter().copied() {
            let stem = &app[..app.len() - ".cc".len()];
            let (dir, base) = match stem.rsplit_once('/') {
                Some((parent, base)) => (&stem[..parent.len() + 1], base),
                None => ("", stem),
            };

            let cd_dir_and = if dir.is_empty() {
                String::new()
            } else {
                format!("cd {dir} && ")
            };

            minimize.push_str(&format!(
                "\t@test ! -e {dir}{base}.corpus.old || \\\n\
                 \t\t(echo 'Error: Directory exists: {dir}{base}.corpus.old'; exit 1;)\n"
            ));
            minimize.push_str(&format!(
                "\tmv {dir}{base}.corpus {dir}{base}.corpus.old\n"
            ));
            minimize.push_str(&format!("\tmkdir {dir}{base}.corpus\n"));
            minimize.push_str(&format!(
                "\t{cd_dir_and}./{base} -merge=1 {base}.corpus {base}.corpus.old\n"
            ));
            minimize.push_str(&format!("\trm -rf {dir}{base}.corpus.old\n"));

            let tarcmd = if cfg!(target_os = "freebsd") {
                "tar -cz --gid 0 --uid 0 -f "
            } else if cfg!(target_os = "linux") {
                "tar -cz --owner=0 --group=0 -f "
            } else {
                "tar -czf "
            };

            compress.push_str(&format!("\trm -f {dir}{base}.corpus.tar.gz\n"));
            compress.push_str(&format!(
                "\t{cd_dir_and}{tarcmd}{base}.corpus.tar.gz {base}.corpus\n"
            ));
            compress.push_str(&format!("\trm -rf {dir}{base}.corpus\n"));

            run.push_str(&format!(
                "\t@test -d {dir}{base}.corpus || test ! -e {dir}{base}.corpus.tar.gz || \\\n"
            ));
            run.push_str(&format!(
                "\t\t(echo '{cd_dir_and}tar -xzf {base}.corpus.tar.gz' && \\\n"
            ));
            run.push_str(&format!(
                "\t\t{cd_dir_and}tar -xzf {base}.corpus.tar.gz)\n"
            ));
            run.push_str(&format!("\t@test -d {dir}{base}.corpus || \\\n"));
            run.push_str(&format!(
                "\t\t(echo 'mkdir {dir}{base}.corpus' && mkdir {dir}{base}.corpus)\n"
            ));
            run.push_str(&format!(
                "\t{cd_dir_and}./{base} -rss_limit_mb=3072 -timeout=5"
            ));
            if apps.len() > 1 {
                run.push_str(" -max_total_time=900"); // Seconds
            }
            run.push_str(&format!(" {base}.corpus/\n"));
        }

        phony_targets.push("minimize-corpus");
        phony_targets.push("compress-corpus");
        phony_targets.push("run");

        mk.push_str("\nminimize-corpus: all\n");
        mk.push_str(&minimize);
        mk.push_str("\ncompress-corpus: minimize-corpus\n");
        mk.push_str(&compress);
        mk.push_str("\nrun: all\n");
        mk.push_str(&run);
    }

    // Phony targets.

    mk.push_str("\n.PHONY:");
    for target in &phony_targets {
        mk.push_str(&format!(" {target}"));
    }
    mk.push('\n');

    if !cfg!(target_os = "freebsd") {
        if let Some(depend) = makefile_depend {
            mk.push_str(&format!("\n-include {depend}\n"));
        }
    }

    mk
}

/// Render the dependency file: one `obj: source headers...` line per
/// scanned `.cc` file.
pub fn render_depend(scanner: &DependencyScanner) -> String {
    let mut out = String::with_capacity(4096);

    for file in scanner.scanned_files() {
        let Some(stem) = file.strip_suffix(".cc") else {
            continue;
        };

        let mut line = format!("{stem}.o: {file}");
        for header in scanner.header_dependencies(file) {
            line.push(' ');
            line.push_str(&header);
        }

        out.push_str(&wrap(&line, WRAP_WIDTH, " \\\n  "));
        out.push('\n');
    }

    out
}

/// Greedy wrap of one logical line at space boundaries. The space at the
/// break point is replaced by `delim`.
fn wrap(line: &str, width: usize, delim: &str) -> String {
    if line.len() <= width {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + delim.len());
    let mut rest = line;
    while rest.len() > width {
        let Some(pos) = rest[..width].rfind(' ').filter(|&pos| pos > 0) else {
            break;
        };
        out.push_str(&rest[..pos]);
        out.push_str(delim);
        rest = &rest[pos + 1..];
    }
    out.push_str(rest);
    out
}
