//! Recursive include and library dependency scanning.
//!
//! The scanner owns the preprocessor environment, the registered
//! application sources and the dependency map. Starting from each
//! application it follows quoted `#include` directives that are live under
//! the conditional-compilation evaluator, pairs each header with its twin
//! source by filename convention, collects inline library annotations, and
//! answers transitive closure queries over the recorded graph.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::preprocess::{Evaluator, Verdict};
use crate::util::fs::{home_dir, is_regular};
use crate::validate;

// Around 10 is normal for a layered header library; anything past this
// limit indicates a degenerate cycle that slipped the memoization guard.
const MAX_DEPTH: u32 = 128;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("path must have \".cc\" extension: {0}")]
    NotASource(String),

    #[error("unsupported character in basename: {0}")]
    InvalidBase(String),

    #[error("unsupported character in path: {0}")]
    InvalidDirectory(String),

    #[error("path must be relative: {0}")]
    AbsolutePath(String),

    #[error("reserved target: {0}")]
    ReservedTarget(String),

    #[error("a path starting with a dot must include a slash: {0}")]
    DotWithoutSlash(String),

    #[error("duplicate application source file: {0}")]
    DuplicateApplication(String),

    #[error("invalid macro: {0}")]
    InvalidMacro(String),

    #[error("invalid library name: {0}")]
    InvalidLibrary(String),

    #[error("invalid file path: {0}")]
    InvalidPath(String),

    #[error("failed to detect include path from: {0}")]
    IncludeRootNotFound(String),

    #[error("file is empty or unreadable: {0}")]
    EmptyOrUnreadable(String),

    #[error("maximum recursion depth ({MAX_DEPTH}) exceeded")]
    DepthExceeded,

    #[error("while scanning {file}")]
    While {
        file: String,
        #[source]
        source: Box<ScanError>,
    },
}

/// What one scanned file pulls in directly.
///
/// All three collections preserve insertion order; the closure queries
/// inherit their ordering from it.
#[derive(Debug, Default)]
pub struct FileDeps {
    pub libraries: Vec<String>,
    pub source_files: Vec<String>,
    pub header_files: Vec<String>,
}

/// Recursive dependency scanner.
#[derive(Debug)]
pub struct DependencyScanner {
    predefined_macros: BTreeMap<String, String>,
    include_paths: Vec<String>,

    applications: BTreeSet<String>,

    // Keyed by file path. Presence means scanned, or currently being
    // scanned - the map doubles as the cycle guard.
    files: BTreeMap<String, FileDeps>,

    // Set once, by the first quoted include that resolves.
    include_root: Option<String>,
}

impl DependencyScanner {
    /// Create a scanner seeded with the compiler's predefined macros and
    /// include search paths (see [`crate::probe`]).
    pub fn new(predefined_macros: BTreeMap<String, String>, include_paths: Vec<String>) -> Self {
        DependencyScanner {
            predefined_macros,
            include_paths,
            applications: BTreeSet::new(),
            files: BTreeMap::new(),
            include_root: None,
        }
    }

    /// Define additional macros from a comma-separated list (the `-d`
    /// option). Each macro is defined to `1`.
    pub fn define_macros(&mut self, macros: &str) -> Result<(), ScanError> {
        let macros = macros.trim_end_matches(',');
        if macros.is_empty() {
            return Ok(());
        }
        for name in macros.split(',') {
            if !validate::is_macro(name) {
                return Err(ScanError::InvalidMacro(name.to_string()));
            }
            tracing::debug!("adding macro: #define {name} 1");
            self.predefined_macros
                .insert(name.to_string(), "1".to_string());
        }
        Ok(())
    }

    /// Register an application source file.
    pub fn add_application(&mut self, path: &str) -> Result<(), ScanError> {
        tracing::debug!("adding application source: {path}");

        let Some(stem) = path.strip_suffix(".cc") else {
            return Err(ScanError::NotASource(path.to_string()));
        };
        let (dir, base) = match stem.rsplit_once('/') {
            Some((parent, base)) => (&stem[..parent.len() + 1], base),
            None => ("", stem),
        };

        if !validate::is_base(base) {
            return Err(ScanError::InvalidBase(base.to_string()));
        }
        if !validate::is_directory(dir) {
            return Err(ScanError::InvalidDirectory(dir.to_string()));
        }
        if dir.starts_with('/') {
            return Err(ScanError::AbsolutePath(path.to_string()));
        }
        if validate::is_reserved_target(dir, base) {
            return Err(ScanError::ReservedTarget(format!("{dir}{base}")));
        }
        if path.starts_with('.') && !path.contains('/') {
            return Err(ScanError::DotWithoutSlash(path.to_string()));
        }

        if is_regular(&format!("{path}.ignore")) {
            tracing::warn!("ignoring application source file: {path}[.ignore]");
        } else if !self.applications.insert(path.to_string()) {
            return Err(ScanError::DuplicateApplication(path.to_string()));
        }

        Ok(())
    }

    pub fn applications(&self) -> &BTreeSet<String> {
        &self.applications
    }

    pub fn include_root(&self) -> Option<&str> {
        self.include_root.as_deref()
    }

    /// Every file path the scan has visited, in sorted order.
    pub fn scanned_files(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.keys().map(String::as_str)
    }

    /// Scan every registered application.
    pub fn parse_all(&mut self) -> Result<(), ScanError> {
        let applications: Vec<String> = self.applications.iter().cloned().collect();
        for application in applications {
            tracing::debug!("parsing: {application}");
            self.parse_recursive(&application, 0)?;
        }
        Ok(())
    }

    /// Scan one file and everything it transitively includes.
    ///
    /// Idempotent: a file that is already in the dependency map is not
    /// read again.
    pub fn parse_recursive(&mut self, file: &str, depth: u32) -> Result<(), ScanError> {
        let DependencyScanner {
            predefined_macros,
            include_paths,
            files,
            include_root,
            ..
        } = self;
        parse_file(predefined_macros, include_paths, files, include_root, file, depth)
    }

    /// The transitive source files needed to link `source_file`, starting
    /// with the file itself, in insertion order.
    pub fn source_dependencies(&self, source_file: &str) -> Vec<String> {
        let mut sources = vec![source_file.to_string()];
        let mut handled = Vec::new();
        self.source_walk(source_file, &mut sources, &mut handled);
        sources
    }

    fn source_walk(&self, file: &str, sources: &mut Vec<String>, handled: &mut Vec<String>) {
        let Some(deps) = self.files.get(file) else {
            return;
        };

        for source_file in &deps.source_files {
            if insert_unique(sources, source_file) {
                self.source_walk(source_file, sources, handled);
            }
        }

        for header_file in &deps.header_files {
            if insert_unique(handled, header_file) {
                self.source_walk(header_file, sources, handled);
            }
        }
    }

    /// The transitive header files reachable from `file` over header
    /// edges, in insertion order.
    pub fn header_dependencies(&self, file: &str) -> Vec<String> {
        let mut headers = Vec::new();
        self.header_walk(file, &mut headers);
        headers
    }

    fn header_walk(&self, file: &str, headers: &mut Vec<String>) {
        let Some(deps) = self.files.get(file) else {
            return;
        };

        for header_file in &deps.header_files {
            if insert_unique(headers, header_file) {
                self.header_walk(header_file, headers);
            }
        }
    }

    /// The libraries needed to link `source_file`, collected over both
    /// source and header edges, in insertion order.
    pub fn library_dependencies(&self, source_file: &str) -> Vec<String> {
        let mut libraries = Vec::new();
        let mut handled = Vec::new();
        self.library_walk(source_file, &mut libraries, &mut handled);
        libraries
    }

    fn library_walk(&self, file: &str, libraries: &mut Vec<String>, handled: &mut Vec<String>) {
        let Some(deps) = self.files.get(file) else {
            return;
        };

        for library in &deps.libraries {
            insert_unique(libraries, library);
        }

        for source_file in &deps.source_files {
            if insert_unique(handled, source_file) {
                self.library_walk(source_file, libraries, handled);
            }
        }

        for header_file in &deps.header_files {
            if insert_unique(handled, header_file) {
                self.library_walk(header_file, libraries, handled);
            }
        }
    }

    /// Log the preprocessor environment the scan will run under.
    pub fn log_environment(&self) {
        for (name, value) in &self.predefined_macros {
            tracing::debug!("#define {name} {value}");
        }
        for path in &self.include_paths {
            tracing::debug!("include path: {path}");
        }
    }
}

#[cfg(test)]
impl DependencyScanner {
    /// Pre-seed the include root, which is normally detected from the
    /// first quoted include relative to the working directory.
    pub(crate) fn seed_include_root(&mut self, root: impl Into<String>) {
        self.include_root = Some(root.into());
    }

    /// Register an application without the relative-path validation, so
    /// fixtures can use absolute paths into a temp directory.
    pub(crate) fn seed_application(&mut self, path: impl Into<String>) {
        self.applications.insert(path.into());
    }
}

fn parse_file(
    predefined_macros: &BTreeMap<String, String>,
    include_paths: &[String],
    files: &mut BTreeMap<String, FileDeps>,
    include_root: &mut Option<String>,
    file: &str,
    depth: u32,
) -> Result<(), ScanError> {
    if depth > MAX_DEPTH {
        return Err(ScanError::DepthExceeded);
    }

    if files.contains_key(file) {
        // Already parsed, or currently being parsed (cycle).
        return Ok(());
    }
    files.insert(file.to_string(), FileDeps::default());

    let bytes =
        std::fs::read(file).map_err(|_| ScanError::EmptyOrUnreadable(file.to_string()))?;
    if bytes.is_empty() {
        return Err(ScanError::EmptyOrUnreadable(file.to_string()));
    }
    let contents = match String::from_utf8(bytes) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!("file does not pass UTF-8 validation: {file}");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };

    let mut evaluator = Evaluator::new(predefined_macros, include_paths);
    let mut deps = FileDeps::default();

    for line in contents.split('\n') {
        let line = line.trim();

        let verdict = evaluator.process(line);
        if verdict != Verdict::Compile {
            if verdict == Verdict::NotUnderstood && line.starts_with("#include ") {
                tracing::warn!(
                    "ignoring #include directive in #if that is not understood: {line} ({file})"
                );
            }
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            break;
        }

        if let Some(rest) = line.strip_prefix("#include \"") {
            parse_libraries(line, &mut deps.libraries)
                .map_err(|err| while_scanning(file, err))?;

            // `x/y.hh" // comment` -> `x/y.hh`. Anything without the
            // marker is an include that only carries annotations.
            let Some(pos) = rest.find(".hh\"") else {
                continue;
            };
            let path = &rest[..pos + 3];

            if !validate::is_file_path(path) {
                return Err(ScanError::InvalidPath(path.to_string()));
            }

            let root = match include_root.clone() {
                Some(root) => root,
                None => {
                    let detected = detect_include_root(path)
                        .ok_or_else(|| ScanError::IncludeRootNotFound(path.to_string()))?;
                    tracing::debug!("include root: {detected}");
                    *include_root = Some(detected.clone());
                    detected
                }
            };

            let header = format!("{root}{path}");
            if insert_unique(&mut deps.header_files, &header) {
                parse_file(predefined_macros, include_paths, files, include_root, &header, depth + 1)
                    .map_err(|err| while_scanning(file, err))?;

                // The twin source: x/y.hh -> x/y.cc, if it exists.
                let twin = format!("{}cc", &header[..header.len() - 2]);
                if !deps.source_files.iter().any(|s| s == &twin) && is_regular(&twin) {
                    deps.source_files.push(twin.clone());
                    parse_file(predefined_macros, include_paths, files, include_root, &twin, depth + 1)
                        .map_err(|err| while_scanning(file, err))?;
                }
            }
        } else if line.starts_with("#include <") {
            // System header: collect annotations, don't follow.
            parse_libraries(line, &mut deps.libraries)
                .map_err(|err| while_scanning(file, err))?;
        } else if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        } else {
            // The first real code line ends dependency discovery.
            break;
        }
    }

    files.insert(file.to_string(), deps);
    Ok(())
}

fn while_scanning(file: &str, err: ScanError) -> ScanError {
    ScanError::While {
        file: file.to_string(),
        source: Box::new(err),
    }
}

/// Collect `[#lib:NAME]` annotations from an include line.
fn parse_libraries(line: &str, libraries: &mut Vec<String>) -> Result<(), ScanError> {
    let Some(pos) = line.find('[') else {
        return Ok(());
    };
    for word in line[pos..].split(' ') {
        if let Some(name) = word
            .strip_prefix("[#lib:")
            .and_then(|word| word.strip_suffix(']'))
        {
            if !validate::is_library(name) {
                return Err(ScanError::InvalidLibrary(name.to_string()));
            }
            insert_unique(libraries, name);
        }
    }
    Ok(())
}

/// Locate the directory the first quoted include is relative to: the
/// current directory, a parent directory, or `$HOME/project/cpp/`.
fn detect_include_root(path: &str) -> Option<String> {
    if path.starts_with('/') {
        return None;
    }

    // Current directory.
    let root = String::from("./");
    if is_regular(&format!("{root}{path}")) {
        return Some(root);
    }

    // Parent directories.
    let mut root = String::from("../");
    let mut levels = 1;
    while levels < 10 {
        if is_regular(&format!("{root}{path}")) {
            return Some(root);
        }
        root.push_str("../");
        levels += 1;
    }

    // $HOME/project/cpp/
    let home = home_dir()?;
    let root = format!("{}/project/cpp/", home.trim_end_matches('/'));
    let check = format!("{root}{path}");
    if validate::is_file_path(&check) && is_regular(&check) {
        return Some(root);
    }

    None
}

fn insert_unique(set: &mut Vec<String>, value: &str) -> bool {
    if set.iter().any(|existing| existing == value) {
        return false;
    }
    set.push(value.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ProjectFixture;

    #[test]
    fn libraries_from_annotations() {
        let mut libraries = Vec::new();
        parse_libraries(
            "#include \"x.hh\" // [#lib:z] [#lib:pthread]",
            &mut libraries,
        )
        .unwrap();
        assert_eq!(libraries, ["z", "pthread"]);

        // Repeats and unrelated bracketed words are tolerated.
        parse_libraries("#include <math.h> // [see docs] [#lib:z]", &mut libraries).unwrap();
        assert_eq!(libraries, ["z", "pthread"]);

        // A line without any '[' contributes nothing.
        parse_libraries("#include \"y.hh\"", &mut libraries).unwrap();
        assert_eq!(libraries, ["z", "pthread"]);
    }

    #[test]
    fn invalid_library_name_is_fatal() {
        let mut libraries = Vec::new();
        let err = parse_libraries("#include \"x.hh\" // [#lib:1bad]", &mut libraries)
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidLibrary(name) if name == "1bad"));
    }

    #[test]
    fn application_validation() {
        let mut scanner = DependencyScanner::new(BTreeMap::new(), Vec::new());

        scanner.add_application("sub/all.cc").unwrap();
        scanner.add_application("app.cc").unwrap();

        assert!(matches!(
            scanner.add_application("all.cc"),
            Err(ScanError::ReservedTarget(target)) if target == "all"
        ));
        assert!(matches!(
            scanner.add_application("./run.cc"),
            Err(ScanError::ReservedTarget(target)) if target == "./run"
        ));
        assert!(matches!(
            scanner.add_application("app.cpp"),
            Err(ScanError::NotASource(_))
        ));
        assert!(matches!(
            scanner.add_application("/abs/app.cc"),
            Err(ScanError::AbsolutePath(_))
        ));
        assert!(matches!(
            scanner.add_application("bad name.cc"),
            Err(ScanError::InvalidBase(_))
        ));
        assert!(matches!(
            scanner.add_application(".hidden.cc"),
            Err(ScanError::DotWithoutSlash(_))
        ));
        scanner.add_application("sub/.hidden.cc").unwrap();

        assert!(matches!(
            scanner.add_application("app.cc"),
            Err(ScanError::DuplicateApplication(_))
        ));
    }

    #[test]
    fn define_macros_from_csv() {
        let mut scanner = DependencyScanner::new(BTreeMap::new(), Vec::new());
        scanner.define_macros("").unwrap();
        scanner.define_macros("FOO,BAR_9,").unwrap();
        assert_eq!(scanner.predefined_macros.len(), 2);
        assert_eq!(scanner.predefined_macros["FOO"], "1");

        assert!(matches!(
            scanner.define_macros("NO-DEBUG"),
            Err(ScanError::InvalidMacro(_))
        ));
        assert!(matches!(
            scanner.define_macros("A,,B"),
            Err(ScanError::InvalidMacro(name)) if name.is_empty()
        ));
    }

    #[test]
    fn scans_headers_and_twin_sources() {
        let fixture = ProjectFixture::new(&[
            (
                "app.cc",
                "#include \"demo/alpha.hh\" // [#lib:z]\n\
                 #include <stdio.h>\n\
                 \n\
                 int main() { return 0; }\n",
            ),
            (
                "demo/alpha.hh",
                "#pragma once\n#include \"demo/beta.hh\"\n",
            ),
            ("demo/alpha.cc", "#include \"demo/alpha.hh\"\n"),
            ("demo/beta.hh", "#pragma once\n// [#lib:pthread] on purpose\n"),
        ]);
        let scanner = fixture.scan("app.cc");

        let app = fixture.path("app.cc");
        let sources = scanner.source_dependencies(&app);
        assert_eq!(
            sources,
            [
                fixture.path("app.cc"),
                fixture.path("demo/alpha.cc"),
            ]
        );

        let headers = scanner.header_dependencies(&app);
        assert_eq!(
            headers,
            [
                fixture.path("demo/alpha.hh"),
                fixture.path("demo/beta.hh"),
            ]
        );

        let libraries = scanner.library_dependencies(&app);
        assert_eq!(libraries, ["z"]);
    }

    #[test]
    fn code_line_stops_the_scan() {
        let fixture = ProjectFixture::new(&[(
            "app.cc",
            "#include \"demo/early.hh\"\n\
             int main() { return 0; }\n\
             #include \"demo/late.hh\"\n",
        ), (
            "demo/early.hh",
            "#pragma once\n",
        )]);
        let scanner = fixture.scan("app.cc");

        // demo/late.hh does not even exist; the scan must stop before it.
        let headers = scanner.header_dependencies(&fixture.path("app.cc"));
        assert_eq!(headers, [fixture.path("demo/early.hh")]);
    }

    #[test]
    fn include_cycles_terminate() {
        let fixture = ProjectFixture::new(&[
            ("app.cc", "#include \"demo/a.hh\"\n"),
            ("demo/a.hh", "#pragma once\n#include \"demo/b.hh\"\n"),
            ("demo/b.hh", "#pragma once\n#include \"demo/a.hh\"\n"),
        ]);
        let scanner = fixture.scan("app.cc");

        assert_eq!(scanner.files.len(), 3);

        let headers = scanner.header_dependencies(&fixture.path("app.cc"));
        assert_eq!(
            headers,
            [fixture.path("demo/a.hh"), fixture.path("demo/b.hh")]
        );

        // Closure queries must also terminate when asked from inside the
        // cycle.
        let from_a = scanner.header_dependencies(&fixture.path("demo/a.hh"));
        assert_eq!(
            from_a,
            [fixture.path("demo/b.hh"), fixture.path("demo/a.hh")]
        );
    }

    #[test]
    fn parse_recursive_is_idempotent() {
        let fixture = ProjectFixture::new(&[
            ("app.cc", "#include \"demo/a.hh\"\n"),
            ("demo/a.hh", "#pragma once\n"),
        ]);
        let mut scanner = fixture.scan("app.cc");

        let before: Vec<String> = scanner.scanned_files().map(String::from).collect();
        scanner.parse_recursive(&fixture.path("app.cc"), 0).unwrap();
        let after: Vec<String> = scanner.scanned_files().map(String::from).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn libraries_cross_the_twin_source() {
        // The library annotation sits on a header pulled in by the twin
        // source, two hops from the application.
        let fixture = ProjectFixture::new(&[
            ("app.cc", "#include \"demo/a.hh\"\n"),
            ("demo/a.hh", "#pragma once\n"),
            ("demo/a.cc", "#include \"demo/a.hh\"\n#include \"demo/b.hh\"\n"),
            ("demo/b.hh", "#pragma once\n#include <pthread.h> // [#lib:pthread]\n"),
        ]);
        let scanner = fixture.scan("app.cc");

        let app = fixture.path("app.cc");
        assert_eq!(scanner.library_dependencies(&app), ["pthread"]);
        assert_eq!(
            scanner.source_dependencies(&app),
            [fixture.path("app.cc"), fixture.path("demo/a.cc")]
        );
    }

    #[test]
    fn unreadable_and_empty_files_are_fatal() {
        let fixture = ProjectFixture::new(&[
            ("app.cc", "#include \"demo/missing.hh\"\n"),
            ("empty.cc", ""),
        ]);

        let mut scanner = DependencyScanner::new(BTreeMap::new(), Vec::new());
        scanner.seed_include_root(fixture.root());
        let err = scanner
            .parse_recursive(&fixture.path("app.cc"), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::While { ref source, .. }
                if matches!(**source, ScanError::EmptyOrUnreadable(_))
        ));

        let mut scanner = DependencyScanner::new(BTreeMap::new(), Vec::new());
        scanner.seed_include_root(fixture.root());
        let err = scanner
            .parse_recursive(&fixture.path("empty.cc"), 0)
            .unwrap_err();
        assert!(matches!(err, ScanError::EmptyOrUnreadable(_)));
    }

    #[test]
    fn not_understood_guard_skips_the_include() {
        let fixture = ProjectFixture::new(&[(
            "app.cc",
            "#if defined(FOO) && defined(BAR)\n\
             #include \"demo/guarded.hh\"\n\
             #endif\n\
             #include \"demo/plain.hh\"\n",
        ), (
            "demo/plain.hh",
            "#pragma once\n",
        )]);
        let scanner = fixture.scan("app.cc");

        // demo/guarded.hh does not exist; the not-understood guard keeps
        // the scanner from following it.
        let headers = scanner.header_dependencies(&fixture.path("app.cc"));
        assert_eq!(headers, [fixture.path("demo/plain.hh")]);
    }

    #[test]
    fn skipped_branches_are_not_followed() {
        let fixture = ProjectFixture::new(&[(
            "app.cc",
            "#if defined(ENABLE_EXTRA)\n\
             #include \"demo/extra.hh\"\n\
             #else\n\
             #include \"demo/plain.hh\"\n\
             #endif\n",
        ), (
            "demo/plain.hh",
            "#pragma once\n",
        )]);
        let scanner = fixture.scan("app.cc");

        let headers = scanner.header_dependencies(&fixture.path("app.cc"));
        assert_eq!(headers, [fixture.path("demo/plain.hh")]);
    }

    #[test]
    fn invalid_include_path_is_fatal() {
        let fixture = ProjectFixture::new(&[(
            "app.cc",
            "#include \"demo//bad.hh\"\n",
        )]);

        let mut scanner = DependencyScanner::new(BTreeMap::new(), Vec::new());
        scanner.seed_include_root(fixture.root());
        let err = scanner
            .parse_recursive(&fixture.path("app.cc"), 0)
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidPath(path) if path == "demo//bad.hh"));
    }

    #[test]
    fn absolute_include_cannot_set_the_root() {
        assert_eq!(detect_include_root("/usr/include/x.hh"), None);
    }

    #[test]
    fn depth_limit_is_fatal() {
        let fixture = ProjectFixture::new(&[("app.cc", "int main() {}\n")]);
        let mut scanner = DependencyScanner::new(BTreeMap::new(), Vec::new());
        let err = scanner
            .parse_recursive(&fixture.path("app.cc"), MAX_DEPTH + 1)
            .unwrap_err();
        assert!(matches!(err, ScanError::DepthExceeded));
    }
}
