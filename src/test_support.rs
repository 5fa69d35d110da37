//! Test fixtures shared by the scanner and emitter tests.

use std::collections::BTreeMap;
use std::fs;

use tempfile::TempDir;

use crate::scan::DependencyScanner;

/// A scratch C++ project rooted in a temporary directory.
///
/// Scanning runs with an absolute include root into the directory, so the
/// tests never depend on the process working directory.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
        ProjectFixture { dir }
    }

    /// The include root: the fixture directory with a trailing `/`.
    pub fn root(&self) -> String {
        format!("{}/", self.dir.path().display())
    }

    /// Absolute path of a fixture file.
    pub fn path(&self, name: &str) -> String {
        format!("{}{}", self.root(), name)
    }

    /// Scan `application` with an empty preprocessor environment and
    /// register it, returning the populated scanner.
    pub fn scan(&self, application: &str) -> DependencyScanner {
        let mut scanner = DependencyScanner::new(BTreeMap::new(), Vec::new());
        scanner.seed_include_root(self.root());
        scanner.seed_application(self.path(application));
        scanner
            .parse_recursive(&self.path(application), 0)
            .unwrap();
        scanner
    }
}
