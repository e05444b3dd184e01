//! Resolves `import` statements for a running `build.fl`.
//!
//! A non-relative `import bob` never touches the filesystem: it resolves to
//! a small built-in source snippet that declares every host class this
//! binary registers and sets the marker variable `setup` checks for
//! afterwards. Any other import is resolved relative to the project
//! directory, alongside the file that imported it.

use std::path::PathBuf;

use script::ImportResolver;

/// Declares every class `crates/hostlib::register_all` registers, so a
/// script that writes `import bob` gets them all in scope without needing
/// to know which ones exist ahead of time.
const BOB_PRELUDE: &str = r#"
external class Cc
external class Linker
external class Go
external class Cargo
external class Fs
external class Platform
external class PkgConfig
external class Dep
var __bob_has_been_imported__ = true
"#;

pub struct FsResolver {
    project_dir: PathBuf,
}

impl FsResolver {
    pub fn new(project_dir: PathBuf) -> Self {
        Self { project_dir }
    }
}

impl ImportResolver for FsResolver {
    fn resolve(&self, path: &[String], relative: bool) -> Result<String, String> {
        if !relative && path == ["bob"] {
            return Ok(BOB_PRELUDE.to_string());
        }

        let mut full = self.project_dir.clone();
        for bit in path {
            full.push(bit);
        }
        full.set_extension("fl");

        fs_err::read_to_string(&full).map_err(|e| format!("failed to import '{}': {e}", full.display()))
    }
}

/// The marker variable a successfully imported `bob` prelude leaves behind.
pub const BOB_IMPORTED_MARKER: &str = "__bob_has_been_imported__";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bob_import_does_not_touch_disk() {
        let resolver = FsResolver::new(PathBuf::from("/does/not/exist"));
        let src = resolver.resolve(&["bob".to_string()], false).unwrap();
        assert!(src.contains(BOB_IMPORTED_MARKER));
        assert!(src.contains("external class Dep"));
    }

    #[test]
    fn relative_import_reads_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("helpers.fl"), "var x = 1\n").unwrap();

        let resolver = FsResolver::new(dir.path().to_path_buf());
        let src = resolver.resolve(&["helpers".to_string()], true).unwrap();
        assert_eq!(src, "var x = 1\n");
    }
}
