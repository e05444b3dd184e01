use std::path::Path;

use fs_err as fs;

use crate::Error;

/// Compares `flags` against the `<out>.flags` file left by the previous
/// build, rewriting it when they differ. Returns `true` when a rebuild is
/// needed: the flags file is missing, unreadable, or doesn't match.
///
/// This check runs before any mtime comparison, since a flag change (e.g. a
/// different optimization level) must force a rebuild even if the source
/// file itself is untouched.
pub fn frugal_flags(flags: &[String], out: &Path) -> Result<bool, Error> {
    let path = flags_path(out);
    let joined = render_flags(flags);

    let previous = fs::read_to_string(&path).ok();

    match previous {
        Some(prev) if prev == joined => Ok(false),
        _ => {
            fs::write(&path, &joined)?;
            Ok(true)
        }
    }
}

fn flags_path(out: &Path) -> std::path::PathBuf {
    let mut s = out.as_os_str().to_os_string();
    s.push(".flags");
    std::path::PathBuf::from(s)
}

fn render_flags(flags: &[String]) -> String {
    let mut s = String::new();
    for flag in flags {
        s.push_str(flag);
        s.push('\n');
    }
    s
}

/// `true` if `out` is missing or any of `deps` has a newer modification
/// time than `out`.
pub fn frugal_mtime(deps: &[impl AsRef<Path>], out: &Path) -> Result<bool, Error> {
    let out_mtime = match fs::metadata(out) {
        Ok(meta) => meta.modified()?,
        Err(_) => return Ok(true),
    };

    for dep in deps {
        let dep_mtime = fs::metadata(dep.as_ref())?.modified()?;
        if dep_mtime > out_mtime {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Parses the `<out>.deps` file a compile step writes out (one include path
/// per line, already extracted from the preprocessor's Makefile-rule
/// output) into the flat list of dependency paths used by [`frugal_mtime`].
pub fn parse_include_deps(contents: &str) -> Vec<String> {
    contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn flags_rebuild_when_missing_then_stable() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("a.o");
        let flags = vec!["-O2".to_string(), "-Wall".to_string()];

        assert!(frugal_flags(&flags, &out).unwrap());
        assert!(!frugal_flags(&flags, &out).unwrap());
    }

    #[test]
    fn flags_rebuild_when_changed() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("a.o");

        assert!(frugal_flags(&["-O2".to_string()], &out).unwrap());
        assert!(frugal_flags(&["-O3".to_string()], &out).unwrap());
        assert!(!frugal_flags(&["-O3".to_string()], &out).unwrap());
    }

    #[test]
    fn mtime_rebuild_when_output_missing() {
        let dir = tempdir().unwrap();
        let dep = dir.path().join("a.c");
        fs::write(&dep, "int main() {}").unwrap();
        let out = dir.path().join("a.o");

        assert!(frugal_mtime(&[dep], &out).unwrap());
    }

    #[test]
    fn parses_one_dep_per_line() {
        let deps = parse_include_deps("a.c\n  a.h  \nb.h\n\n");
        assert_eq!(deps, vec!["a.c", "a.h", "b.h"]);
    }
}
