use std::path::{Path, PathBuf};
use std::process::Command;

use fs_err as fs;
use xxhash_rust::xxh3::xxh3_64;

use crate::node::DepKind;
use crate::Error;

/// A dependency as declared in a `build.fl` script, already extracted from
/// the interpreter's value model by the caller.
#[derive(Debug, Clone)]
pub enum DepSpec {
    Local { path: String },
    Git { url: String, branch: String },
}

#[derive(Debug, Clone)]
pub struct ResolvedDep {
    pub kind: DepKind,
    pub path: PathBuf,
    pub human: String,
}

/// Realizes every dependency into `deps_dir` (symlinking local deps,
/// shallow-cloning git ones) and returns them alongside a combined hash used
/// to detect whether the dependency list itself has changed since the last
/// build.
pub fn resolve_all(specs: &[DepSpec], deps_dir: &Path) -> Result<(Vec<ResolvedDep>, u64), Error> {
    fs::create_dir_all(deps_dir)?;

    let mut resolved = Vec::with_capacity(specs.len());
    let mut combined_hash = 0u64;

    for spec in specs {
        let dep = match spec {
            DepSpec::Local { path } => resolve_local(path, deps_dir)?,
            DepSpec::Git { url, branch } => resolve_git(url, branch, deps_dir)?,
        };

        combined_hash ^= xxh3_64(dep.path.to_string_lossy().as_bytes());
        resolved.push(dep);
    }

    Ok((resolved, combined_hash))
}

/// Generates the stable cache path `bob` uses for a local or current-project
/// dependency: `<deps_dir>/<human>.<hash>.<ext>`, hashed on the
/// canonicalized absolute path so a later move of the source breaks the
/// link loudly instead of resolving to stale content.
pub fn local_cache_path(abs_path: &Path, deps_dir: &Path, ext: &str) -> PathBuf {
    let human = human_name(abs_path);
    let hash = xxh3_64(abs_path.to_string_lossy().as_bytes());
    deps_dir.join(format!("{human}.{hash:016x}.{ext}"))
}

pub fn human_name(abs_path: &Path) -> String {
    abs_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| abs_path.to_string_lossy().into_owned())
}

fn resolve_local(path: &str, deps_dir: &Path) -> Result<ResolvedDep, Error> {
    let abs_path = fs::canonicalize(path).map_err(|_| Error::LocalDepNotFound(path.to_string()))?;
    let human = human_name(&abs_path);
    let dep_path = local_cache_path(&abs_path, deps_dir, "local");

    match std::os::unix::fs::symlink(&abs_path, &dep_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(Error::Symlink(abs_path, dep_path, e)),
    }

    Ok(ResolvedDep {
        kind: DepKind::Local,
        path: dep_path,
        human,
    })
}

fn resolve_git(url: &str, branch: &str, deps_dir: &Path) -> Result<ResolvedDep, Error> {
    let url = url.trim_end_matches('/');
    let human = url.rsplit('/').next().unwrap_or(url).to_string();

    let hash = xxh3_64(url.as_bytes()) ^ xxh3_64(branch.as_bytes());
    let dep_path = deps_dir.join(format!("{human}.{hash:016x}.git"));

    if !dep_path.exists() {
        log::info!("{human}: git cloning...");

        let mut cmd = Command::new("git");
        cmd.args(["clone", url, &dep_path.to_string_lossy()])
            .args(["--depth", "1", "--branch", branch, "--recurse-submodules", "--shallow-submodules"]);

        let out = launch::run_captured(&mut cmd).map_err(|e| Error::Launch(e.to_string()))?;

        if !out.success() {
            return Err(Error::GitClone(url.to_string(), out.stderr_string()));
        }

        log::info!("{human}: git cloned");
    }

    Ok(ResolvedDep {
        kind: DepKind::Git,
        path: dep_path,
        human,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_dep_symlinks_into_cache() {
        let root = tempdir().unwrap();
        let src = root.path().join("lib");
        fs::create_dir_all(&src).unwrap();

        let deps_dir = root.path().join("deps");
        let (resolved, hash) = resolve_all(&[DepSpec::Local { path: src.to_string_lossy().into_owned() }], &deps_dir).unwrap();

        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].path.is_symlink());
        assert_ne!(hash, 0);
    }

    #[test]
    fn missing_local_dep_errors() {
        let deps_dir = tempdir().unwrap();
        let err = resolve_all(&[DepSpec::Local { path: "/no/such/path".to_string() }], deps_dir.path()).unwrap_err();
        assert!(matches!(err, Error::LocalDepNotFound(_)));
    }
}
