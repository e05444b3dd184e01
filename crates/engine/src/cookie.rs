use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use xxhash_rust::xxh3::xxh3_64;

/// Content-addressed build artifact path: `<out>/bob/<sanitized-path>.cookie.<hash>.<ext>`.
///
/// `path` should be a project-relative identifier for whatever is being
/// built (e.g. a source file path); it is hashed to keep cookies for
/// differently-pathed inputs from colliding even after sanitization.
pub fn gen_cookie(out_dir: &Path, path: &str, ext: &str) -> PathBuf {
    let hash = xxh3_64(path.as_bytes());
    let sanitized = path.replace('/', "_");
    out_dir.join("bob").join(format!("{sanitized}.cookie.{hash:016x}.{ext}"))
}

/// Tracks cookies produced during the current run, mirroring the original
/// build's de-duplication of repeated installs of the same artifact.
#[derive(Default)]
pub struct BuiltCookies {
    seen: Mutex<HashSet<String>>,
}

impl BuiltCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_built(&self, cookie: &Path) {
        self.seen.lock().unwrap().insert(cookie.to_string_lossy().into_owned());
    }

    pub fn has_built(&self, cookie: &Path) -> bool {
        self.seen.lock().unwrap().contains(&cookie.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_slashes_and_is_deterministic() {
        let out = Path::new("/tmp/out");
        let a = gen_cookie(out, "src/foo.c", "o");
        let b = gen_cookie(out, "src/foo.c", "o");
        assert_eq!(a, b);
        assert!(!a.to_string_lossy().contains("src/foo"));
        assert!(a.to_string_lossy().contains("src_foo.c"));
    }

    #[test]
    fn distinct_paths_hash_differently() {
        let out = Path::new("/tmp/out");
        let a = gen_cookie(out, "src/foo.c", "o");
        let b = gen_cookie(out, "src/bar.c", "o");
        assert_ne!(a, b);
    }

    #[test]
    fn built_cookies_tracks_membership() {
        let built = BuiltCookies::new();
        let cookie = gen_cookie(Path::new("/tmp/out"), "src/foo.c", "o");
        assert!(!built.has_built(&cookie));
        built.mark_built(&cookie);
        assert!(built.has_built(&cookie));
    }
}
