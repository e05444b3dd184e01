use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use engine::cookie::BuiltCookies;
use engine::install::InstallMap;
use engine::queue::BuildStepQueue;

/// One entry of a compile database, recorded only while `lsp` mode has
/// switched recording on.
#[derive(Debug, Clone)]
pub struct CompileCommandRecord {
    pub directory: PathBuf,
    pub file: PathBuf,
    pub arguments: Vec<String>,
}

/// Shared state every host class reaches through: the output directory
/// layout, the deferred build-step queue, the set of cookies already built
/// this run, and the install map once the top-level script has declared it.
///
/// One `BuildContext` is created per `bob` invocation and handed to every
/// host class registered for that run.
pub struct BuildContext {
    pub out_dir: PathBuf,
    pub install_prefix: PathBuf,
    pub worker_count: usize,
    pub queue: Mutex<BuildStepQueue>,
    pub built: BuiltCookies,
    install_map: RwLock<Option<InstallMap>>,
    unique_counter: AtomicU64,
    record_compile_db: AtomicBool,
    compile_db: Mutex<Vec<CompileCommandRecord>>,
}

impl BuildContext {
    pub fn new(out_dir: PathBuf, install_prefix: PathBuf, worker_count: usize) -> Self {
        Self {
            out_dir,
            install_prefix,
            worker_count,
            queue: Mutex::new(BuildStepQueue::new()),
            built: BuiltCookies::new(),
            install_map: RwLock::new(None),
            unique_counter: AtomicU64::new(1),
            record_compile_db: AtomicBool::new(false),
            compile_db: Mutex::new(Vec::new()),
        }
    }

    /// Switches on compile-command recording for `lsp`. Cheap no-op reads
    /// everywhere else, so hot paths like `Cc.compile` don't pay for it.
    pub fn enable_compile_db(&self) {
        self.record_compile_db.store(true, Ordering::Relaxed);
    }

    pub fn record_compile(&self, directory: PathBuf, file: PathBuf, arguments: Vec<String>) {
        if self.record_compile_db.load(Ordering::Relaxed) {
            self.compile_db.lock().unwrap().push(CompileCommandRecord { directory, file, arguments });
        }
    }

    pub fn take_compile_db(&self) -> Vec<CompileCommandRecord> {
        std::mem::take(&mut self.compile_db.lock().unwrap())
    }

    pub fn bob_out_dir(&self) -> PathBuf {
        self.out_dir.join("bob")
    }

    /// A key guaranteed not to collide with any other build step's `unique`
    /// key in this run, for steps that must never merge with one another
    /// (e.g. a link/archive step, where the output hash already makes each
    /// invocation distinct).
    pub fn fresh_unique(&self) -> u64 {
        self.unique_counter.fetch_add(1, Ordering::Relaxed)
    }

    pub fn set_install_map(&self, map: Option<InstallMap>) {
        *self.install_map.write().unwrap() = map;
    }

    /// Installs `cookie` immediately if it appears in the install map,
    /// mirroring a build step handing its freshly built artifact straight to
    /// the install phase instead of waiting for a separate pass over
    /// everything once the build finishes.
    pub fn install_cookie(&self, cookie: &str) -> Result<(), engine::Error> {
        self.built.mark_built(Path::new(cookie));

        let guard = self.install_map.read().unwrap();
        if let Some(map) = guard.as_ref() {
            engine::install::install_cookie(map, cookie, &self.install_prefix)?;
        }
        Ok(())
    }

    pub fn has_built_cookie(&self, path: &str) -> bool {
        self.built.has_built(Path::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use script::value::{new_ref, MapValue, Value};

    #[test]
    fn install_cookie_no_op_without_map() {
        let ctx = BuildContext::new(PathBuf::from("/tmp/out"), PathBuf::from("/tmp/prefix"), 1);
        ctx.install_cookie("/tmp/out/bob/foo.cookie.1.o").unwrap();
        assert!(ctx.has_built_cookie("/tmp/out/bob/foo.cookie.1.o"));
    }

    #[test]
    fn install_map_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("out.bin");
        fs_err::write(&src, b"hi").unwrap();

        let mut m = MapValue::new();
        m.insert(
            format!("\"{}\"", src.to_str().unwrap()),
            new_ref(Value::Str(src.to_string_lossy().into_owned().into_bytes())),
            new_ref(Value::Str(b"bin/out".to_vec())),
        );

        let map = InstallMap::from_value(Some(&Value::Map(m))).unwrap().unwrap();
        let prefix = dir.path().join("prefix");
        fs_err::create_dir_all(&prefix).unwrap();

        let ctx = BuildContext::new(dir.path().join("out"), prefix.clone(), 1);
        ctx.set_install_map(Some(map));
        ctx.install_cookie(src.to_str().unwrap()).unwrap();

        assert_eq!(fs_err::read_to_string(prefix.join("bin/out")).unwrap(), "hi");
    }
}
