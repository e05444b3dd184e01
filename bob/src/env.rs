//! Process-wide configuration resolved once at startup: the dependency
//! cache root and toolchain overrides read from the environment, split
//! between a root-owned system cache and a per-user one when no explicit
//! override is given.

use std::path::PathBuf;

use thiserror::Error;

pub struct Env {
    pub deps_dir: PathBuf,
    pub cc: Option<String>,
    pub ar: Option<String>,
}

impl Env {
    pub fn new(deps_path_override: Option<PathBuf>) -> Result<Self, Error> {
        let is_root = is_root();

        let deps_dir = match deps_path_override.or_else(|| std::env::var_os("BOB_DEPS_PATH").map(PathBuf::from)) {
            Some(dir) => dir,
            None if is_root => PathBuf::from("/var/cache/bob"),
            None => dirs::cache_dir().ok_or(Error::UserCache)?.join("bob"),
        };

        fs_err::create_dir_all(&deps_dir)?;

        Ok(Self {
            deps_dir,
            cc: std::env::var("CC").ok(),
            ar: std::env::var("AR").ok(),
        })
    }
}

fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find a cache dir to store dependencies in; set BOB_DEPS_PATH or $XDG_CACHE_HOME/$HOME")]
    UserCache,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
