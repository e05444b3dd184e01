//! Shared setup every subcommand needs: resolving the deps cache + toolchain
//! overrides from the environment and turning `Global` into the paths
//! `Project::setup` wants.

use crate::cli::Global;
use crate::env::Env;
use crate::phases::Paths;

pub fn env_and_paths(global: &Global) -> Result<(Env, Paths), crate::env::Error> {
    let env = Env::new(global.deps_path.clone())?;

    if let Some(cc) = &env.cc {
        std::env::set_var("CC", cc);
    }
    if let Some(ar) = &env.ar {
        std::env::set_var("AR", ar);
    }

    let paths = Paths {
        project_dir: global.project_dir.clone(),
        out_dir: global.out_dir.clone(),
        prefix: global.prefix.clone(),
    };

    Ok((env, paths))
}

pub fn worker_count() -> usize {
    std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
}
