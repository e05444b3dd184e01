use std::path::Path;

use clap::Parser;
use thiserror::Error;

use crate::cli::{common, Global};
use crate::phases::Project;

#[derive(Debug, Parser)]
#[command(about = "Build the project and its dependencies")]
pub struct Command;

pub fn handle(_command: Command, global: &Global, bob_exe: &Path) -> Result<(), Error> {
    let (env, paths) = common::env_and_paths(global)?;
    let out_dir = paths.out_dir.clone();
    let project = Project::setup(paths, env.deps_dir, common::worker_count())?;

    if !global.no_dep_rebuild {
        project.deps(bob_exe, global.force_rebuild, &[], global.assert_owner)?;
    }

    let result = project.build();
    crate::ownership::fix_out_path_owner(&out_dir);
    result?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] crate::env::Error),
    #[error(transparent)]
    Phase(#[from] crate::phases::Error),
}
