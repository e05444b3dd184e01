use std::path::Path;

use clap::Parser;
use thiserror::Error;

use crate::cli::{common, Global};
use crate::phases::Project;

#[derive(Debug, Parser)]
#[command(about = "Build, then install the project (and its dependencies) to the prefix")]
pub struct Command;

pub fn handle(_command: Command, global: &Global, bob_exe: &Path) -> Result<(), Error> {
    let (env, paths) = common::env_and_paths(global)?;
    let project = Project::setup(paths, env.deps_dir, common::worker_count())?;

    if !global.no_dep_rebuild {
        project.deps(bob_exe, global.force_rebuild, &[], global.assert_owner)?;
    }

    project.build()?;
    project.install()?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] crate::env::Error),
    #[error(transparent)]
    Phase(#[from] crate::phases::Error),
}
