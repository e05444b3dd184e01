use std::path::Path;

use clap::Parser;
use thiserror::Error;

use crate::cli::{common, Global};
use crate::phases::Project;

#[derive(Debug, Parser)]
#[command(about = "Build, install, then run the project's 'run' vector", trailing_var_arg = true)]
pub struct Command {
    args: Vec<String>,
}

pub fn handle(command: Command, global: &Global, bob_exe: &Path) -> Result<(), Error> {
    let (env, paths) = common::env_and_paths(global)?;
    let out_dir = paths.out_dir.clone();
    let project = Project::setup(paths, env.deps_dir, common::worker_count())?;

    if !global.no_dep_rebuild {
        project.deps(bob_exe, global.force_rebuild, &[], global.assert_owner)?;
    }

    let result = project.build().and_then(|()| project.install());
    crate::ownership::fix_out_path_owner(&out_dir);
    result?;

    let code = project.run(&command.args)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] crate::env::Error),
    #[error(transparent)]
    Phase(#[from] crate::phases::Error),
}
