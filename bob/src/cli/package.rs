//! `bob package <format> [name] [out-file]`: builds and installs into a
//! private staging prefix, then hands the staged tree to the system `tar`
//! to produce an archive.

use std::path::Path;

use clap::Parser;
use thiserror::Error;

use crate::cli::{common, Global};
use crate::phases::{Paths, Project};

#[derive(Debug, Parser)]
#[command(about = "Build, install into a staging tree, and archive the result")]
pub struct Command {
    #[arg(help = "Archive format; currently only 'tar.gz' is supported")]
    format: String,
    name: Option<String>,
    out_file: Option<String>,
}

pub fn handle(command: Command, global: &Global, bob_exe: &Path) -> Result<(), Error> {
    if command.format != "tar.gz" && command.format != "tgz" {
        return Err(Error::UnsupportedFormat(command.format));
    }

    let (env, paths) = common::env_and_paths(global)?;
    let name = command.name.unwrap_or_else(|| "default".to_string());
    let out_file = command.out_file.unwrap_or_else(|| format!("{name}.tar.gz"));

    let out_dir = paths.out_dir.clone();
    let stage_dir = out_dir.join("bob").join("package-stage");
    fs_err::create_dir_all(&stage_dir)?;

    let project = Project::setup(
        Paths { project_dir: paths.project_dir, out_dir: paths.out_dir, prefix: stage_dir.clone() },
        env.deps_dir,
        common::worker_count(),
    )?;

    if !global.no_dep_rebuild {
        project.deps(bob_exe, global.force_rebuild, &[], global.assert_owner)?;
    }

    let result = project.build().and_then(|()| project.install());
    crate::ownership::fix_out_path_owner(&out_dir);
    result?;

    let mut cmd = std::process::Command::new("tar");
    cmd.arg("-czf").arg(&out_file).arg("-C").arg(&stage_dir).arg(".");

    let output = launch::run_captured(&mut cmd)?;
    if !output.success() {
        return Err(Error::TarFailed(output.stderr_string()));
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported package format '{0}'; only 'tar.gz' is supported")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Env(#[from] crate::env::Error),
    #[error(transparent)]
    Phase(#[from] crate::phases::Error),
    #[error(transparent)]
    Launch(#[from] launch::Error),
    #[error("tar failed: {0}")]
    TarFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
