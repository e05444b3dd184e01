//! `bob dep-tree <ancestor-hash>...`: the recursive-invocation leaf of
//! dependency discovery. Never touches the build queue; only resolves and
//! prints this project's own dependency tree to stdout for the parent
//! `bob` process that invoked it to read back.

use clap::Parser;
use thiserror::Error;

use crate::cli::{common, Global};
use crate::phases::Project;

#[derive(Debug, Parser)]
#[command(about = "Print this project's dependency tree for a parent bob process")]
pub struct Command {
    #[arg(help = "Path-hashes (hex) of every ancestor already on the recursion stack")]
    ancestor_hashes: Vec<String>,
}

pub fn handle(command: Command, global: &Global) -> Result<(), Error> {
    let ancestor_hashes = command
        .ancestor_hashes
        .iter()
        .map(|h| u64::from_str_radix(h, 16).map_err(|_| Error::InvalidHash(h.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let (env, paths) = common::env_and_paths(global)?;
    let project = Project::setup(paths.clone(), env.deps_dir.clone(), common::worker_count())?;
    let specs = project.dep_specs()?;

    let bob_exe = std::env::current_exe()?;
    let builder = depgraph::TreeBuilder {
        project_dir: &paths.project_dir,
        out_dir: &paths.out_dir,
        deps_dir: &env.deps_dir,
        bob_exe: &bob_exe,
        force_rebuild: global.force_rebuild,
    };

    match builder.build(&specs, &ancestor_hashes)? {
        depgraph::TreeOutcome::Circular => print!("{}", depgraph::CIRCULAR_MARKER),
        depgraph::TreeOutcome::Tree(tree) => {
            print!("<bob-dep-tree>\n{}</bob-dep-tree>\n", depgraph::serialize::serialize(&tree));
        }
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid ancestor hash '{0}'")]
    InvalidHash(String),
    #[error(transparent)]
    Env(#[from] crate::env::Error),
    #[error(transparent)]
    Phase(#[from] crate::phases::Error),
    #[error(transparent)]
    Depgraph(#[from] depgraph::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
