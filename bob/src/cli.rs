use std::path::PathBuf;

use clap::{Args, Parser};
use thiserror::Error;

mod build;
mod common;
mod dep_tree;
mod install;
mod lsp;
mod package;
mod run;
mod skeleton;

#[derive(Debug, Parser)]
#[command(name = "bob", about = "Polyglot build orchestrator")]
pub struct Command {
    #[command(flatten)]
    pub global: Global,
    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(Debug, Args)]
pub struct Global {
    #[arg(short = 'C', long = "project-dir", default_value = ".", global = true, help = "Directory containing build.fl")]
    pub project_dir: PathBuf,
    #[arg(short = 'o', long = "out-dir", default_value = ".bob-out", global = true, help = "Directory to store build output in")]
    pub out_dir: PathBuf,
    #[arg(short = 'p', long = "prefix", default_value = "/usr/local", global = true, help = "Install prefix")]
    pub prefix: PathBuf,
    #[arg(short = 'D', long = "no-dep-rebuild", global = true, help = "Don't rebuild dependencies, only the root project")]
    pub no_dep_rebuild: bool,
    #[arg(short = 'f', long = "force", global = true, help = "Force a rebuild of every dependency, ignoring caches")]
    pub force_rebuild: bool,
    #[arg(short = 'O', long = "assert-owner", global = true, help = "Assert ownership of the install prefix")]
    pub assert_owner: bool,
    #[arg(long, global = true, help = "Override where bob caches resolved dependencies")]
    pub deps_path: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Verbose diagnostic logging")]
    pub verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Build(build::Command),
    Lsp(lsp::Command),
    Run(run::Command),
    Install(install::Command),
    Skeleton(skeleton::Command),
    Package(package::Command),
    #[command(name = "dep-tree")]
    DepTree(dep_tree::Command),
}

pub fn process() -> Result<(), Error> {
    let Command { global, subcommand } = Command::parse();

    crate::logging::init(global.verbose);

    let bob_exe = std::env::current_exe()?;

    match subcommand {
        Subcommand::Build(command) => build::handle(command, &global, &bob_exe)?,
        Subcommand::Lsp(command) => lsp::handle(command, &global, &bob_exe)?,
        Subcommand::Run(command) => run::handle(command, &global, &bob_exe)?,
        Subcommand::Install(command) => install::handle(command, &global, &bob_exe)?,
        Subcommand::Skeleton(command) => skeleton::handle(command, &global)?,
        Subcommand::Package(command) => package::handle(command, &global, &bob_exe)?,
        Subcommand::DepTree(command) => dep_tree::handle(command, &global)?,
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("build")]
    Build(#[from] build::Error),
    #[error("lsp")]
    Lsp(#[from] lsp::Error),
    #[error("run")]
    Run(#[from] run::Error),
    #[error("install")]
    Install(#[from] install::Error),
    #[error("skeleton")]
    Skeleton(#[from] skeleton::Error),
    #[error("package")]
    Package(#[from] package::Error),
    #[error("dep-tree")]
    DepTree(#[from] dep_tree::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
