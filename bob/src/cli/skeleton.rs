//! `bob skeleton <name> [out-dir]`: copies a prebuilt project template out of
//! the install prefix's shared data directory, refusing to overwrite an
//! existing output directory.

use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use crate::cli::Global;

#[derive(Debug, Parser)]
#[command(about = "Scaffold a new project from a named skeleton")]
pub struct Command {
    name: String,
    out_dir: Option<PathBuf>,
}

pub fn handle(command: Command, global: &Global) -> Result<(), Error> {
    let out = command.out_dir.unwrap_or_else(|| PathBuf::from(&command.name));

    if out.exists() {
        return Err(Error::OutputExists(out));
    }

    let skeleton_path = global.prefix.join("share/bob/skeletons").join(&command.name);

    if !skeleton_path.is_dir() {
        return Err(Error::UnknownSkeleton(command.name));
    }

    fs_err::create_dir_all(&out)?;
    copy_recursive(&skeleton_path, &out)?;
    Ok(())
}

fn copy_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in fs_err::read_dir(src)? {
        let entry = entry?;
        let dest_path = dest.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            fs_err::create_dir_all(&dest_path)?;
            copy_recursive(&entry.path(), &dest_path)?;
        } else {
            fs_err::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("output directory '{0}' already exists")]
    OutputExists(PathBuf),
    #[error("no skeleton named '{0}' is installed")]
    UnknownSkeleton(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
