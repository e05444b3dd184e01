//! `bob lsp`: builds the project the same way `bob build` does, but records
//! every compiler invocation along the way and emits it as a
//! `compile_commands.json` a language server can pick up.

use std::path::Path;

use clap::Parser;
use thiserror::Error;

use crate::cli::{common, Global};
use crate::phases::Project;

#[derive(Debug, Parser)]
#[command(about = "Build and emit a compile_commands.json for editor tooling")]
pub struct Command;

pub fn handle(_command: Command, global: &Global, bob_exe: &Path) -> Result<(), Error> {
    let (env, paths) = common::env_and_paths(global)?;
    let out_dir = paths.out_dir.clone();
    let project = Project::setup(paths, env.deps_dir, common::worker_count())?;

    if !global.no_dep_rebuild {
        project.deps(bob_exe, global.force_rebuild, &[], global.assert_owner)?;
    }

    let records_result = project.build_with_compile_db();
    crate::ownership::fix_out_path_owner(&out_dir);
    let records = records_result?;

    let entries: Vec<_> = records
        .iter()
        .map(|r| {
            format!(
                "{{\"directory\":{},\"file\":{},\"arguments\":[{}]}}",
                json_string(&r.directory.display().to_string()),
                json_string(&r.file.display().to_string()),
                r.arguments.iter().map(|a| json_string(a)).collect::<Vec<_>>().join(",")
            )
        })
        .collect();

    let json = format!("[{}]\n", entries.join(","));
    fs_err::write(out_dir.join("compile_commands.json"), json)?;
    Ok(())
}

fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] crate::env::Error),
    #[error(transparent)]
    Phase(#[from] crate::phases::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
