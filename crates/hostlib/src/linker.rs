//! `Linker` host class: links or archives a set of object files. Every
//! `.link()`/`.archive()` call gets its own build step, since two calls
//! producing different output hashes should never be merged.

use std::any::Any;
use std::path::PathBuf;
use std::process::Command;
use std::rc::Rc;
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use engine::frugal::{frugal_flags, frugal_mtime};
use engine::queue::StepAction;
use launch::run_captured;
use script::value::{HostValue, Instance, ValueRef};
use script::{HostClass, HostError};

use crate::context::BuildContext;
use crate::convert::{expect_args, expect_str_vec, str_val};

struct LinkerState {
    flags: Vec<String>,
}

impl HostValue for LinkerState {
    fn type_name(&self) -> &'static str {
        "Linker"
    }
    fn display(&self) -> String {
        "<Linker instance>".to_string()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct LinkUnit {
    flags: Vec<String>,
    archive: bool,
    srcs: Vec<PathBuf>,
    out: PathBuf,
}

pub struct Linker {
    ctx: Arc<BuildContext>,
}

impl Linker {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }

    fn prep(&self, state: &LinkerState, args: &[ValueRef], archive: bool) -> Result<ValueRef, HostError> {
        let what = if archive { "Linker.archive" } else { "Linker.link" };
        expect_args(args, 1, what)?;
        let srcs = expect_str_vec(&args[0], what)?;

        let total_hash = srcs.iter().fold(0u64, |acc, s| acc ^ xxh3_64(s.as_bytes()));
        let ext = if archive { "a" } else { "l" };
        let infinitive = if archive { "archive" } else { "link" };
        let out = self
            .ctx
            .bob_out_dir()
            .join(format!("linker.{infinitive}.cookie.{total_hash:016x}.{ext}"));

        let unit = LinkUnit {
            flags: state.flags.clone(),
            archive,
            srcs: srcs.into_iter().map(PathBuf::from).collect(),
            out: out.clone(),
        };

        let ctx = self.ctx.clone();
        let action: Arc<StepAction> = Arc::new(move |data| link_step(&ctx, data));

        self.ctx
            .queue
            .lock()
            .unwrap()
            .enqueue(self.ctx.fresh_unique(), "Linking", action, Box::new(unit))
            .map_err(|e| HostError::Custom(e.to_string()))?;

        Ok(str_val(out.to_string_lossy().into_owned()))
    }
}

impl HostClass for Linker {
    fn name(&self) -> &str {
        "Linker"
    }

    fn instantiate(&self, args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
        expect_args(args, 1, "Linker")?;
        let flags = expect_str_vec(&args[0], "Linker flags")?;
        Ok(Rc::new(LinkerState { flags }))
    }

    fn call(&self, instance: &Instance, method: &str, args: &[ValueRef]) -> Result<ValueRef, HostError> {
        let state_rc = instance
            .host_state
            .borrow()
            .clone()
            .ok_or_else(|| HostError::Custom("Linker instance has no state".to_string()))?;
        let state = state_rc
            .as_any()
            .downcast_ref::<LinkerState>()
            .ok_or_else(|| HostError::Custom("Linker instance state has the wrong type".to_string()))?;

        match method {
            "link" => self.prep(state, args, false),
            "archive" => self.prep(state, args, true),
            other => Err(HostError::Custom(format!("Linker has no method '{other}'"))),
        }
    }
}

fn link_step(ctx: &Arc<BuildContext>, data: &[Box<dyn Any + Send>]) -> Result<(), engine::Error> {
    assert_eq!(data.len(), 1, "a link/archive build step is never merged with another");
    let unit = data[0].downcast_ref::<LinkUnit>().expect("Linker queue data is always LinkUnit");

    if !frugal_flags(&unit.flags, &unit.out)? {
        // Re-link if a statically linked dependency's cookie was rebuilt
        // this run, even though the flag text referencing it is unchanged.
        let deps_rebuilt = unit.flags.iter().any(|f| ctx.has_built_cookie(f));

        if !deps_rebuilt && !frugal_mtime(&unit.srcs, &unit.out)? {
            log::info!("{}: already {}", unit.out.display(), past(unit.archive));
            return ctx.install_cookie(&unit.out.to_string_lossy());
        }
    }

    if let Some(parent) = unit.out.parent() {
        fs_err::create_dir_all(parent)?;
    }

    let mut cmd = if unit.archive {
        let ar = std::env::var("AR").unwrap_or_else(|_| "ar".to_string());
        let mut cmd = Command::new(ar);
        cmd.arg("-rcs").arg(&unit.out);
        cmd
    } else {
        let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
        let mut cmd = Command::new(cc);
        cmd.arg("-fdiagnostics-color=always").arg("-o").arg(&unit.out);
        cmd.arg(format!("-L{}/lib", ctx.install_prefix.display()));
        if cfg!(target_os = "macos") {
            cmd.arg("-rpath").arg("@loader_path/..");
        }
        cmd
    };

    cmd.args(&unit.srcs);
    cmd.args(&unit.flags);

    log::info!("{}...", present(unit.archive));
    let output = run_captured(&mut cmd).map_err(|e| engine::Error::Step(e.to_string()))?;

    if !output.success() {
        return Err(engine::Error::Step(format!(
            "{} failed:\n{}",
            infinitive(unit.archive),
            output.stderr_string()
        )));
    }

    log::info!("{}: {}", unit.out.display(), past(unit.archive));
    ctx.install_cookie(&unit.out.to_string_lossy())
}

fn present(archive: bool) -> &'static str {
    if archive {
        "Archiving"
    } else {
        "Linking"
    }
}

fn infinitive(archive: bool) -> &'static str {
    if archive {
        "archive"
    } else {
        "link"
    }
}

fn past(archive: bool) -> &'static str {
    if archive {
        "archived"
    } else {
        "linked"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use script::value::{new_ref, Value};

    #[test]
    fn link_and_archive_hash_to_different_cookies() {
        let ctx = Arc::new(BuildContext::new(PathBuf::from("/tmp/out"), PathBuf::from("/tmp/prefix"), 1));
        let linker = Linker::new(ctx);

        let flags = new_ref(Value::Vec(vec![]));
        let state_rc = linker.instantiate(&[flags]).unwrap();
        let state = state_rc.as_any().downcast_ref::<LinkerState>().unwrap();

        let srcs = new_ref(Value::Vec(vec![new_ref(Value::Str(b"a.o".to_vec()))]));
        let link_out = linker.prep(state, &[srcs.clone()], false).unwrap();
        let archive_out = linker.prep(state, &[srcs], true).unwrap();

        assert_ne!(link_out.borrow().render(), archive_out.borrow().render());
    }
}
