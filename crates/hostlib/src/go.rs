//! `Go` host class: builds a Go project with `go build`, wiring the
//! project's include/library paths into `CGO_CFLAGS`/`CGO_LDFLAGS` so cgo
//! can see headers and libraries bob already installed.

use std::any::Any;
use std::path::PathBuf;
use std::process::Command;
use std::rc::Rc;
use std::sync::Arc;

use engine::queue::StepAction;
use launch::run_captured;
use script::value::{HostValue, ValueRef};
use script::{HostClass, HostError};

use crate::cmd::cmd_exists;
use crate::context::BuildContext;
use crate::convert::{expect_args, expect_str_vec, str_val};

struct BuildUnit {
    flags: Vec<String>,
    out: PathBuf,
}

pub struct Go {
    ctx: Arc<BuildContext>,
}

impl Go {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }
}

impl HostClass for Go {
    fn name(&self) -> &str {
        "Go"
    }

    fn instantiate(&self, _args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
        Err(HostError::Custom("Go cannot be instantiated".to_string()))
    }

    fn call(&self, _instance: &script::value::Instance, method: &str, _args: &[ValueRef]) -> Result<ValueRef, HostError> {
        Err(HostError::Custom(format!("Go has no instance method '{method}'")))
    }

    fn call_function(&self, name: &str, args: &[ValueRef]) -> Result<ValueRef, HostError> {
        if name != "build" {
            return Err(HostError::Custom(format!("Go has no function '{name}'")));
        }

        expect_args(args, 1, "Go.build")?;
        let flags = expect_str_vec(&args[0], "Go.build flags")?;

        if !cmd_exists("go") {
            return Err(HostError::Custom(
                "Go.build: couldn't find 'go' executable in PATH; Go is something you must install separately".to_string(),
            ));
        }

        let out = self.ctx.bob_out_dir().join("go.build.cookie.exe");

        let ctx = self.ctx.clone();
        let action: Arc<StepAction> = Arc::new(move |data| build_step(&ctx, data));

        self.ctx
            .queue
            .lock()
            .unwrap()
            .enqueue(
                xxhash_rust::xxh3::xxh3_64(b"Go"),
                "Go build",
                action,
                Box::new(BuildUnit { flags, out: out.clone() }),
            )
            .map_err(|e| HostError::Custom(e.to_string()))?;

        Ok(str_val(out.to_string_lossy().into_owned()))
    }
}

fn build_step(ctx: &Arc<BuildContext>, data: &[Box<dyn Any + Send>]) -> Result<(), engine::Error> {
    if data.len() != 1 {
        return Err(engine::Error::Step(format!(
            "Go.build can't be called more than once (was called {} times)",
            data.len()
        )));
    }

    let unit = data[0].downcast_ref::<BuildUnit>().expect("Go queue data is always BuildUnit");

    set_cgo_env("CGO_CFLAGS", "-I", "include", &ctx.install_prefix);
    set_cgo_env("CGO_LDFLAGS", "-L", "lib", &ctx.install_prefix);

    log::info!("Go: building...");

    if let Some(parent) = unit.out.parent() {
        fs_err::create_dir_all(parent)?;
    }

    let mut cmd = Command::new("go");
    cmd.arg("build").arg("-o").arg(&unit.out);
    cmd.args(&unit.flags);

    let output = run_captured(&mut cmd).map_err(|e| engine::Error::Step(e.to_string()))?;

    if !output.success() {
        return Err(engine::Error::Step(format!("Go build failed:\n{}", output.stderr_string())));
    }

    log::info!("Go: built");
    ctx.install_cookie(&unit.out.to_string_lossy())
}

fn set_cgo_env(key: &str, flag: &str, subdir: &str, prefix: &std::path::Path) {
    let existing = std::env::var(key).unwrap_or_default();
    let addition = format!("{flag}{}/{subdir}", prefix.display());
    let joined = if existing.is_empty() {
        addition
    } else {
        format!("{existing} {addition}")
    };
    std::env::set_var(key, joined);
}

#[cfg(test)]
mod tests {
    use super::*;
    use script::value::{new_ref, Value};

    #[test]
    fn build_requires_one_argument() {
        let ctx = Arc::new(BuildContext::new(PathBuf::from("/tmp/out"), PathBuf::from("/tmp/prefix"), 1));
        let go = Go::new(ctx);
        assert!(go.call_function("build", &[]).is_err());
    }

    #[test]
    fn unknown_function_errors() {
        let ctx = Arc::new(BuildContext::new(PathBuf::from("/tmp/out"), PathBuf::from("/tmp/prefix"), 1));
        let go = Go::new(ctx);
        let flags = new_ref(Value::Vec(vec![]));
        assert!(go.call_function("test", &[flags]).is_err());
    }
}
