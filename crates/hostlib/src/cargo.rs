//! `Cargo` host class: shells out to `cargo build` for a Rust sub-project,
//! deliberately leaving the output under `target/` instead of `.bob` so it
//! doesn't confuse IDE tooling that already expects a normal cargo layout.

use std::any::Any;
use std::process::Command;
use std::rc::Rc;
use std::sync::Arc;

use engine::queue::StepAction;
use launch::run_captured;
use script::value::{HostValue, ValueRef};
use script::{HostClass, HostError};

use crate::cmd::cmd_exists;
use crate::context::BuildContext;
use crate::convert::{expect_args, str_val};

pub struct Cargo {
    ctx: Arc<BuildContext>,
}

impl Cargo {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }
}

impl HostClass for Cargo {
    fn name(&self) -> &str {
        "Cargo"
    }

    fn instantiate(&self, _args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
        Err(HostError::Custom("Cargo cannot be instantiated".to_string()))
    }

    fn call(&self, _instance: &script::value::Instance, method: &str, _args: &[ValueRef]) -> Result<ValueRef, HostError> {
        Err(HostError::Custom(format!("Cargo has no instance method '{method}'")))
    }

    fn call_function(&self, name: &str, args: &[ValueRef]) -> Result<ValueRef, HostError> {
        if name != "build" {
            return Err(HostError::Custom(format!("Cargo has no function '{name}'")));
        }

        expect_args(args, 0, "Cargo.build")?;

        if !cmd_exists("cargo") {
            return Err(HostError::Custom(
                "Cargo.build: couldn't find 'cargo' executable in PATH; Cargo is something you must install separately".to_string(),
            ));
        }

        let ctx = self.ctx.clone();
        let action: Arc<StepAction> = Arc::new(move |data| build_step(&ctx, data));

        self.ctx
            .queue
            .lock()
            .unwrap()
            .enqueue(xxhash_rust::xxh3::xxh3_64(b"Cargo"), "Cargo build", action, Box::new(()))
            .map_err(|e| HostError::Custom(e.to_string()))?;

        Ok(str_val("target/debug/"))
    }
}

fn build_step(_ctx: &Arc<BuildContext>, data: &[Box<dyn Any + Send>]) -> Result<(), engine::Error> {
    if data.len() != 1 {
        return Err(engine::Error::Step(format!(
            "Cargo.build can't be called more than once (was called {} times)",
            data.len()
        )));
    }

    log::info!("Cargo: building...");

    let mut cmd = Command::new("cargo");
    cmd.arg("build");

    let output = run_captured(&mut cmd).map_err(|e| engine::Error::Step(e.to_string()))?;

    if !output.success() {
        return Err(engine::Error::Step(format!("Cargo build failed:\n{}", output.stderr_string())));
    }

    log::info!("Cargo: built");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn build_rejects_arguments() {
        let ctx = Arc::new(BuildContext::new(PathBuf::from("/tmp/out"), PathBuf::from("/tmp/prefix"), 1));
        let cargo = Cargo::new(ctx);
        let arg = script::value::new_ref(script::value::Value::Int(1));
        assert!(cargo.call_function("build", &[arg]).is_err());
    }

    #[test]
    fn unknown_function_errors() {
        let ctx = Arc::new(BuildContext::new(PathBuf::from("/tmp/out"), PathBuf::from("/tmp/prefix"), 1));
        let cargo = Cargo::new(ctx);
        assert!(cargo.call_function("test", &[]).is_err());
    }
}
