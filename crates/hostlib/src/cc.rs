//! `Cc` host class: compiles C source files, one build step per instance so
//! repeated `.compile()` calls on the same compiler batch together.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use std::sync::Arc;

use fs_err as fs;

use engine::cookie::gen_cookie;
use engine::frugal::{frugal_flags, frugal_mtime, parse_include_deps};
use engine::pool::Pool;
use engine::queue::StepAction;
use launch::run_captured;
use script::value::{HostValue, Instance, ValueRef};
use script::{HostClass, HostError};

use crate::context::BuildContext;
use crate::convert::{expect_args, expect_str_vec, str_vec_val};

struct CcState {
    flags: Vec<String>,
}

impl HostValue for CcState {
    fn type_name(&self) -> &'static str {
        "Cc"
    }
    fn display(&self) -> String {
        "<Cc instance>".to_string()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct CompileUnit {
    flags: Vec<String>,
    src: PathBuf,
    out: PathBuf,
}

pub struct Cc {
    ctx: Arc<BuildContext>,
}

impl Cc {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }
}

impl HostClass for Cc {
    fn name(&self) -> &str {
        "Cc"
    }

    fn instantiate(&self, args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
        expect_args(args, 1, "Cc")?;
        let flags = expect_str_vec(&args[0], "Cc flags")?;
        Ok(Rc::new(CcState { flags }))
    }

    fn call(&self, instance: &Instance, method: &str, args: &[ValueRef]) -> Result<ValueRef, HostError> {
        if method != "compile" {
            return Err(HostError::Custom(format!("Cc has no method '{method}'")));
        }

        expect_args(args, 1, "Cc.compile")?;
        let srcs = expect_str_vec(&args[0], "Cc.compile sources")?;

        let state_rc = instance
            .host_state
            .borrow()
            .clone()
            .ok_or_else(|| HostError::Custom("Cc instance has no state".to_string()))?;
        let state = state_rc
            .as_any()
            .downcast_ref::<CcState>()
            .ok_or_else(|| HostError::Custom("Cc instance state has the wrong type".to_string()))?;

        let unique = Rc::as_ptr(&state_rc) as *const () as u64;
        let mut outs = Vec::with_capacity(srcs.len());

        let ctx = self.ctx.clone();
        let action: Arc<StepAction> = Arc::new(move |data| compile_step(&ctx, data));

        let mut queue = self.ctx.queue.lock().unwrap();
        for src in &srcs {
            let out = gen_cookie(&self.ctx.out_dir, src, "o");
            outs.push(out.to_string_lossy().into_owned());

            queue
                .enqueue(
                    unique,
                    "C source file compilation",
                    action.clone(),
                    Box::new(CompileUnit {
                        flags: state.flags.clone(),
                        src: PathBuf::from(src),
                        out,
                    }),
                )
                .map_err(|e| HostError::Custom(e.to_string()))?;
        }

        Ok(str_vec_val(outs))
    }
}

fn compile_step(ctx: &Arc<BuildContext>, data: &[Box<dyn Any + Send>]) -> Result<(), engine::Error> {
    let mut to_compile = Vec::new();

    for item in data {
        let unit = item.downcast_ref::<CompileUnit>().expect("Cc queue data is always CompileUnit");

        if frugal_flags(&unit.flags, &unit.out)? {
            to_compile.push(unit);
            continue;
        }

        let Ok(deps_contents) = fs::read_to_string(deps_path_of(&unit.out)) else {
            to_compile.push(unit);
            continue;
        };

        let mut deps = vec![unit.src.clone()];
        deps.extend(parse_include_deps(&deps_contents).into_iter().map(PathBuf::from));

        if frugal_mtime(&deps, &unit.out)? {
            to_compile.push(unit);
        } else {
            log::info!("{}: already compiled", unit.src.display());
            ctx.install_cookie(&unit.out.to_string_lossy())?;
        }
    }

    let pool = Pool::new(ctx.worker_count);
    let tasks: Vec<Box<dyn FnOnce() -> bool + Send>> = to_compile
        .into_iter()
        .map(|unit| {
            let ctx = ctx.clone();
            let flags = unit.flags.clone();
            let src = unit.src.clone();
            let out = unit.out.clone();
            Box::new(move || compile_one(&ctx, &flags, &src, &out)) as Box<dyn FnOnce() -> bool + Send>
        })
        .collect();

    pool.run(tasks).map_err(|_| engine::Error::Aborted)
}

fn compile_one(ctx: &BuildContext, flags: &[String], src: &Path, out: &Path) -> bool {
    log::info!("{}: compiling...", src.display());

    let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
    write_include_deps(&cc, flags, src, out);

    let mut arguments = vec![cc.clone(), "-c".to_string(), src.display().to_string(), "-o".to_string(), out.display().to_string()];
    arguments.extend(flags.iter().cloned());
    ctx.record_compile(std::env::current_dir().unwrap_or_default(), src.to_path_buf(), arguments);

    let mut cmd = Command::new(&cc);
    cmd.arg("-fdiagnostics-color=always").arg("-c").arg(src).arg("-o").arg(out);
    cmd.args(flags);

    match run_captured(&mut cmd) {
        Ok(output) if output.success() => {
            log::info!("{}: compiled", src.display());
            if let Err(e) = ctx.install_cookie(&out.to_string_lossy()) {
                log::error!("{}: install failed: {e}", out.display());
                return true;
            }
            false
        }
        Ok(output) => {
            log::error!("{}: compile failed:\n{}", src.display(), output.stderr_string());
            true
        }
        Err(e) => {
            log::error!("{}: couldn't run '{cc}': {e}", src.display());
            true
        }
    }
}

/// Runs a `-MM` preprocessor pass to capture included headers, so a later
/// build knows to recompile `src` when one of them changes even though `src`
/// itself wasn't touched.
fn write_include_deps(cc: &str, flags: &[String], src: &Path, out: &Path) {
    let mut cmd = Command::new(cc);
    cmd.arg("-fdiagnostics-color=always").arg("-MM").arg("-MT").arg("").arg(src);
    cmd.args(flags);

    let Ok(output) = run_captured(&mut cmd) else {
        log::warn!("{}: couldn't determine include dependencies; header changes won't trigger a rebuild", src.display());
        return;
    };

    if !output.success() {
        log::warn!("{}: couldn't determine include dependencies; header changes won't trigger a rebuild", src.display());
        return;
    }

    let headers: Vec<String> = output
        .stdout_string()
        .split_whitespace()
        .filter(|tok| *tok != ":" && *tok != "\\")
        .map(str::to_string)
        .collect();

    let deps_path = deps_path_of(out);
    let contents = format!("{}\n", headers.join("\n"));
    if let Err(e) = fs::write(&deps_path, contents) {
        log::warn!("{}: failed to write include deps: {e}", deps_path.display());
    }
}

fn deps_path_of(out: &Path) -> PathBuf {
    let mut s = out.as_os_str().to_os_string();
    s.push(".deps");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use script::value::new_ref;
    use script::value::Value;

    #[test]
    fn instantiate_validates_flags_are_strings() {
        let ctx = Arc::new(BuildContext::new(PathBuf::from("/tmp/out"), PathBuf::from("/tmp/prefix"), 1));
        let cc = Cc::new(ctx);

        let bad = new_ref(Value::Vec(vec![new_ref(Value::Int(1))]));
        assert!(cc.instantiate(&[bad]).is_err());

        let good = new_ref(Value::Vec(vec![new_ref(Value::Str(b"-Wall".to_vec()))]));
        assert!(cc.instantiate(&[good]).is_ok());
    }
}
