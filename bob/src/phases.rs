//! The build phase state machine: IDENTIFY, SETUP, DEPS, BUILD, INSTALL, RUN.
//!
//! Each phase is a method on [`Project`] and is meant to be called in order;
//! a failure at any phase is fatal and short-circuits the rest.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use hostlib::BuildContext;
use script::value::Value;
use script::{HostRegistry, Interpreter};
use thiserror::Error;

use crate::resolver::{FsResolver, BOB_IMPORTED_MARKER};

pub const BUILD_FILE: &str = "build.fl";

/// The paths a single `bob` invocation operates over.
#[derive(Clone)]
pub struct Paths {
    pub project_dir: PathBuf,
    pub out_dir: PathBuf,
    pub prefix: PathBuf,
}

/// A project whose `build.fl` has been parsed and run; ready to move through
/// the later phases in order.
pub struct Project {
    paths: Paths,
    deps_dir: PathBuf,
    ctx: Arc<BuildContext>,
    interp: Interpreter,
}

impl Project {
    /// IDENTIFY: the only check the original tool made before doing anything
    /// else was that a build script actually exists.
    pub fn identify(project_dir: &Path) -> Result<(), Error> {
        if !project_dir.join(BUILD_FILE).is_file() {
            return Err(Error::MissingBuildFile(project_dir.join(BUILD_FILE)));
        }
        Ok(())
    }

    /// SETUP: parses and runs `build.fl`, registering every host class first
    /// so the script can declare them via `import bob`.
    pub fn setup(paths: Paths, deps_dir: PathBuf, worker_count: usize) -> Result<Self, Error> {
        Self::identify(&paths.project_dir)?;

        fs_err::create_dir_all(paths.out_dir.join("bob"))?;

        let src = fs_err::read_to_string(paths.project_dir.join(BUILD_FILE))?;
        let program = script::parser::parse(&src)?;

        let ctx = Arc::new(BuildContext::new(paths.out_dir.clone(), paths.prefix.clone(), worker_count));

        let mut registry = HostRegistry::new();
        hostlib::register_all(&mut registry, ctx.clone());

        let resolver = Rc::new(FsResolver::new(paths.project_dir.clone()));
        let mut interp = Interpreter::new(registry).with_resolver(resolver);
        interp.run(&program)?;

        if interp.env().get(BOB_IMPORTED_MARKER).is_none() {
            return Err(Error::MissingBobImport);
        }

        Ok(Self { paths, deps_dir, ctx, interp })
    }

    /// DEPS: resolves the `deps` vector into a dependency tree (recursing
    /// into `bob_exe` for each one), then builds and installs every
    /// dependency batch before the root project's own build steps run.
    pub fn deps(&self, bob_exe: &Path, force_rebuild: bool, ancestor_hashes: &[u64], assert_owner: bool) -> Result<(), Error> {
        let specs = self.dep_specs()?;
        if specs.is_empty() {
            return Ok(());
        }

        let builder = depgraph::TreeBuilder {
            project_dir: &self.paths.project_dir,
            out_dir: &self.paths.out_dir,
            deps_dir: &self.deps_dir,
            bob_exe,
            force_rebuild,
        };

        match builder.build(&specs, ancestor_hashes)? {
            depgraph::TreeOutcome::Circular => Err(Error::CircularDeps),
            depgraph::TreeOutcome::Tree(tree) => {
                for batch in depgraph::graph::build_order(&tree) {
                    self.build_batch(&batch, bob_exe, assert_owner)?;
                }
                Ok(())
            }
        }
    }

    fn build_batch(&self, batch: &[depgraph::graph::BuildUnit], bob_exe: &Path, assert_owner: bool) -> Result<(), Error> {
        let pool = engine::pool::Pool::new(self.ctx.worker_count);
        let prefix = self.paths.prefix.clone();

        let tasks: Vec<Box<dyn FnOnce() -> bool + Send>> = batch
            .iter()
            .map(|unit| {
                let bob_exe = bob_exe.to_path_buf();
                let build_path = unit.build_path.clone();
                let human = unit.human.clone();
                let prefix = prefix.clone();
                Box::new(move || {
                    log::info!("{human}: building");

                    let mut cmd = std::process::Command::new(&bob_exe);
                    cmd.arg("-D").arg("-p").arg(&prefix).arg("-C").arg(&build_path);
                    if assert_owner {
                        cmd.arg("-O");
                    }
                    cmd.arg("install");

                    match launch::run_captured(&mut cmd) {
                        Ok(output) if output.success() => false,
                        Ok(output) => {
                            log::error!("{human}: dependency build failed:\n{}", output.stderr_string());
                            true
                        }
                        Err(e) => {
                            log::error!("{human}: couldn't run '{}': {e}", bob_exe.display());
                            true
                        }
                    }
                }) as Box<dyn FnOnce() -> bool + Send>
            })
            .collect();

        pool.run(tasks).map_err(|_| Error::DepBuildAborted)
    }

    pub fn dep_specs(&self) -> Result<Vec<depgraph::DepSpec>, Error> {
        let Some(deps_val) = self.interp.env().get("deps") else {
            return Ok(Vec::new());
        };

        let borrowed = deps_val.borrow();
        let Value::Vec(items) = &*borrowed else {
            return Err(Error::DepsNotVector(borrowed.type_name()));
        };

        let mut specs = Vec::with_capacity(items.len());
        for item in items {
            let item_borrow = item.borrow();
            let Value::Instance(inst) = &*item_borrow else {
                return Err(Error::DepsElementNotDep(item_borrow.type_name().to_string()));
            };
            if inst.class.name != "Dep" {
                return Err(Error::DepsElementNotDep(inst.class.name.clone()));
            }
            let spec = hostlib::dep::to_dep_spec(inst).ok_or_else(|| Error::DepsElementNotDep("Dep".to_string()))?;
            specs.push(spec);
        }
        Ok(specs)
    }

    fn install_map(&self) -> Result<Option<engine::install::InstallMap>, Error> {
        let install_val = self.interp.env().get("install");
        let borrowed = install_val.as_ref().map(|v| v.borrow());
        Ok(engine::install::InstallMap::from_value(borrowed.as_deref())?)
    }

    /// BUILD: declares the install map up front (so a build step can install
    /// its own cookie the moment it finishes) and drains the deferred queue
    /// every host class call filled up during SETUP.
    pub fn build(&self) -> Result<(), Error> {
        let map = self.install_map()?;
        self.ctx.set_install_map(map);
        self.ctx.queue.lock().unwrap().run()?;
        Ok(())
    }

    /// Same as [`Project::build`] but first arms compile-command recording,
    /// for the `lsp` instruction.
    pub fn build_with_compile_db(&self) -> Result<Vec<hostlib::context::CompileCommandRecord>, Error> {
        self.ctx.enable_compile_db();
        self.build()?;
        Ok(self.ctx.take_compile_db())
    }

    /// INSTALL: a full pass over the install map, independent of whichever
    /// individual cookies were already installed during BUILD (idempotent).
    pub fn install(&self) -> Result<(), Error> {
        let map = self.install_map()?;
        if let Some(map) = &map {
            engine::install::install_all(map, &self.paths.prefix)?;
        } else {
            log::warn!("nothing declared in the install map");
        }
        Ok(())
    }

    /// RUN: executes the script's `run` vector (or `none` to explicitly
    /// disable it) with `extra_args` appended, after extending `PATH` and
    /// `LD_LIBRARY_PATH` so the freshly installed prefix is found first.
    pub fn run(&self, extra_args: &[String]) -> Result<i32, Error> {
        let Some(run_val) = self.interp.env().get("run") else {
            return Err(Error::MissingRunVector);
        };

        let mut argv = {
            let borrowed = run_val.borrow();
            match &*borrowed {
                Value::None => {
                    log::warn!("'bob run' has been disabled by this project (run = none)");
                    return Ok(0);
                }
                Value::Vec(items) => items
                    .iter()
                    .map(|v| match &*v.borrow() {
                        Value::Str(s) => Ok(String::from_utf8_lossy(s).into_owned()),
                        other => Err(Error::RunVectorElementNotStr(other.type_name())),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => return Err(Error::RunVectorNotVec(other.type_name())),
            }
        };
        argv.extend(extra_args.iter().cloned());

        if argv.is_empty() {
            log::warn!("run vector is empty; nothing to run");
            return Ok(0);
        }

        let mut cmd = std::process::Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        prepend_path_var(&mut cmd, "PATH", &self.paths.prefix.join("bin"));
        prepend_path_var(&mut cmd, "LD_LIBRARY_PATH", &self.paths.prefix.join("lib"));

        let status = cmd.status().map_err(|e| Error::RunSpawn(argv[0].clone(), e))?;
        Ok(status.code().unwrap_or(1))
    }
}

fn prepend_path_var(cmd: &mut std::process::Command, var: &str, dir: &Path) {
    let existing = std::env::var_os(var);
    let mut joined = dir.as_os_str().to_os_string();
    if let Some(existing) = existing {
        joined.push(":");
        joined.push(existing);
    }
    cmd.env(var, joined);
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no '{0}' found; not a bob project")]
    MissingBuildFile(PathBuf),
    #[error("build.fl never imported 'bob'")]
    MissingBobImport,
    #[error("'deps' must be a vector, got {0}")]
    DepsNotVector(&'static str),
    #[error("every element of 'deps' must be a Dep instance, got {0}")]
    DepsElementNotDep(String),
    #[error("dependency tree is circular")]
    CircularDeps,
    #[error("one or more dependencies failed to build")]
    DepBuildAborted,
    #[error("'run' was never declared")]
    MissingRunVector,
    #[error("'run' must be a vector or 'none', got {0}")]
    RunVectorNotVec(&'static str),
    #[error("every element of 'run' must be a string, got {0}")]
    RunVectorElementNotStr(&'static str),
    #[error("couldn't run '{0}': {1}")]
    RunSpawn(String, std::io::Error),
    #[error(transparent)]
    Parse(#[from] script::parser::Error),
    #[error(transparent)]
    Script(#[from] script::interp::Error),
    #[error(transparent)]
    Engine(#[from] engine::Error),
    #[error(transparent)]
    Depgraph(#[from] depgraph::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
