//! Host classes available to `build.fl` scripts: `Cc`, `Linker`, `Fs`,
//! `Platform`, `PkgConfig`, `Go`, `Cargo`, and `Dep`. Each implements
//! `script::HostClass` and is registered against a shared [`BuildContext`]
//! so their build steps land in the same deferred-execution queue.

pub mod cargo;
pub mod cc;
pub mod cmd;
pub mod context;
pub mod convert;
pub mod dep;
pub mod fs;
pub mod go;
pub mod linker;
pub mod pkg_config;
pub mod platform;

use std::rc::Rc;
use std::sync::Arc;

use script::HostRegistry;

pub use context::BuildContext;

/// Registers every host class this crate provides against `registry`,
/// sharing `ctx` across the ones that enqueue build steps.
///
/// `ctx` is `Arc` because build steps run across worker-pool threads once
/// queued; the classes themselves are registered as `Rc<dyn HostClass>`
/// since the interpreter that calls into them is single-threaded.
pub fn register_all(registry: &mut HostRegistry, ctx: Arc<BuildContext>) {
    registry.register(Rc::new(cc::Cc::new(ctx.clone())));
    registry.register(Rc::new(linker::Linker::new(ctx.clone())));
    registry.register(Rc::new(go::Go::new(ctx.clone())));
    registry.register(Rc::new(cargo::Cargo::new(ctx)));
    registry.register(Rc::new(fs::Fs));
    registry.register(Rc::new(platform::Platform));
    registry.register(Rc::new(pkg_config::PkgConfig));
    registry.register(Rc::new(dep::Dep));
}
