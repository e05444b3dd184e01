//! Build-step execution: the deferred-execution queue, frugality checks,
//! content-addressed cookies, the worker pool, and install-map handling.

pub mod cookie;
pub mod frugal;
pub mod install;
pub mod pool;
pub mod queue;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("build step '{0}' merged with mismatched step '{1}'")]
    StepMismatch(String, String),
    #[error("build step pool aborted")]
    Aborted,
    #[error("install map must be a map, got {0}")]
    InstallMapType(&'static str),
    #[error("install map entries must be string -> string")]
    InstallMapEntryType,
    #[error("couldn't find install source: {0}")]
    InstallSourceMissing(String),
    /// Catch-all for a host class's own build-step failures (failed to spawn
    /// a compiler, linker, etc.) reported back through the queue.
    #[error("{0}")]
    Step(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
