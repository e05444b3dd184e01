//! Dependency tree discovery, caching, serialization, and build ordering.

pub mod graph;
pub mod node;
pub mod resolve;
pub mod serialize;
pub mod tree;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("couldn't find local dependency at '{0}'")]
    LocalDepNotFound(String),
    #[error("symlink('{0}', '{1}'): {2}")]
    Symlink(PathBuf, PathBuf, std::io::Error),
    #[error("git clone of '{0}' failed: {1}")]
    GitClone(String, String),
    #[error("failed to get dependency tree of '{0}': {1}")]
    ChildDepTree(String, String),
    #[error(transparent)]
    Serialize(#[from] serialize::Error),
    #[error("launching child process failed: {0}")]
    Launch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub use node::{DepKind, DepNode};
pub use resolve::DepSpec;
pub use serialize::CIRCULAR_MARKER;
pub use tree::{TreeBuilder, TreeOutcome};
