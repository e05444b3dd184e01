use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Local,
    Git,
}

impl DepKind {
    pub fn as_code(self) -> u8 {
        match self {
            DepKind::Local => 1,
            DepKind::Git => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(DepKind::Local),
            2 => Some(DepKind::Git),
            _ => None,
        }
    }
}

/// A node in the dependency tree: the project itself (the root) or one of
/// its transitive dependencies.
#[derive(Debug, Clone)]
pub struct DepNode {
    pub is_root: bool,
    pub kind: DepKind,
    /// Path to the dependency inside Bob's dependency cache.
    pub path: PathBuf,
    /// Human-readable name (repo name for git deps, last path component for
    /// local ones).
    pub human: String,
    /// Path to change into to run the dependency's own build script.
    pub build_path: PathBuf,
    pub children: Vec<DepNode>,
}

impl DepNode {
    pub fn root(path: PathBuf, human: String, build_path: PathBuf) -> Self {
        Self {
            is_root: true,
            kind: DepKind::Local,
            path,
            human,
            build_path,
            children: Vec::new(),
        }
    }
}
