use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

use fs_err as fs;
use xxhash_rust::xxh3::xxh3_64;

use crate::node::DepNode;
use crate::resolve::{resolve_all, DepSpec};
use crate::serialize::{self, CIRCULAR_MARKER};
use crate::Error;

pub enum TreeOutcome {
    Tree(DepNode),
    /// The would-be dependency was already among its own ancestors.
    Circular,
}

/// Builds (or loads a cached copy of) the dependency tree rooted at
/// `project_dir`.
///
/// `ancestor_hashes` are the path-hashes of every ancestor already on the
/// recursion stack (passed down through `bob dep-tree <hash>...` arguments);
/// used to detect a dependency cycle before it causes infinite recursion.
pub struct TreeBuilder<'a> {
    pub project_dir: &'a Path,
    pub out_dir: &'a Path,
    pub deps_dir: &'a Path,
    pub bob_exe: &'a Path,
    pub force_rebuild: bool,
}

impl TreeBuilder<'_> {
    pub fn build(&self, specs: &[DepSpec], ancestor_hashes: &[u64]) -> Result<TreeOutcome, Error> {
        let (resolved, deps_hash) = resolve_all(specs, self.deps_dir)?;

        let project_abs = fs::canonicalize(self.project_dir)?;
        let human = crate::resolve::human_name(&project_abs);
        let mut root = DepNode::root(project_abs.clone(), human.clone(), project_abs.clone());
        let would_be_hash = xxh3_64(project_abs.to_string_lossy().as_bytes());

        if resolved.is_empty() {
            return Ok(TreeOutcome::Tree(root));
        }

        if ancestor_hashes.contains(&would_be_hash) {
            log::warn!("dependency tree is circular after adding '{human}'");
            return Ok(TreeOutcome::Circular);
        }

        let hash_path = self.out_dir.join("deps.hash");
        let tree_path = self.out_dir.join("deps.tree");

        let mut force_children = self.force_rebuild;

        if !self.force_rebuild {
            match self.try_load_cached(&hash_path, &tree_path, deps_hash, &mut root) {
                Ok(true) => return Ok(TreeOutcome::Tree(root)),
                Ok(false) => {}
                Err(_) => {}
            }
        } else {
            log::info!("forcing dependency tree to be rebuilt");
        }

        if !hash_path.exists() {
            // No cache at all: propagate the rebuild to every child so the
            // whole subtree is consistently fresh. See upstream issue #89.
            force_children = true;
        }

        let mut seen_path_hashes = HashSet::new();
        let mut next_ancestors = ancestor_hashes.to_vec();
        next_ancestors.push(would_be_hash);

        for dep in &resolved {
            let path_hash = xxh3_64(dep.path.to_string_lossy().as_bytes());
            if !seen_path_hashes.insert(path_hash) {
                // Already present in this dependency vector; prune silently,
                // the same way a build script would end up depending on the
                // same thing twice through different paths.
                continue;
            }

            let mut cmd = Command::new(self.bob_exe);
            cmd.arg("-C").arg(&dep.path);
            if force_children {
                cmd.arg("-f");
            }
            cmd.arg("dep-tree");
            for h in &next_ancestors {
                cmd.arg(format!("{h:x}"));
            }

            let out = launch::run_captured(&mut cmd).map_err(|e| Error::Launch(e.to_string()))?;
            let stdout = out.stdout_string();

            if !out.success() {
                return Err(Error::ChildDepTree(dep.human.clone(), out.stderr_string()));
            }

            if stdout.contains(CIRCULAR_MARKER) {
                log::warn!("dependency tree is circular after adding '{}'", dep.human);
                return Ok(TreeOutcome::Circular);
            }

            let mut child = DepNode::root(dep.path.clone(), dep.human.clone(), dep.path.clone());
            serialize::deserialize(&mut child, &stdout).map_err(Error::Serialize)?;
            child.is_root = false;
            child.kind = dep.kind;

            root.children.push(child);
        }

        fs::write(&hash_path, format!("{deps_hash:x}"))?;
        fs::write(&tree_path, serialize::serialize(&root))?;

        Ok(TreeOutcome::Tree(root))
    }

    fn try_load_cached(
        &self,
        hash_path: &Path,
        tree_path: &Path,
        deps_hash: u64,
        root: &mut DepNode,
    ) -> Result<bool, Error> {
        let Ok(read_hash_str) = fs::read_to_string(hash_path) else {
            log::info!("no cached dependency tree found, building it");
            return Ok(false);
        };

        let Ok(read_hash) = u64::from_str_radix(read_hash_str.trim(), 16) else {
            return Ok(false);
        };

        if read_hash != deps_hash {
            log::info!("dependency vector changed, rebuilding dependency tree");
            return Ok(false);
        }

        let Ok(serialized) = fs::read_to_string(tree_path) else {
            log::warn!("could not open cached dependency tree, rebuilding it");
            return Ok(false);
        };

        serialize::deserialize(root, &serialized).map_err(Error::Serialize)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_deps_yields_root_only() {
        let project = tempdir().unwrap();
        let out = tempdir().unwrap();
        let deps = tempdir().unwrap();

        let builder = TreeBuilder {
            project_dir: project.path(),
            out_dir: out.path(),
            deps_dir: deps.path(),
            bob_exe: Path::new("bob"),
            force_rebuild: false,
        };

        match builder.build(&[], &[]).unwrap() {
            TreeOutcome::Tree(tree) => assert!(tree.children.is_empty()),
            TreeOutcome::Circular => panic!("expected a tree"),
        }
    }
}
