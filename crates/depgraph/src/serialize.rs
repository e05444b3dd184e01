use std::path::PathBuf;

use thiserror::Error;

use crate::node::{DepKind, DepNode};

const DEPTH_CHAR: char = '\t';
const TAG_START: &str = "<bob-dep-tree>\n";
const TAG_END: &str = "</bob-dep-tree>\n";
pub const CIRCULAR_MARKER: &str = "<bob-dep-tree circular />\n";

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid depth in serialized dependency tree")]
    InvalidDepth,
    #[error("could not read dependency tuple ({0})")]
    MissingField(&'static str),
    #[error("invalid dependency kind '{0}'")]
    InvalidKind(String),
    #[error("dependency tree tags present but no closing tag found")]
    UnterminatedTags,
}

/// Depth-first preorder serialization: each line is
/// `<TAB * depth>kind:human:path:build_path`. The root node itself is never
/// written, only its children (recursively), matching how the original
/// format has no way to represent the root's own identity.
pub fn serialize(root: &DepNode) -> String {
    let mut out = String::new();
    write_children(&mut out, root, 0);
    out
}

fn write_children(out: &mut String, node: &DepNode, depth: usize) {
    for child in &node.children {
        write_node(out, child, depth);
    }
}

fn write_node(out: &mut String, node: &DepNode, depth: usize) {
    for _ in 0..depth {
        out.push(DEPTH_CHAR);
    }

    out.push_str(&format!(
        "{}:{}:{}:{}\n",
        node.kind.as_code(),
        node.human,
        node.path.display(),
        node.build_path.display(),
    ));

    write_children(out, node, depth + 1);
}

/// Parses a serialized dependency tree into `root`'s children. `root` must
/// already carry its own identity (path/human/build_path); only its
/// `children` are populated.
pub fn deserialize(root: &mut DepNode, serialized: &str) -> Result<(), Error> {
    let body = match serialized.find(TAG_START) {
        Some(start) => {
            let after_start = &serialized[start + TAG_START.len()..];
            let end = after_start.find(TAG_END).ok_or(Error::UnterminatedTags)?;
            &after_start[..end]
        }
        None => serialized,
    };

    // Stack of (depth, node) indices is awkward in safe Rust with owned
    // trees, so we rebuild the tree by tracking a path of indices from the
    // root down to the current insertion point.
    let mut stack: Vec<usize> = Vec::new(); // indices into nested `children` at each level
    root.children.clear();
    let mut prev_depth = 0usize;

    for line in body.lines() {
        if line.is_empty() {
            continue;
        }

        let mut depth = 1usize;
        for c in line.chars() {
            if c != DEPTH_CHAR {
                break;
            }
            depth += 1;
        }

        if depth > prev_depth + 1 {
            return Err(Error::InvalidDepth);
        }

        if depth <= prev_depth {
            stack.truncate(depth - 1);
        }

        let tuple = &line[depth - 1..];
        let mut parts = tuple.splitn(4, ':');

        let kind_str = parts.next().ok_or(Error::MissingField("kind"))?;
        let kind_code: u8 = kind_str.parse().map_err(|_| Error::InvalidKind(kind_str.to_string()))?;
        let kind = DepKind::from_code(kind_code).ok_or_else(|| Error::InvalidKind(kind_str.to_string()))?;

        let human = parts.next().ok_or(Error::MissingField("human"))?.to_string();
        let path = parts.next().ok_or(Error::MissingField("path"))?.to_string();
        let build_path = parts.next().ok_or(Error::MissingField("build_path"))?.to_string();

        let node = DepNode {
            is_root: false,
            kind,
            path: PathBuf::from(path),
            human,
            build_path: PathBuf::from(build_path),
            children: Vec::new(),
        };

        let parent = descend_mut(root, &stack);
        parent.children.push(node);
        let new_index = parent.children.len() - 1;
        stack.push(new_index);

        prev_depth = depth;
    }

    Ok(())
}

fn descend_mut<'a>(root: &'a mut DepNode, path: &[usize]) -> &'a mut DepNode {
    let mut node = root;
    for &idx in path {
        node = &mut node.children[idx];
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(human: &str, path: &str) -> DepNode {
        DepNode {
            is_root: false,
            kind: DepKind::Local,
            path: PathBuf::from(path),
            human: human.to_string(),
            build_path: PathBuf::from(path),
            children: Vec::new(),
        }
    }

    #[test]
    fn roundtrip_nested_tree() {
        let mut a = leaf("a", "/deps/a");
        a.children.push(leaf("a-child", "/deps/a-child"));
        let mut root = DepNode::root(PathBuf::from("/proj"), "proj".to_string(), PathBuf::from("/proj"));
        root.children.push(a);
        root.children.push(leaf("b", "/deps/b"));

        let text = serialize(&root);
        let mut restored = DepNode::root(PathBuf::from("/proj"), "proj".to_string(), PathBuf::from("/proj"));
        deserialize(&mut restored, &text).unwrap();

        assert_eq!(restored.children.len(), 2);
        assert_eq!(restored.children[0].human, "a");
        assert_eq!(restored.children[0].children.len(), 1);
        assert_eq!(restored.children[0].children[0].human, "a-child");
        assert_eq!(restored.children[1].human, "b");
    }

    #[test]
    fn rejects_depth_jump() {
        let mut root = DepNode::root(PathBuf::from("/proj"), "proj".to_string(), PathBuf::from("/proj"));
        let bogus = "\t\t1:x:path:build\n";
        assert!(matches!(deserialize(&mut root, bogus), Err(Error::InvalidDepth)));
    }

    #[test]
    fn reads_tagged_payload() {
        let mut root = DepNode::root(PathBuf::from("/proj"), "proj".to_string(), PathBuf::from("/proj"));
        let wrapped = format!("{TAG_START}1:a:/deps/a:/deps/a\n{TAG_END}");
        deserialize(&mut root, &wrapped).unwrap();
        assert_eq!(root.children.len(), 1);
    }
}
