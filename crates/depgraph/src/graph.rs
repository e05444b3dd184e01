use std::collections::HashMap;
use std::path::PathBuf;

use dag::Dag;

use crate::node::DepNode;

/// One dependency flattened out of the tree, deduplicated by its cache path
/// so a diamond dependency only gets built once.
#[derive(Debug, Clone)]
pub struct BuildUnit {
    pub path: PathBuf,
    pub build_path: PathBuf,
    pub human: String,
}

/// Groups every unique dependency into batches such that everything in
/// batch `i` only depends on dependencies in batches `< i`; batches can be
/// built concurrently, batch by batch, with a fixed-size worker pool.
pub fn build_order(tree: &DepNode) -> Vec<Vec<BuildUnit>> {
    let mut dag: Dag<PathBuf> = Dag::new();
    let mut units: HashMap<PathBuf, BuildUnit> = HashMap::new();

    // Edges point dependency -> dependent; `add_edge` refuses anything that
    // would introduce a cycle, as a last line of defense even though
    // `TreeBuilder` already rejects circular dependency vectors up front.
    add_edges(tree, &mut dag, &mut units, None);

    // Batch number per path: the longest dependency chain beneath it, so
    // everything with no dependencies lands in batch 0.
    let mut memo: HashMap<PathBuf, usize> = HashMap::new();
    for path in dag.topo() {
        compute_depth(tree, path, &mut memo);
    }

    let max_depth = memo.values().copied().max().unwrap_or(0);
    let mut batches = vec![Vec::new(); max_depth + 1];

    for (path, unit) in units {
        let d = memo.get(&path).copied().unwrap_or(0);
        batches[d].push(unit);
    }

    batches.retain(|batch| !batch.is_empty());
    for batch in &mut batches {
        batch.sort_by(|a, b| a.path.cmp(&b.path));
    }
    batches
}

fn add_edges(
    node: &DepNode,
    dag: &mut Dag<PathBuf>,
    units: &mut HashMap<PathBuf, BuildUnit>,
    parent: Option<&DepNode>,
) {
    if !node.is_root {
        units.entry(node.path.clone()).or_insert_with(|| BuildUnit {
            path: node.path.clone(),
            build_path: node.build_path.clone(),
            human: node.human.clone(),
        });

        let self_idx = dag.add_node_or_get_index(node.path.clone());
        if let Some(parent) = parent {
            let parent_idx = dag.add_node_or_get_index(parent.path.clone());
            dag.add_edge(self_idx, parent_idx);
        }
    }

    for child in &node.children {
        add_edges(child, dag, units, Some(node));
    }
}

fn compute_depth(tree: &DepNode, path: &std::path::Path, memo: &mut HashMap<PathBuf, usize>) -> usize {
    if let Some(d) = memo.get(path) {
        return *d;
    }

    let node = find_node(tree, path);
    let depth = match node {
        Some(node) => node
            .children
            .iter()
            .map(|c| compute_depth(tree, &c.path, memo) + 1)
            .max()
            .unwrap_or(0),
        None => 0,
    };

    memo.insert(path.to_path_buf(), depth);
    depth
}

fn find_node<'a>(node: &'a DepNode, path: &std::path::Path) -> Option<&'a DepNode> {
    if node.path == path {
        return Some(node);
    }
    for child in &node.children {
        if let Some(found) = find_node(child, path) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DepKind;
    use std::path::PathBuf;

    fn leaf(path: &str) -> DepNode {
        DepNode {
            is_root: false,
            kind: DepKind::Local,
            path: PathBuf::from(path),
            human: path.to_string(),
            build_path: PathBuf::from(path),
            children: Vec::new(),
        }
    }

    #[test]
    fn leaves_come_before_their_parent() {
        let mut a = leaf("/deps/a");
        a.children.push(leaf("/deps/a-child"));

        let mut root = DepNode::root(PathBuf::from("/proj"), "proj".into(), PathBuf::from("/proj"));
        root.children.push(a);
        root.children.push(leaf("/deps/b"));

        let batches = build_order(&root);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].iter().map(|u| u.path.clone()).collect::<Vec<_>>().len(), 2);
        assert_eq!(batches[1][0].path, PathBuf::from("/deps/a"));
    }
}
