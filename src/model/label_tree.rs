use std::collections::BTreeMap;

use log::warn;
use serde::Serialize;

/// One segment of a label path and the notes carrying it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelNode {
    /// Number of notes carrying this path prefix (each note counted once)
    pub count: usize,
    pub children: LabelTree,
}

/// Aggregate label counts, keyed by path segment.
///
/// Built per note with [`LabelTree::from_paths`] and folded into the
/// notebook aggregate with [`LabelTree::merge`] / [`LabelTree::subtract`],
/// so an add and its matching remove are exact inverses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelTree {
    nodes: BTreeMap<String, LabelNode>,
}

impl LabelTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tree contributed by a single note: every prefix of every path
    /// gets a count of exactly one, however many paths share it.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut nodes = BTreeMap::new();
        for path in paths {
            let segments: Vec<&str> = path.as_ref().split('/').filter(|s| !s.is_empty()).collect();
            nodes = mark_path(nodes, &segments);
        }
        LabelTree { nodes }
    }

    /// Add `other`'s counts into this tree
    pub fn merge(self, other: &LabelTree) -> Self {
        LabelTree {
            nodes: merge_nodes(self.nodes, &other.nodes),
        }
    }

    /// Remove `other`'s counts from this tree. Nodes reaching zero are pruned.
    /// Never creates nodes.
    pub fn subtract(self, other: &LabelTree) -> Self {
        LabelTree {
            nodes: subtract_nodes(self.nodes, &other.nodes),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level segments in order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &LabelNode)> {
        self.nodes.iter()
    }

    /// Look up the node for a full `/`-separated path
    pub fn get(&self, path: &str) -> Option<&LabelNode> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut node = self.nodes.get(first)?;
        for segment in segments {
            node = node.children.nodes.get(segment)?;
        }
        Some(node)
    }

    /// Count for a path, 0 if absent
    pub fn count(&self, path: &str) -> usize {
        self.get(path).map_or(0, |n| n.count)
    }

    /// Flatten into `"a" -> n, "a/b" -> m, ...`
    pub fn flatten(&self) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        flatten_into(&self.nodes, "", &mut out);
        out
    }
}

fn mark_path(
    mut nodes: BTreeMap<String, LabelNode>,
    segments: &[&str],
) -> BTreeMap<String, LabelNode> {
    let Some((first, rest)) = segments.split_first() else {
        return nodes;
    };
    let mut node = nodes.remove(*first).unwrap_or_default();
    node.count = 1;
    node.children = LabelTree {
        nodes: mark_path(node.children.nodes, rest),
    };
    nodes.insert((*first).to_string(), node);
    nodes
}

fn merge_nodes(
    mut into: BTreeMap<String, LabelNode>,
    from: &BTreeMap<String, LabelNode>,
) -> BTreeMap<String, LabelNode> {
    for (segment, node) in from {
        let mut target = into.remove(segment).unwrap_or_default();
        target.count += node.count;
        target.children = LabelTree {
            nodes: merge_nodes(target.children.nodes, &node.children.nodes),
        };
        into.insert(segment.clone(), target);
    }
    into
}

fn subtract_nodes(
    mut into: BTreeMap<String, LabelNode>,
    from: &BTreeMap<String, LabelNode>,
) -> BTreeMap<String, LabelNode> {
    for (segment, node) in from {
        debug_assert!(
            into.get(segment).is_some_and(|t| t.count >= node.count),
            "label count underflow on '{}'",
            segment
        );
        let Some(mut target) = into.remove(segment) else {
            warn!("label count underflow: no node for segment '{}'", segment);
            continue;
        };
        if target.count < node.count {
            warn!(
                "label count underflow on '{}': {} - {}",
                segment, target.count, node.count
            );
        }
        target.count = target.count.saturating_sub(node.count);
        target.children = LabelTree {
            nodes: subtract_nodes(target.children.nodes, &node.children.nodes),
        };
        if target.count > 0 {
            into.insert(segment.clone(), target);
        }
    }
    into
}

fn flatten_into(nodes: &BTreeMap<String, LabelNode>, prefix: &str, out: &mut BTreeMap<String, usize>) {
    for (segment, node) in nodes {
        let path = if prefix.is_empty() {
            segment.clone()
        } else {
            format!("{}/{}", prefix, segment)
        };
        out.insert(path.clone(), node.count);
        flatten_into(&node.children.nodes, &path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paths_counts_each_prefix_once() {
        let tree = LabelTree::from_paths(["a/b", "a/c", "d"]);
        assert_eq!(tree.count("a"), 1);
        assert_eq!(tree.count("a/b"), 1);
        assert_eq!(tree.count("a/c"), 1);
        assert_eq!(tree.count("d"), 1);
        assert_eq!(tree.count("a/b/c"), 0);
    }

    #[test]
    fn test_merge_counts_notes_not_children() {
        let tree = LabelTree::new()
            .merge(&LabelTree::from_paths(["project/alpha", "project/beta"]))
            .merge(&LabelTree::from_paths(["project/alpha"]));
        assert_eq!(tree.count("project"), 2);
        assert_eq!(tree.count("project/alpha"), 2);
        assert_eq!(tree.count("project/beta"), 1);
    }

    #[test]
    fn test_subtract_is_inverse_of_merge() {
        let base = LabelTree::new().merge(&LabelTree::from_paths(["x/y"]));
        let note = LabelTree::from_paths(["x/y/z", "w"]);
        let round = base.clone().merge(&note).subtract(&note);
        assert_eq!(round, base);
    }

    #[test]
    fn test_subtract_prunes_zero_nodes() {
        let note = LabelTree::from_paths(["a/b"]);
        let tree = LabelTree::new().merge(&note).subtract(&note);
        assert!(tree.is_empty());
        assert!(tree.get("a").is_none());
    }

    #[test]
    fn test_flatten() {
        let tree = LabelTree::new()
            .merge(&LabelTree::from_paths(["a/b", "c"]))
            .merge(&LabelTree::from_paths(["a"]));
        let flat = tree.flatten();
        assert_eq!(flat.get("a"), Some(&2));
        assert_eq!(flat.get("a/b"), Some(&1));
        assert_eq!(flat.get("c"), Some(&1));
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn test_get_ignores_empty_segments() {
        let tree = LabelTree::from_paths(["a/b"]);
        assert_eq!(tree.count("/a//b/"), 1);
        assert!(tree.get("").is_none());
    }
}
