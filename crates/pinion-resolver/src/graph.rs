//! The resolved dependency graph and its traversal.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use semver::Version;

use crate::state::{NodeId, ResolutionState};

/// A node in the resolved graph: the root or a library at its chosen version.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolvedNode {
    pub id: NodeId,
    pub version: Option<Version>,
}

impl ResolvedNode {
    pub fn name(&self) -> Option<&str> {
        self.id.as_library()
    }
}

impl fmt::Display for ResolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.id, version),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Edge label: the range the parent imposes on the child.
#[derive(Debug, Clone)]
pub struct DepEdge {
    pub range: String,
    pub backtracked_due_to: Option<String>,
}

/// A resolved dependency graph backed by petgraph.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<ResolvedNode, DepEdge>,
    index: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl DependencyGraph {
    /// Build the graph of a settled resolution state. Edges to libraries
    /// that are not in the state are skipped.
    pub fn from_state(state: &ResolutionState) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(ResolvedNode {
            id: NodeId::Root,
            version: None,
        });
        let mut index = HashMap::new();
        for (name, node) in state.libraries() {
            let idx = graph.add_node(ResolvedNode {
                id: NodeId::library(name),
                version: node.version.clone(),
            });
            index.insert(name.to_string(), idx);
        }

        for (id, node) in state.iter() {
            let from = match id.as_library() {
                Some(name) => index[name],
                None => root,
            };
            for (child, edge) in &node.dependencies {
                let Some(&to) = index.get(child) else {
                    continue;
                };
                graph.add_edge(
                    from,
                    to,
                    DepEdge {
                        range: edge.range.to_string(),
                        backtracked_due_to: edge.backtracked_due_to.clone(),
                    },
                );
            }
        }

        Self { graph, index, root }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Look up a library by name.
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &ResolvedNode {
        &self.graph[idx]
    }

    /// Direct dependencies of a node, sorted by library name.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        deps.sort_by(|a, b| self.graph[a.0].name().cmp(&self.graph[b.0].name()));
        deps
    }

    /// Reverse dependencies (who constrains this node).
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect()
    }

    /// Render the tree below the root, annotating each child with the range
    /// its parent imposes. Libraries reached again on the same branch are
    /// printed but not expanded.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = format!("{}\n", self.graph[self.root]);
        let mut visited = HashSet::new();
        visited.insert(self.root);

        let deps = self.dependencies_of(self.root);
        let count = deps.len();
        for (i, (idx, edge)) in deps.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_subtree(&mut output, *idx, edge, "", is_last, 1, max_depth, &mut visited);
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        edge: &DepEdge,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        output.push_str(&format!("{prefix}{connector}{node} ({})\n", edge.range));

        if let Some(max) = max_depth {
            if depth >= max {
                return;
            }
        }

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let deps = self.dependencies_of(idx);
        let count = deps.len();
        for (i, (child, child_edge)) in deps.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_subtree(
                output,
                *child,
                child_edge,
                &child_prefix,
                is_last,
                depth + 1,
                max_depth,
                visited,
            );
        }

        visited.remove(&idx);
    }

    /// Find a chain of dependencies from the root to `name`.
    pub fn find_path(&self, name: &str) -> Option<Vec<&ResolvedNode>> {
        let target = self.find(name)?;
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.dfs_path(self.root, target, &mut path, &mut visited) {
            Some(path.iter().map(|&idx| &self.graph[idx]).collect())
        } else {
            None
        }
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for (child, _) in self.dependencies_of(current) {
            if self.dfs_path(child, target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Number of resolved libraries (root excluded).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::range::Range;
    use crate::state::Edge;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn edges(children: &[(&str, &str)]) -> IndexMap<String, Edge> {
        children
            .iter()
            .map(|(name, range)| (name.to_string(), Edge::new(Range::parse(range).unwrap())))
            .collect()
    }

    // root -> app -> (core, log), root -> log; core -> log
    fn sample() -> DependencyGraph {
        let mut state = ResolutionState::new(edges(&[("app", "^1.0.0"), ("log", "0.4.0")]));
        state.commit("app", v("1.2.0"));
        state.commit("core", v("2.0.0"));
        state.commit("log", v("0.4.0"));
        state.get_mut(&NodeId::library("app")).unwrap().dependencies =
            edges(&[("log", "^0.4.0"), ("core", "^2.0.0")]);
        state.get_mut(&NodeId::library("core")).unwrap().dependencies =
            edges(&[("log", ">=0.3.0")]);
        DependencyGraph::from_state(&state)
    }

    #[test]
    fn nodes_and_lookup() {
        let g = sample();
        assert_eq!(g.len(), 3);
        let idx = g.find("core").unwrap();
        assert_eq!(g.node(idx).to_string(), "core@2.0.0");
        assert!(g.find("missing").is_none());
        assert_eq!(g.node(g.root()).to_string(), "root");
    }

    #[test]
    fn dependencies_sorted_by_name() {
        let g = sample();
        let app = g.find("app").unwrap();
        let names: Vec<_> = g
            .dependencies_of(app)
            .iter()
            .map(|(idx, _)| g.node(*idx).name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["core", "log"]);
    }

    #[test]
    fn dependents_carry_ranges() {
        let g = sample();
        let log = g.find("log").unwrap();
        let mut ranges: Vec<_> = g
            .dependents_of(log)
            .iter()
            .map(|(_, e)| e.range.clone())
            .collect();
        ranges.sort();
        assert_eq!(ranges, vec!["0.4.0", ">=0.3.0", "^0.4.0"]);
    }

    #[test]
    fn tree_printing() {
        let g = sample();
        let tree = g.print_tree(None);
        let expected = "\
root
├── app@1.2.0 (^1.0.0)
│   ├── core@2.0.0 (^2.0.0)
│   │   └── log@0.4.0 (>=0.3.0)
│   └── log@0.4.0 (^0.4.0)
└── log@0.4.0 (0.4.0)
";
        assert_eq!(tree, expected);
    }

    #[test]
    fn tree_depth_limit() {
        let g = sample();
        let tree = g.print_tree(Some(1));
        assert!(tree.contains("app@1.2.0"));
        assert!(!tree.contains("core@2.0.0"));
    }

    #[test]
    fn find_path_exists() {
        let g = sample();
        let path = g.find_path("core").unwrap();
        let names: Vec<_> = path.iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["root", "app@1.2.0", "core@2.0.0"]);
    }

    #[test]
    fn find_path_not_found() {
        let g = sample();
        assert!(g.find_path("nope").is_none());
    }
}
