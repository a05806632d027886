//! Mutable resolution state: the root's demands plus one node per library
//! with a committed version.
//!
//! Nodes are kept in insertion order. That order is the tie-break order used
//! when choosing a constraining parent and when scanning for conflicts: the
//! root always comes first, then libraries in the order they were committed.
//! Re-committing a library that is still present keeps its position; a
//! dropped library is appended again when it is next committed.

use std::fmt;

use indexmap::IndexMap;
use semver::Version;

use crate::range::Range;

/// Key of a node in the resolution state.
///
/// The root is its own variant, so no library name can ever collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    Root,
    Library(String),
}

impl NodeId {
    pub fn library(name: &str) -> Self {
        NodeId::Library(name.to_string())
    }

    pub fn as_library(&self) -> Option<&str> {
        match self {
            NodeId::Root => None,
            NodeId::Library(name) => Some(name),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Root => f.write_str("root"),
            NodeId::Library(name) => f.write_str(name),
        }
    }
}

/// A range one node imposes on a child library.
#[derive(Debug, Clone)]
pub struct Edge {
    pub range: Range,
    /// Greatest cached version of the child satisfying `range`.
    pub max_satisfying: Option<Version>,
    /// Set when backtracking wrote this edge; names the library whose
    /// conflicting demands caused it.
    pub backtracked_due_to: Option<String>,
}

impl Edge {
    pub fn new(range: Range) -> Self {
        Self {
            range,
            max_satisfying: None,
            backtracked_due_to: None,
        }
    }

    pub fn backtracked(range: Range, due_to: &str) -> Self {
        Self {
            range,
            max_satisfying: None,
            backtracked_due_to: Some(due_to.to_string()),
        }
    }
}

/// A root or library node. Library nodes always carry a version; an empty
/// `dependencies` map means the node's own constraints are not attached yet.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub version: Option<Version>,
    pub dependencies: IndexMap<String, Edge>,
}

/// How a constraining node is named in messages.
pub fn describe(id: &NodeId, version: Option<&Version>) -> String {
    match version {
        Some(version) => format!("{id}@{version}"),
        None => "root".to_string(),
    }
}

#[derive(Debug)]
pub struct ResolutionState {
    nodes: IndexMap<NodeId, Node>,
}

impl ResolutionState {
    /// Create the state holding only the root and its direct demands.
    pub fn new(root_dependencies: IndexMap<String, Edge>) -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert(
            NodeId::Root,
            Node {
                version: None,
                dependencies: root_dependencies,
            },
        );
        Self { nodes }
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains_library(&self, name: &str) -> bool {
        self.nodes.contains_key(&NodeId::library(name))
    }

    pub fn version_of(&self, id: &NodeId) -> Option<&Version> {
        self.nodes.get(id)?.version.as_ref()
    }

    /// `root`, or `<name>@<version>` for a committed library.
    pub fn describe(&self, id: &NodeId) -> String {
        describe(id, self.version_of(id))
    }

    /// Commit `version` for `name`, replacing any previous node for it.
    pub fn commit(&mut self, name: &str, version: Version) {
        self.nodes.insert(
            NodeId::library(name),
            Node {
                version: Some(version),
                dependencies: IndexMap::new(),
            },
        );
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, NodeId, Node> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, NodeId, Node> {
        self.nodes.iter_mut()
    }

    /// Remove `name` and, recursively, every library its node depended on.
    ///
    /// Each former child is pushed onto `requeue` after its own subtree has
    /// been dropped. Memoized maxima on edges pointing at a dropped library
    /// are cleared.
    pub fn drop_library(&mut self, name: &str, requeue: &mut Vec<String>) {
        let Some(node) = self.nodes.shift_remove(&NodeId::library(name)) else {
            return;
        };
        tracing::trace!("Dropping {name} and {} former children", node.dependencies.len());
        self.forget_max_satisfying(name);

        for child in node.dependencies.into_keys() {
            self.drop_library(&child, requeue);
            requeue.push(child);
        }
    }

    fn forget_max_satisfying(&mut self, name: &str) {
        for node in self.nodes.values_mut() {
            if let Some(edge) = node.dependencies.get_mut(name) {
                edge.max_satisfying = None;
            }
        }
    }

    /// Whether `name` is a node in the state or a child of any node.
    pub fn is_referenced(&self, name: &str) -> bool {
        self.nodes
            .iter()
            .any(|(id, node)| id.as_library() == Some(name) || node.dependencies.contains_key(name))
    }

    /// Committed libraries (root excluded) in state order.
    pub fn libraries(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| id.as_library().map(|name| (name, node)))
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(&NodeId::Root)
    }
}
