//! The syntactic code graph consumed by the resolution pipeline.
//!
//! Nodes are produced by the [`crate::scanner`] from parse trees and are
//! read-only afterwards: the resolver pairs call sites with enclosing
//! functions through this index, never through the trees themselves.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of a definition recorded in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A standalone function.
    Function,
    /// A method within a class.
    Method,
    /// A class definition.
    Class,
    /// An import statement.
    Import,
}

/// A single definition node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeNode {
    /// Stable id, assigned in insertion order.
    pub id: u32,
    /// What the node defines.
    pub kind: NodeKind,
    /// Dotted name relative to the defining module
    /// (e.g. `save`, `User.save`, `outer.inner`).
    pub name: String,
    /// Absolute path of the defining file.
    pub file: PathBuf,
    /// 1-indexed line of the definition.
    pub line: usize,
    /// 1-indexed last line of the definition body.
    pub end_line: usize,
    /// First source line of the definition, trimmed.
    pub snippet: String,
}

/// Read-only index of every definition across the project.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CodeGraph {
    /// All nodes, in insertion order.
    pub nodes: Vec<CodeNode>,
    /// Node indices grouped by file.
    by_file: FxHashMap<PathBuf, Vec<usize>>,
}

impl CodeGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, assigning the next id.
    pub fn push(
        &mut self,
        kind: NodeKind,
        name: String,
        file: PathBuf,
        line: usize,
        end_line: usize,
        snippet: String,
    ) {
        let id = u32::try_from(self.nodes.len()).unwrap_or(u32::MAX);
        self.by_file
            .entry(file.clone())
            .or_default()
            .push(self.nodes.len());
        self.nodes.push(CodeNode {
            id,
            kind,
            name,
            file,
            line,
            end_line,
            snippet,
        });
    }

    /// Returns the nodes defined in a file, in source order.
    #[must_use]
    pub fn nodes_in_file(&self, file: &Path) -> Vec<&CodeNode> {
        self.by_file
            .get(file)
            .map(|ids| ids.iter().map(|&i| &self.nodes[i]).collect())
            .unwrap_or_default()
    }

    /// Iterates all nodes of a given kind.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &CodeNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// Merges another graph into this one, re-assigning ids.
    pub fn merge(&mut self, other: CodeGraph) {
        for node in other.nodes {
            self.push(
                node.kind,
                node.name,
                node.file,
                node.line,
                node.end_line,
                node.snippet,
            );
        }
    }

    /// Total number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_lookup() {
        let mut graph = CodeGraph::new();
        graph.push(
            NodeKind::Function,
            "process".to_owned(),
            PathBuf::from("/p/app.py"),
            3,
            5,
            "def process():".to_owned(),
        );
        graph.push(
            NodeKind::Class,
            "User".to_owned(),
            PathBuf::from("/p/models.py"),
            1,
            4,
            "class User:".to_owned(),
        );

        assert_eq!(graph.len(), 2);
        let in_app = graph.nodes_in_file(Path::new("/p/app.py"));
        assert_eq!(in_app.len(), 1);
        assert_eq!(in_app[0].name, "process");
        assert_eq!(graph.nodes_of_kind(NodeKind::Class).count(), 1);
    }

    #[test]
    fn test_merge_reassigns_ids() {
        let mut a = CodeGraph::new();
        a.push(
            NodeKind::Function,
            "f".to_owned(),
            PathBuf::from("/p/a.py"),
            1,
            2,
            "def f():".to_owned(),
        );
        let mut b = CodeGraph::new();
        b.push(
            NodeKind::Function,
            "g".to_owned(),
            PathBuf::from("/p/b.py"),
            1,
            2,
            "def g():".to_owned(),
        );

        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.nodes[1].id, 1);
        assert_eq!(a.nodes[1].name, "g");
    }
}
