//! The resolved call graph: function index, edges, call sites and
//! per-function taint summaries.
//!
//! Adjacency lists are sorted lexicographically and deduplicated when
//! the graph is finalized, so traversal order is deterministic and edge
//! sets survive serialization round-trips.

use crate::graph::{CodeGraph, NodeKind};
use crate::registry::modules::ModuleRegistry;
use crate::taint::TaintSummary;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A function or method node in the call graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNode {
    /// Fully qualified name.
    pub fqn: String,
    /// Defining file.
    pub file: PathBuf,
    /// 1-indexed definition line.
    pub line: usize,
    /// First line of the definition, trimmed.
    pub snippet: String,
}

/// One call expression attributed to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Raw textual call target as written (`obj.method`, `sanitize`).
    pub target: String,
    /// Resolved FQN; equals `target` when unresolved.
    pub target_fqn: String,
    /// Whether resolution succeeded.
    pub resolved: bool,
    /// 1-indexed call line (the caller's file is implied).
    pub line: usize,
}

/// Resolved call graph of a project.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CallGraph {
    /// Function FQN to node metadata.
    pub functions: FxHashMap<String, FunctionNode>,
    /// Caller FQN to sorted, deduplicated callee list.
    pub edges: FxHashMap<String, Vec<String>>,
    /// Callee FQN to sorted caller list.
    pub reverse_edges: FxHashMap<String, Vec<String>>,
    /// Caller FQN to its call sites, in source order.
    pub call_sites: FxHashMap<String, Vec<CallSite>>,
    /// Caller FQN to its intra-procedural taint summary.
    pub summaries: FxHashMap<String, TaintSummary>,
}

impl CallGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every function and method node of the syntactic graph,
    /// qualifying module-relative names with their module FQN.
    pub fn index_functions(&mut self, code: &CodeGraph, modules: &ModuleRegistry) {
        for node in &code.nodes {
            if !matches!(node.kind, NodeKind::Function | NodeKind::Method) {
                continue;
            }
            let Some(module) = modules.module_of(&node.file) else {
                continue;
            };
            let fqn = format!("{module}.{}", node.name);
            self.functions.entry(fqn.clone()).or_insert(FunctionNode {
                fqn,
                file: node.file.clone(),
                line: node.line,
                snippet: node.snippet.clone(),
            });
        }
    }

    /// Appends a call site under its caller.
    pub fn add_call_site(&mut self, caller: &str, site: CallSite) {
        self.call_sites.entry(caller.to_owned()).or_default().push(site);
    }

    /// Adds an edge; duplicates are suppressed.
    pub fn add_edge(&mut self, caller: &str, callee: &str) {
        let callees = self.edges.entry(caller.to_owned()).or_default();
        if !callees.iter().any(|c| c == callee) {
            callees.push(callee.to_owned());
        }
    }

    /// Stores a taint summary for a caller.
    pub fn add_summary(&mut self, caller: &str, summary: TaintSummary) {
        self.summaries.insert(caller.to_owned(), summary);
    }

    /// Sorts adjacency lists and rebuilds the reverse edge map. Must be
    /// called once after assembly; traversals rely on the ordering.
    pub fn finalize(&mut self) {
        for callees in self.edges.values_mut() {
            callees.sort();
            callees.dedup();
        }

        self.reverse_edges.clear();
        for (caller, callees) in &self.edges {
            for callee in callees {
                self.reverse_edges
                    .entry(callee.clone())
                    .or_default()
                    .push(caller.clone());
            }
        }
        for callers in self.reverse_edges.values_mut() {
            callers.sort();
            callers.dedup();
        }
    }

    /// Callees of a function.
    #[must_use]
    pub fn callees_of(&self, caller: &str) -> &[String] {
        self.edges.get(caller).map_or(&[], Vec::as_slice)
    }

    /// Callers of a function.
    #[must_use]
    pub fn callers_of(&self, callee: &str) -> &[String] {
        self.reverse_edges.get(callee).map_or(&[], Vec::as_slice)
    }

    /// Call sites attributed to a caller, in source order.
    #[must_use]
    pub fn sites_of(&self, caller: &str) -> &[CallSite] {
        self.call_sites.get(caller).map_or(&[], Vec::as_slice)
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}

/// Picks the caller FQN for a call at `line` in a file: among the
/// functions whose span contains the line, the one with the largest
/// start line (the innermost definition); else the module itself
/// (module-level code).
///
/// `functions` holds `(start_line, end_line, fqn)` triples for the
/// file, in any order.
#[must_use]
pub fn caller_for_line(
    functions: &[(usize, usize, String)],
    module_fqn: &str,
    line: usize,
) -> String {
    functions
        .iter()
        .filter(|(start, end, _)| *start <= line && line <= *end)
        .max_by_key(|(start, _, _)| *start)
        .map_or_else(|| module_fqn.to_owned(), |(_, _, fqn)| fqn.clone())
}
