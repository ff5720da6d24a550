//! Function-name matching and path search over the call graph.

use rustc_hash::{FxHashMap, FxHashSet};

/// Matches an FQN against a pattern name.
///
/// A match requires one of:
/// - exact equality,
/// - `fqn` ends with `.pattern`,
/// - `fqn` starts with `pattern.`,
/// - the substring after the last dot equals `pattern` exactly.
///
/// The last-component rule is exact, never a prefix: `executor` does not
/// match `exec`.
#[must_use]
pub fn fqn_matches(fqn: &str, pattern: &str) -> bool {
    if fqn.is_empty() || pattern.is_empty() {
        return false;
    }
    if fqn == pattern {
        return true;
    }
    if fqn.len() > pattern.len() + 1 {
        if let Some(stripped) = fqn.strip_suffix(pattern) {
            if stripped.ends_with('.') {
                return true;
            }
        }
        if let Some(stripped) = fqn.strip_prefix(pattern) {
            if stripped.starts_with('.') {
                return true;
            }
        }
    }
    fqn.rsplit('.').next() == Some(pattern)
}

/// True when the FQN matches any of the pattern names.
#[must_use]
pub fn matches_any(fqn: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| fqn_matches(fqn, p))
}

/// Depth-first search for a path from `from` to `to` over an adjacency
/// map. Returns the first path found, including both endpoints; the
/// visited set is per-traversal and the path list is backtracked
/// explicitly, so cycles are safe.
#[must_use]
pub fn find_path(
    edges: &FxHashMap<String, Vec<String>>,
    from: &str,
    to: &str,
) -> Option<Vec<String>> {
    let mut visited = FxHashSet::default();
    let mut path = Vec::new();
    if dfs(edges, from, to, &mut visited, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn dfs(
    edges: &FxHashMap<String, Vec<String>>,
    current: &str,
    target: &str,
    visited: &mut FxHashSet<String>,
    path: &mut Vec<String>,
) -> bool {
    path.push(current.to_owned());
    if current == target {
        return true;
    }
    visited.insert(current.to_owned());

    if let Some(callees) = edges.get(current) {
        for callee in callees {
            if visited.contains(callee) {
                continue;
            }
            if dfs(edges, callee, target, visited, path) {
                return true;
            }
        }
    }

    path.pop();
    false
}
