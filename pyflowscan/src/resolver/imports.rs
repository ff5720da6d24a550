//! Per-file import maps: local name to fully qualified name.
//!
//! Extraction walks the parse tree's import statements once per file;
//! the resulting map is immutable and cached by absolute path. The
//! cache allows a losing concurrent extractor to discard its result:
//! the invariant is that all callers observe semantically equal maps,
//! not that extraction runs exactly once.

use crate::parser::{named_children_of, node_text, ParsedSource};
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::Node;

/// Local import bindings of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportMap {
    /// File the map was extracted from.
    pub file_path: PathBuf,
    /// Local name (as bound in the file) to FQN.
    pub imports: FxHashMap<String, String>,
}

impl ImportMap {
    /// Extracts the import map of a parsed file.
    ///
    /// `module_fqn` is the dotted name of the file itself, used to
    /// resolve relative imports (`from . import x`).
    #[must_use]
    pub fn extract(parsed: &ParsedSource, file_path: &Path, module_fqn: &str) -> Self {
        let mut imports = FxHashMap::default();

        for node in parsed.find_by_kind("import_statement") {
            collect_plain_import(node, &parsed.source, &mut imports);
        }
        for node in parsed.find_by_kind("import_from_statement") {
            collect_from_import(node, &parsed.source, module_fqn, &mut imports);
        }

        Self {
            file_path: file_path.to_path_buf(),
            imports,
        }
    }

    /// Looks up a bare local name.
    #[must_use]
    pub fn get(&self, local: &str) -> Option<&String> {
        self.imports.get(local)
    }

    /// Resolves a dotted target against the map by longest local-name
    /// prefix. Returns the expanded FQN plus the unmatched remainder.
    ///
    /// `import p.q` binds the local name `p.q`, so `p.q.func` matches
    /// the two-segment prefix and leaves `func` as the remainder.
    #[must_use]
    pub fn resolve_target(&self, target: &str) -> Option<(String, String)> {
        let parts: Vec<&str> = target.split('.').collect();
        for split in (1..=parts.len()).rev() {
            let prefix = parts[..split].join(".");
            if let Some(fqn) = self.imports.get(&prefix) {
                let rest = parts[split..].join(".");
                return Some((fqn.clone(), rest));
            }
        }
        None
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.imports.len()
    }

    /// True when the file has no imports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}

/// `import m`, `import m as a`, `import p.q`.
fn collect_plain_import(node: Node<'_>, source: &str, imports: &mut FxHashMap<String, String>) {
    for child in named_children_of(node) {
        match child.kind() {
            "dotted_name" => {
                let name = node_text(child, source).to_owned();
                imports.insert(name.clone(), name);
            }
            "aliased_import" => {
                if let (Some(name), Some(alias)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("alias"),
                ) {
                    imports.insert(
                        node_text(alias, source).to_owned(),
                        node_text(name, source).to_owned(),
                    );
                }
            }
            _ => {}
        }
    }
}

/// `from m import x [as a], y` and the relative forms.
fn collect_from_import(
    node: Node<'_>,
    source: &str,
    module_fqn: &str,
    imports: &mut FxHashMap<String, String>,
) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };

    let base = match module_node.kind() {
        "dotted_name" => node_text(module_node, source).to_owned(),
        "relative_import" => {
            let text = node_text(module_node, source);
            match resolve_relative(module_fqn, text) {
                Some(base) => base,
                None => return,
            }
        }
        _ => return,
    };

    for child in named_children_of(node) {
        // Skip the module_name node itself; remaining dotted names are
        // the imported members.
        if child == module_node {
            continue;
        }
        match child.kind() {
            "dotted_name" => {
                let member = node_text(child, source).to_owned();
                imports.insert(member.clone(), join_fqn(&base, &member));
            }
            "aliased_import" => {
                if let (Some(name), Some(alias)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("alias"),
                ) {
                    let member = node_text(name, source);
                    imports.insert(
                        node_text(alias, source).to_owned(),
                        join_fqn(&base, member),
                    );
                }
            }
            // `from m import *` binds nothing we can name statically.
            "wildcard_import" => {}
            _ => {}
        }
    }
}

fn join_fqn(base: &str, member: &str) -> String {
    if base.is_empty() {
        member.to_owned()
    } else {
        format!("{base}.{member}")
    }
}

/// Resolves the base module of a relative import.
///
/// In module `p.q`, one leading dot refers to the package `p`; each
/// further dot strips one more package level. A trailing dotted name
/// (`from .sibling import x`) is appended to the stripped base.
fn resolve_relative(module_fqn: &str, relative: &str) -> Option<String> {
    let dot_count = relative.chars().take_while(|c| *c == '.').count();
    let suffix = &relative[dot_count..];

    let parts: Vec<&str> = module_fqn.split('.').filter(|p| !p.is_empty()).collect();
    if dot_count > parts.len() {
        return None;
    }

    let parent_len = parts.len().saturating_sub(dot_count);
    let mut base_parts: Vec<&str> = parts[..parent_len].to_vec();
    if !suffix.is_empty() {
        base_parts.push(suffix);
    }

    Some(base_parts.join("."))
}

/// Thread-safe cache of extracted import maps, keyed by absolute path.
///
/// Entries are immutable once installed; the first writer wins and any
/// concurrently extracted duplicate is discarded.
#[derive(Debug, Default)]
pub struct ImportMapCache {
    maps: DashMap<PathBuf, Arc<ImportMap>>,
}

impl ImportMapCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached map for a path, if present.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<ImportMap>> {
        self.maps.get(path).map(|r| Arc::clone(r.value()))
    }

    /// Returns the cached map, extracting with `extract` on a miss.
    ///
    /// Concurrent callers for the same path may both run `extract`; the
    /// first inserted result wins and is what every caller receives.
    pub fn get_or_extract<F>(&self, path: &Path, extract: F) -> Arc<ImportMap>
    where
        F: FnOnce() -> ImportMap,
    {
        if let Some(cached) = self.get(path) {
            return cached;
        }

        let fresh = Arc::new(extract());
        let entry = self
            .maps
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&fresh));
        Arc::clone(entry.value())
    }

    /// Number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
