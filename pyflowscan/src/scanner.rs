//! Builds the syntactic code graph from parsed files.
//!
//! The scanner records function, method, class and import nodes with
//! their module-relative dotted names (`User.save`, `outer.inner`); the
//! call-graph assembler later qualifies them with the module FQN.

use crate::graph::{CodeGraph, NodeKind};
use crate::parser::{line_of, named_children_of, node_text, unwrap_decorated, ParsedSource};
use std::path::Path;
use tree_sitter::Node;

/// Scans one parsed file into graph nodes.
pub fn scan_file(parsed: &ParsedSource, file: &Path, graph: &mut CodeGraph) {
    let mut prefix: Vec<String> = Vec::new();
    scan_block(parsed.root(), parsed, file, graph, &mut prefix, false);
}

fn scan_block(
    node: Node<'_>,
    parsed: &ParsedSource,
    file: &Path,
    graph: &mut CodeGraph,
    prefix: &mut Vec<String>,
    in_class: bool,
) {
    for child in named_children_of(node) {
        let child = unwrap_decorated(child);
        match child.kind() {
            "function_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, &parsed.source).to_owned();
                prefix.push(name);
                let dotted = prefix.join(".");
                let kind = if in_class {
                    NodeKind::Method
                } else {
                    NodeKind::Function
                };
                graph.push(
                    kind,
                    dotted,
                    file.to_path_buf(),
                    line_of(child),
                    end_line_of(child),
                    snippet_of(child, &parsed.source),
                );
                if let Some(body) = child.child_by_field_name("body") {
                    scan_block(body, parsed, file, graph, prefix, false);
                }
                prefix.pop();
            }
            "class_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, &parsed.source).to_owned();
                prefix.push(name);
                graph.push(
                    NodeKind::Class,
                    prefix.join("."),
                    file.to_path_buf(),
                    line_of(child),
                    end_line_of(child),
                    snippet_of(child, &parsed.source),
                );
                if let Some(body) = child.child_by_field_name("body") {
                    scan_block(body, parsed, file, graph, prefix, true);
                }
                prefix.pop();
            }
            "import_statement" | "import_from_statement" => {
                graph.push(
                    NodeKind::Import,
                    node_text(child, &parsed.source).to_owned(),
                    file.to_path_buf(),
                    line_of(child),
                    end_line_of(child),
                    snippet_of(child, &parsed.source),
                );
            }
            // Control flow at module level can still nest definitions.
            "if_statement" | "try_statement" | "while_statement" | "for_statement"
            | "with_statement" | "block" | "else_clause" | "elif_clause" | "except_clause"
            | "finally_clause" => {
                scan_block(child, parsed, file, graph, prefix, in_class);
            }
            _ => {}
        }
    }
}

fn end_line_of(node: Node<'_>) -> usize {
    node.end_position().row + 1
}

fn snippet_of(node: Node<'_>, source: &str) -> String {
    node_text(node, source)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_owned()
}
