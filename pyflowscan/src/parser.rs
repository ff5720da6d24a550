//! Tree-sitter based parser for Python source code.
//!
//! Everything downstream of this module works on `tree_sitter::Node`
//! handles plus the original source text; byte ranges come straight from
//! the grammar, so reported lines are exact.

use tree_sitter::{Node, Parser, Tree};

/// Error during parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to create parser for the Python grammar.
    #[error("Failed to create Python parser: {0}")]
    ParserCreation(String),
    /// The parser returned no tree (timeout or cancellation).
    #[error("Failed to parse source as Python")]
    ParseFailed,
}

/// A parsed Python source file.
///
/// Owns both the syntax tree and the source it was parsed from, so node
/// text can always be recovered.
#[derive(Debug)]
pub struct ParsedSource {
    /// The tree-sitter syntax tree.
    pub tree: Tree,
    /// Original source code.
    pub source: String,
}

impl ParsedSource {
    /// Returns the root node of the tree.
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Returns the source text covered by a node.
    #[must_use]
    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }

    /// Finds all nodes of a given kind, in document order.
    #[must_use]
    pub fn find_by_kind<'t>(&'t self, kind: &str) -> Vec<Node<'t>> {
        let mut result = Vec::new();
        collect_by_kind(self.root(), kind, &mut result);
        result
    }
}

/// Tree-sitter based Python parser.
pub struct PyParser {
    parser: Parser,
}

impl PyParser {
    /// Creates a new parser for the Python grammar.
    ///
    /// # Errors
    /// Returns an error if the grammar cannot be loaded.
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();

        // Use the LANGUAGE constant exported by tree-sitter-python crate
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParseError::ParserCreation(e.to_string()))?;

        Ok(Self { parser })
    }

    /// Parses source code into a [`ParsedSource`].
    ///
    /// # Errors
    /// Returns an error if parsing fails outright. Syntax errors inside
    /// the file do not fail the parse; tree-sitter produces error nodes
    /// and the extractors simply skip them.
    pub fn parse(&mut self, source: &str) -> Result<ParsedSource, ParseError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or(ParseError::ParseFailed)?;

        Ok(ParsedSource {
            tree,
            source: source.to_owned(),
        })
    }
}

/// Returns the 1-indexed line number of a node.
#[must_use]
pub fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Returns the source text of a node.
#[must_use]
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

/// Collects the direct children of a node.
#[must_use]
pub fn children_of(node: Node<'_>) -> Vec<Node<'_>> {
    (0..u32::try_from(node.child_count()).unwrap_or(u32::MAX)).filter_map(|i| node.child(i)).collect()
}

/// Collects the named children of a node (skipping punctuation).
#[must_use]
pub fn named_children_of(node: Node<'_>) -> Vec<Node<'_>> {
    (0..u32::try_from(node.named_child_count()).unwrap_or(u32::MAX))
        .filter_map(|i| node.named_child(i))
        .collect()
}

fn collect_by_kind<'t>(node: Node<'t>, kind: &str, result: &mut Vec<Node<'t>>) {
    if node.kind() == kind {
        result.push(node);
    }
    for child in children_of(node) {
        collect_by_kind(child, kind, result);
    }
}

/// Strips a decorated definition down to the wrapped definition node.
///
/// The Python grammar nests `function_definition` / `class_definition`
/// inside a `decorated_definition` when decorators are present.
#[must_use]
pub fn unwrap_decorated(node: Node<'_>) -> Node<'_> {
    if node.kind() == "decorated_definition" {
        if let Some(def) = node.child_by_field_name("definition") {
            return def;
        }
    }
    node
}
