//! Call-site extraction.
//!
//! Emits one raw site per call expression with the textual target as
//! written in the source. Resolution to FQNs happens separately in
//! [`crate::resolver::resolve`]; extraction is purely syntactic.

use crate::parser::{line_of, node_text, ParsedSource};
use serde::{Deserialize, Serialize};

/// An unresolved call expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCallSite {
    /// Textual call target (`sanitize`, `obj.method`, `a().b`).
    pub target: String,
    /// 1-indexed source line.
    pub line: usize,
}

/// Extracts every call expression of a parsed file, in document order
/// (outer calls of a chain precede their nested calls).
#[must_use]
pub fn extract_call_sites(parsed: &ParsedSource) -> Vec<RawCallSite> {
    parsed
        .find_by_kind("call")
        .into_iter()
        .filter_map(|call| {
            let function = call.child_by_field_name("function")?;
            let target = node_text(function, &parsed.source).trim().to_owned();
            if target.is_empty() {
                return None;
            }
            Some(RawCallSite {
                target,
                line: line_of(call),
            })
        })
        .collect()
}
