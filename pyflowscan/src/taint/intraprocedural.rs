//! Intra-procedural taint analysis.
//!
//! Forward flow over the flattened statement list of one function:
//! sources taint their defined variable, assignments propagate taint,
//! sanitizers strip or flag it, sinks record detections. Taint never
//! crosses a function boundary here; the pattern engine combines these
//! summaries with call-graph paths.

use super::defuse::DefUseChain;
use super::ir::Statement;
use crate::callgraph::CallSite;
use crate::patterns::matcher::matches_any;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// A single taint fact: where a value became tainted and, for
/// detections, where it reached a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaintInfo {
    /// Line where the taint was introduced.
    pub source_line: usize,
    /// Variable that first carried the taint.
    pub source_var: String,
    /// Sink line, for detections.
    pub sink_line: Option<usize>,
    /// Sink call target, for detections.
    pub sink_call: Option<String>,
    /// Confidence of the fact, in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// Per-function taint result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaintSummary {
    /// FQN of the analyzed function.
    pub function_fqn: String,
    /// Variables that were tainted at any point, with their facts.
    pub tainted_vars: FxHashMap<String, Vec<TaintInfo>>,
    /// Source-reaches-sink detections, in source order.
    pub detections: Vec<TaintInfo>,
}

impl TaintSummary {
    /// Creates an empty summary for a function.
    #[must_use]
    pub fn new(function_fqn: impl Into<String>) -> Self {
        Self {
            function_fqn: function_fqn.into(),
            tainted_vars: FxHashMap::default(),
            detections: Vec::new(),
        }
    }

    /// True when any sink was reached by tainted data.
    #[must_use]
    pub fn has_detections(&self) -> bool {
        !self.detections.is_empty()
    }
}

/// Forward taint state while walking a function.
#[derive(Debug, Default, Clone)]
struct TaintState {
    /// Currently tainted variables.
    tainted: FxHashMap<String, Vec<TaintInfo>>,
    /// Variables carrying sanitized values; not flagged at sinks.
    sanitized: FxHashSet<String>,
}

impl TaintState {
    fn mark(&mut self, var: &str, info: TaintInfo) {
        self.sanitized.remove(var);
        self.tainted.entry(var.to_owned()).or_default().push(info);
    }

    fn clear(&mut self, var: &str) {
        self.tainted.remove(var);
        self.sanitized.remove(var);
    }

    /// First tainted, unsanitized variable read by a statement.
    fn first_tainted_use(&self, stmt: &Statement) -> Option<&TaintInfo> {
        for used in &stmt.uses {
            if self.sanitized.contains(used.as_str()) {
                continue;
            }
            if let Some(info) = self.tainted.get(used.as_str()).and_then(|infos| infos.first()) {
                return Some(info);
            }
        }
        None
    }
}

/// Name lists matched against call targets and resolved FQNs.
#[derive(Debug, Clone, Default)]
pub struct TaintSpec {
    /// Calls that introduce untrusted data.
    pub sources: Vec<String>,
    /// Calls that dangerously consume data.
    pub sinks: Vec<String>,
    /// Calls that cleanse data.
    pub sanitizers: Vec<String>,
}

/// Runs forward taint over a function's flattened statements.
///
/// `call_sites` supplies the resolved FQN for each call (matched by line
/// and textual target) so names can be matched at both levels.
#[must_use]
pub fn analyze_function(
    function_fqn: &str,
    chain: &DefUseChain,
    call_sites: &[CallSite],
    spec: &TaintSpec,
) -> TaintSummary {
    let mut summary = TaintSummary::new(function_fqn);
    let mut state = TaintState::default();

    for stmt in chain.statements() {
        process_statement(stmt, call_sites, spec, &mut state, &mut summary);
        // Record every variable that was tainted at any point, even if
        // later cleared, so summaries expose the full history.
        for (var, infos) in &state.tainted {
            let entry = summary.tainted_vars.entry(var.clone()).or_default();
            for info in infos {
                if !entry.contains(info) {
                    entry.push(info.clone());
                }
            }
        }
    }

    summary
}

fn process_statement(
    stmt: &Statement,
    call_sites: &[CallSite],
    spec: &TaintSpec,
    state: &mut TaintState,
    summary: &mut TaintSummary,
) {
    let call_names = stmt.call_target.as_ref().map(|target| {
        let fqn = resolved_fqn(call_sites, stmt.line, target);
        (target.clone(), fqn)
    });

    // Source call: the defined variable becomes tainted.
    if let Some((target, fqn)) = &call_names {
        if name_matches(target, fqn.as_deref(), &spec.sources) {
            if let Some(def) = &stmt.def {
                state.mark(
                    def,
                    TaintInfo {
                        source_line: stmt.line,
                        source_var: def.clone(),
                        sink_line: None,
                        sink_call: None,
                        confidence: 1.0,
                    },
                );
            }
            return;
        }
    }

    // Sanitizer call over tainted input.
    if let Some((target, fqn)) = &call_names {
        if name_matches(target, fqn.as_deref(), &spec.sanitizers) {
            if state.first_tainted_use(stmt).is_some() {
                if let Some(def) = &stmt.def {
                    if stmt.uses.contains(def) {
                        // Pure sanitizer: x = sanitize(x) strips taint.
                        state.clear(def);
                    } else {
                        // Sanitized copy: flagged, not tainted at sinks.
                        state.clear(def);
                        state.sanitized.insert(def.clone());
                    }
                    return;
                }
            }
        }
    }

    // Sink call over tainted, unsanitized input.
    if let Some((target, fqn)) = &call_names {
        if name_matches(target, fqn.as_deref(), &spec.sinks) {
            if let Some(info) = state.first_tainted_use(stmt) {
                summary.detections.push(TaintInfo {
                    source_line: info.source_line,
                    source_var: info.source_var.clone(),
                    sink_line: Some(stmt.line),
                    sink_call: Some(target.clone()),
                    confidence: info.confidence,
                });
            }
        }
    }

    // Propagation and redefinition.
    if let Some(def) = &stmt.def {
        let inherited = state.first_tainted_use(stmt).cloned();
        match inherited {
            Some(info) => {
                state.mark(
                    def,
                    TaintInfo {
                        source_line: info.source_line,
                        source_var: info.source_var,
                        sink_line: None,
                        sink_call: None,
                        confidence: info.confidence,
                    },
                );
            }
            None => {
                let uses_sanitized = stmt.uses.iter().any(|u| state.sanitized.contains(u));
                // A redefinition from untainted input clears prior taint.
                state.clear(def);
                if uses_sanitized {
                    state.sanitized.insert(def.clone());
                }
            }
        }
    }
}

fn resolved_fqn(call_sites: &[CallSite], line: usize, target: &str) -> Option<String> {
    call_sites
        .iter()
        .find(|site| site.line == line && site.target == target)
        .map(|site| site.target_fqn.clone())
}

fn name_matches(target: &str, fqn: Option<&str>, patterns: &[String]) -> bool {
    if matches_any(target, patterns) {
        return true;
    }
    fqn.is_some_and(|f| matches_any(f, patterns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PyParser;
    use crate::taint::ir::extract_statements;

    fn analyze(code: &str, spec: &TaintSpec) -> TaintSummary {
        let mut parser = PyParser::new().unwrap();
        let parsed = parser.parse(code).unwrap();
        let body = parsed.find_by_kind("function_definition")[0]
            .child_by_field_name("body")
            .unwrap();
        let stmts = extract_statements(body, &parsed);
        let chain = DefUseChain::build(&stmts);
        analyze_function("test.f", &chain, &[], spec)
    }

    fn spec() -> TaintSpec {
        TaintSpec {
            sources: vec!["input".to_owned()],
            sinks: vec!["eval".to_owned(), "execute".to_owned()],
            sanitizers: vec!["sanitize".to_owned()],
        }
    }

    #[test]
    fn test_source_to_sink_detection() {
        let summary = analyze(
            "def f():\n    data = input()\n    eval(data)\n",
            &spec(),
        );
        assert_eq!(summary.detections.len(), 1);
        let det = &summary.detections[0];
        assert_eq!(det.source_var, "data");
        assert_eq!(det.source_line, 2);
        assert_eq!(det.sink_line, Some(3));
        assert_eq!(det.sink_call.as_deref(), Some("eval"));
    }

    #[test]
    fn test_propagation_through_assignment() {
        let summary = analyze(
            "def f():\n    data = input()\n    copy = data\n    eval(copy)\n",
            &spec(),
        );
        assert_eq!(summary.detections.len(), 1);
        assert_eq!(summary.detections[0].source_var, "data");
        assert!(summary.tainted_vars.contains_key("copy"));
    }

    #[test]
    fn test_pure_sanitizer_strips_taint() {
        let summary = analyze(
            "def f():\n    data = input()\n    data = sanitize(data)\n    eval(data)\n",
            &spec(),
        );
        assert!(summary.detections.is_empty());
    }

    #[test]
    fn test_sanitized_copy_not_flagged() {
        let summary = analyze(
            "def f():\n    data = input()\n    clean = sanitize(data)\n    eval(clean)\n",
            &spec(),
        );
        assert!(summary.detections.is_empty());
    }

    #[test]
    fn test_original_still_tainted_after_copy_sanitize() {
        let summary = analyze(
            "def f():\n    data = input()\n    clean = sanitize(data)\n    eval(data)\n",
            &spec(),
        );
        assert_eq!(summary.detections.len(), 1);
    }

    #[test]
    fn test_redefinition_clears_taint() {
        let summary = analyze(
            "def f():\n    data = input()\n    data = \"fixed\"\n    eval(data)\n",
            &spec(),
        );
        assert!(summary.detections.is_empty());
    }

    #[test]
    fn test_taint_through_fstring() {
        let summary = analyze(
            "def f():\n    uid = input()\n    q = f\"SELECT {uid}\"\n    execute(q)\n",
            &spec(),
        );
        assert_eq!(summary.detections.len(), 1);
        assert_eq!(summary.detections[0].source_var, "uid");
    }

    #[test]
    fn test_untainted_sink_is_quiet() {
        let summary = analyze("def f():\n    eval(\"1 + 1\")\n", &spec());
        assert!(summary.detections.is_empty());
    }
}
