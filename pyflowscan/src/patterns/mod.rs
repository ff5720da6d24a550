//! Pattern catalog and the matching engine over the resolved call
//! graph.
//!
//! Three pattern families are supported: dangerous functions (a single
//! flagged call), source-to-sink reachability, and source-to-sink
//! reachability with no sanitizer on the path. Matching is
//! deterministic: callers are visited in lexicographic order and the
//! path search is the first-path DFS from [`matcher`].

pub mod matcher;

use crate::callgraph::CallGraph;
use matcher::{find_path, fqn_matches, matches_any};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity levels for pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Immediate exploitation risk.
    Critical,
    /// Significant security risk.
    High,
    /// Potential security risk.
    Medium,
    /// Minor security concern.
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

/// Pattern family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternType {
    /// A source caller reaches a sink caller in the call graph.
    SourceSink,
    /// Same, but only when no sanitizer appears on the path.
    MissingSanitizer,
    /// Any call to a flagged function.
    DangerousFunction,
}

/// One vulnerability pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// Stable identifier, e.g. `PFS-D001`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Pattern family.
    pub pattern_type: PatternType,
    /// Severity of matches.
    pub severity: Severity,
    /// Source call names (matched against targets and FQNs).
    #[serde(default)]
    pub sources: Vec<String>,
    /// Sink call names.
    #[serde(default)]
    pub sinks: Vec<String>,
    /// Sanitizer call names.
    #[serde(default)]
    pub sanitizers: Vec<String>,
    /// Flagged functions for `DangerousFunction` patterns.
    #[serde(default)]
    pub dangerous_functions: Vec<String>,
    /// CWE identifier.
    pub cwe: String,
    /// OWASP category.
    pub owasp: String,
}

/// Catalog of patterns, populated deterministically at pipeline start.
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    patterns: Vec<Pattern>,
}

impl PatternRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add(Pattern {
            id: "PFS-D001".to_owned(),
            name: "Dangerous code execution".to_owned(),
            pattern_type: PatternType::DangerousFunction,
            severity: Severity::Critical,
            sources: Vec::new(),
            sinks: Vec::new(),
            sanitizers: Vec::new(),
            dangerous_functions: vec![
                "eval".to_owned(),
                "exec".to_owned(),
                "compile".to_owned(),
                "__import__".to_owned(),
            ],
            cwe: "CWE-94".to_owned(),
            owasp: "A03:2021".to_owned(),
        });
        registry.add(Pattern {
            id: "PFS-T001".to_owned(),
            name: "User input reaches code execution".to_owned(),
            pattern_type: PatternType::MissingSanitizer,
            severity: Severity::Critical,
            sources: vec!["input".to_owned(), "raw_input".to_owned()],
            sinks: vec!["eval".to_owned(), "exec".to_owned()],
            sanitizers: vec![
                "sanitize".to_owned(),
                "escape".to_owned(),
                "quote".to_owned(),
            ],
            dangerous_functions: Vec::new(),
            cwe: "CWE-95".to_owned(),
            owasp: "A03:2021".to_owned(),
        });
        registry.add(Pattern {
            id: "PFS-T002".to_owned(),
            name: "User input reaches SQL execution".to_owned(),
            pattern_type: PatternType::MissingSanitizer,
            severity: Severity::High,
            sources: vec!["input".to_owned(), "raw_input".to_owned()],
            sinks: vec![
                "execute".to_owned(),
                "executemany".to_owned(),
                "executescript".to_owned(),
            ],
            sanitizers: vec!["sanitize".to_owned(), "escape".to_owned()],
            dangerous_functions: Vec::new(),
            cwe: "CWE-89".to_owned(),
            owasp: "A03:2021".to_owned(),
        });
        registry.add(Pattern {
            id: "PFS-T003".to_owned(),
            name: "User input reaches OS command".to_owned(),
            pattern_type: PatternType::SourceSink,
            severity: Severity::High,
            sources: vec!["input".to_owned(), "raw_input".to_owned()],
            sinks: vec![
                "os.system".to_owned(),
                "os.popen".to_owned(),
                "subprocess.call".to_owned(),
                "subprocess.run".to_owned(),
                "subprocess.Popen".to_owned(),
            ],
            sanitizers: Vec::new(),
            dangerous_functions: Vec::new(),
            cwe: "CWE-78".to_owned(),
            owasp: "A03:2021".to_owned(),
        });
        registry.add(Pattern {
            id: "PFS-D002".to_owned(),
            name: "Insecure deserialization".to_owned(),
            pattern_type: PatternType::DangerousFunction,
            severity: Severity::High,
            sources: Vec::new(),
            sinks: Vec::new(),
            sanitizers: Vec::new(),
            dangerous_functions: vec![
                "pickle.loads".to_owned(),
                "pickle.load".to_owned(),
                "marshal.loads".to_owned(),
                "yaml.load".to_owned(),
            ],
            cwe: "CWE-502".to_owned(),
            owasp: "A08:2021".to_owned(),
        });
        registry
    }

    /// Adds a pattern.
    pub fn add(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    /// Registered patterns, in insertion order.
    #[must_use]
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Union of all source names across patterns.
    #[must_use]
    pub fn all_sources(&self) -> Vec<String> {
        collect_names(&self.patterns, |p| &p.sources)
    }

    /// Union of all sink names across patterns.
    #[must_use]
    pub fn all_sinks(&self) -> Vec<String> {
        collect_names(&self.patterns, |p| &p.sinks)
    }

    /// Union of all sanitizer names across patterns.
    #[must_use]
    pub fn all_sanitizers(&self) -> Vec<String> {
        collect_names(&self.patterns, |p| &p.sanitizers)
    }
}

fn collect_names<'p, F>(patterns: &'p [Pattern], pick: F) -> Vec<String>
where
    F: Fn(&'p Pattern) -> &'p Vec<String>,
{
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for pattern in patterns {
        for name in pick(pattern) {
            if seen.insert(name.clone()) {
                out.push(name.clone());
            }
        }
    }
    out
}

/// A pattern match over the call graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Matching pattern id.
    pub pattern_id: String,
    /// Matching pattern name.
    pub pattern_name: String,
    /// Severity of the pattern.
    pub severity: Severity,
    /// CWE identifier.
    pub cwe: String,
    /// OWASP category.
    pub owasp: String,
    /// Caller containing the source.
    pub source_fqn: String,
    /// The source call (or tainted variable for intra matches).
    pub source_call: String,
    /// File of the source caller.
    pub source_file: PathBuf,
    /// Line of the source.
    pub source_line: usize,
    /// Snippet of the source caller definition.
    pub source_snippet: String,
    /// Caller containing the sink (or the flagged callee).
    pub sink_fqn: String,
    /// The sink call.
    pub sink_call: String,
    /// File of the sink caller.
    pub sink_file: PathBuf,
    /// Line of the sink.
    pub sink_line: usize,
    /// Snippet of the sink caller definition.
    pub sink_snippet: String,
    /// Caller sequence from source to sink; never empty.
    pub data_flow_path: Vec<String>,
    /// True when the whole flow is inside one function.
    pub is_intra_procedural: bool,
}

/// Runs every pattern of a registry over a finalized call graph.
#[must_use]
pub fn run_patterns(graph: &CallGraph, registry: &PatternRegistry) -> Vec<PatternMatch> {
    let mut matches = Vec::new();
    for pattern in registry.patterns() {
        match pattern.pattern_type {
            PatternType::DangerousFunction => {
                match_dangerous(graph, pattern, &mut matches);
            }
            PatternType::SourceSink => {
                match_source_sink(graph, pattern, false, &mut matches);
            }
            PatternType::MissingSanitizer => {
                match_source_sink(graph, pattern, true, &mut matches);
            }
        }
    }
    matches
}

/// A caller plus the first site that matched a name list.
struct CallerHit {
    caller: String,
    fqn: String,
    line: usize,
}

fn sorted_callers(graph: &CallGraph) -> Vec<&String> {
    let mut callers: Vec<&String> = graph.call_sites.keys().collect();
    callers.sort();
    callers
}

fn first_matching_site(graph: &CallGraph, caller: &str, names: &[String]) -> Option<CallerHit> {
    for site in graph.sites_of(caller) {
        if matches_any(&site.target_fqn, names) || matches_any(&site.target, names) {
            return Some(CallerHit {
                caller: caller.to_owned(),
                fqn: site.target_fqn.clone(),
                line: site.line,
            });
        }
    }
    None
}

fn match_dangerous(graph: &CallGraph, pattern: &Pattern, out: &mut Vec<PatternMatch>) {
    for caller in sorted_callers(graph) {
        for site in graph.sites_of(caller) {
            let hit = matches_any(&site.target_fqn, &pattern.dangerous_functions)
                || matches_any(&site.target, &pattern.dangerous_functions);
            if !hit {
                continue;
            }
            let (file, _, snippet) = caller_meta(graph, caller);
            out.push(PatternMatch {
                pattern_id: pattern.id.clone(),
                pattern_name: pattern.name.clone(),
                severity: pattern.severity,
                cwe: pattern.cwe.clone(),
                owasp: pattern.owasp.clone(),
                source_fqn: caller.clone(),
                source_call: site.target.clone(),
                source_file: file.clone(),
                source_line: site.line,
                source_snippet: snippet.clone(),
                sink_fqn: site.target_fqn.clone(),
                sink_call: site.target.clone(),
                sink_file: file,
                sink_line: site.line,
                sink_snippet: snippet,
                data_flow_path: vec![caller.clone(), site.target_fqn.clone()],
                is_intra_procedural: false,
            });
        }
    }
}

fn match_source_sink(
    graph: &CallGraph,
    pattern: &Pattern,
    require_unsanitized: bool,
    out: &mut Vec<PatternMatch>,
) {
    let callers = sorted_callers(graph);

    let source_hits: Vec<CallerHit> = callers
        .iter()
        .filter_map(|c| first_matching_site(graph, c, &pattern.sources))
        .collect();
    let sink_hits: Vec<CallerHit> = callers
        .iter()
        .filter_map(|c| first_matching_site(graph, c, &pattern.sinks))
        .collect();

    let sanitizer_callers: FxHashSet<&String> = if require_unsanitized {
        callers
            .iter()
            .filter(|c| first_matching_site(graph, c, &pattern.sanitizers).is_some())
            .copied()
            .collect()
    } else {
        FxHashSet::default()
    };

    for source in &source_hits {
        for sink in &sink_hits {
            if source.caller == sink.caller {
                if require_unsanitized {
                    emit_intra_match(graph, pattern, &source.caller, out);
                } else if let Some(path) = find_path(&graph.edges, &source.caller, &sink.caller) {
                    emit_path_match(graph, pattern, source, sink, path, out);
                }
                continue;
            }

            let Some(path) = find_path(&graph.edges, &source.caller, &sink.caller) else {
                continue;
            };
            if path.is_empty() {
                continue;
            }
            if require_unsanitized {
                if path.len() < 2 {
                    continue;
                }
                let sanitized = path.iter().any(|hop| {
                    sanitizer_callers.contains(hop)
                        || pattern.sanitizers.iter().any(|s| fqn_matches(hop, s))
                });
                if sanitized {
                    continue;
                }
            }
            emit_path_match(graph, pattern, source, sink, path, out);
        }
    }
}

fn emit_path_match(
    graph: &CallGraph,
    pattern: &Pattern,
    source: &CallerHit,
    sink: &CallerHit,
    path: Vec<String>,
    out: &mut Vec<PatternMatch>,
) {
    let (source_file, _, source_snippet) = caller_meta(graph, &source.caller);
    let (sink_file, _, sink_snippet) = caller_meta(graph, &sink.caller);
    out.push(PatternMatch {
        pattern_id: pattern.id.clone(),
        pattern_name: pattern.name.clone(),
        severity: pattern.severity,
        cwe: pattern.cwe.clone(),
        owasp: pattern.owasp.clone(),
        source_fqn: source.caller.clone(),
        source_call: source.fqn.clone(),
        source_file,
        source_line: source.line,
        source_snippet,
        sink_fqn: sink.caller.clone(),
        sink_call: sink.fqn.clone(),
        sink_file,
        sink_line: sink.line,
        sink_snippet,
        data_flow_path: path,
        is_intra_procedural: false,
    });
}

/// Same-function source and sink: consult the taint summary instead of
/// the call graph.
fn emit_intra_match(
    graph: &CallGraph,
    pattern: &Pattern,
    caller: &str,
    out: &mut Vec<PatternMatch>,
) {
    let Some(summary) = graph.summaries.get(caller) else {
        return;
    };
    let Some(detection) = summary.detections.iter().find(|det| {
        pattern.sinks.is_empty()
            || det
                .sink_call
                .as_deref()
                .is_some_and(|sink| matches_any(sink, &pattern.sinks))
    }) else {
        return;
    };

    let (file, _, snippet) = caller_meta(graph, caller);
    out.push(PatternMatch {
        pattern_id: pattern.id.clone(),
        pattern_name: pattern.name.clone(),
        severity: pattern.severity,
        cwe: pattern.cwe.clone(),
        owasp: pattern.owasp.clone(),
        source_fqn: caller.to_owned(),
        source_call: detection.source_var.clone(),
        source_file: file.clone(),
        source_line: detection.source_line,
        source_snippet: snippet.clone(),
        sink_fqn: caller.to_owned(),
        sink_call: detection.sink_call.clone().unwrap_or_default(),
        sink_file: file,
        sink_line: detection.sink_line.unwrap_or_default(),
        sink_snippet: snippet,
        data_flow_path: vec![caller.to_owned()],
        is_intra_procedural: true,
    });
}

/// File, line and snippet of a caller; module-level callers have no
/// function node and yield empty metadata.
fn caller_meta(graph: &CallGraph, caller: &str) -> (PathBuf, usize, String) {
    graph.functions.get(caller).map_or_else(
        || (PathBuf::new(), 0, String::new()),
        |node| (node.file.clone(), node.line, node.snippet.clone()),
    )
}
