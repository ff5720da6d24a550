//! Def-use chain properties and taint flow through control structures.
#![allow(missing_docs)]

use pyflowscan::analyzer::Analyzer;
use pyflowscan::parser::PyParser;
use pyflowscan::taint::{extract_statements, DefUseChain};
use std::fs;
use tempfile::TempDir;

fn chain_of(code: &str) -> DefUseChain {
    let mut parser = PyParser::new().unwrap();
    let parsed = parser.parse(code).unwrap();
    let body = parsed
        .find_by_kind("function_definition")
        .first()
        .and_then(|def| def.child_by_field_name("body"))
        .unwrap();
    let statements = extract_statements(body, &parsed);
    DefUseChain::build(&statements)
}

fn analyze(files: &[(&str, &str)]) -> (pyflowscan::AnalysisOutput, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    let output = Analyzer::new().analyze(dir.path()).unwrap();
    (output, dir)
}

#[test]
fn test_defined_iff_defs_nonempty() {
    let chain = chain_of(
        "def f():\n    a = 1\n    b = a + missing\n    print(b)\n",
    );

    for var in ["a", "b"] {
        assert_eq!(chain.is_defined(var), !chain.get_defs(var).is_empty());
        assert!(chain.is_defined(var));
    }
    assert!(!chain.is_defined("missing"));
    assert!(chain.is_used("missing"));

    let stats = chain.stats();
    assert_eq!(stats.undefined_variables, vec!["missing".to_owned()]);
}

#[test]
fn test_dead_variable_classification() {
    let chain = chain_of("def f():\n    kept = 1\n    dropped = 2\n    print(kept)\n");
    let stats = chain.stats();
    assert_eq!(stats.dead_variables, vec!["dropped".to_owned()]);
    assert!(!stats.undefined_variables.contains(&"kept".to_owned()));
}

#[test]
fn test_stats_counts() {
    let chain = chain_of(
        "def f():\n    x = 1\n    x = 2\n    y = x\n    z = x + y\n    print(z)\n",
    );
    let stats = chain.stats();
    assert_eq!(stats.max_defs_per_variable, 2);
    assert_eq!(stats.num_defs, 4);
    assert!(stats.num_uses >= 4);
    assert_eq!(stats.num_variables, 3);
}

#[test]
fn test_taint_through_for_loop() {
    let (output, _dir) = analyze(&[(
        "app.py",
        "def feed():\n    rows = input()\n    for row in rows:\n        eval(row)\n",
    )]);

    let summary = output.call_graph.summaries.get("app.feed").unwrap();
    assert_eq!(summary.detections.len(), 1);
    assert_eq!(summary.detections[0].source_var, "rows");
    assert_eq!(summary.detections[0].sink_call.as_deref(), Some("eval"));
    assert!(summary.tainted_vars.contains_key("row"));
}

#[test]
fn test_taint_through_augmented_assignment() {
    let (output, _dir) = analyze(&[(
        "app.py",
        "def build():\n    q = \"SELECT \"\n    q += input()\n    execute(q)\n",
    )]);

    let summary = output.call_graph.summaries.get("app.build").unwrap();
    assert_eq!(summary.detections.len(), 1);
    assert_eq!(summary.detections[0].sink_call.as_deref(), Some("execute"));

    // Surfaced as an intra-procedural SQL pattern match.
    let sql: Vec<_> = output
        .matches
        .iter()
        .filter(|m| m.pattern_id == "PFS-T002")
        .collect();
    assert_eq!(sql.len(), 1);
    assert!(sql[0].is_intra_procedural);
}

#[test]
fn test_taint_inside_try_block() {
    let (output, _dir) = analyze(&[(
        "app.py",
        "def guarded():\n    data = input()\n    try:\n        eval(data)\n    except Exception:\n        pass\n",
    )]);

    let summary = output.call_graph.summaries.get("app.guarded").unwrap();
    assert_eq!(summary.detections.len(), 1);
    assert_eq!(summary.detections[0].sink_line, Some(4));
}

#[test]
fn test_taint_in_conditional_branches() {
    let (output, _dir) = analyze(&[(
        "app.py",
        "def branchy(flag):\n    data = input()\n    if flag:\n        eval(data)\n    else:\n        print(data)\n",
    )]);

    let summary = output.call_graph.summaries.get("app.branchy").unwrap();
    assert_eq!(summary.detections.len(), 1);
}

#[test]
fn test_module_level_taint_summary() {
    let (output, _dir) = analyze(&[(
        "script.py",
        "data = input()\neval(data)\n",
    )]);

    // Module-level code owns a summary keyed by the module FQN.
    let summary = output.call_graph.summaries.get("script").unwrap();
    assert_eq!(summary.detections.len(), 1);

    let hits: Vec<_> = output
        .matches
        .iter()
        .filter(|m| m.pattern_id == "PFS-T001")
        .collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].data_flow_path, vec!["script".to_owned()]);
}

#[test]
fn test_clean_function_has_empty_summary() {
    let (output, _dir) = analyze(&[(
        "app.py",
        "def tidy():\n    x = 1\n    return x\n",
    )]);

    let summary = output.call_graph.summaries.get("app.tidy").unwrap();
    assert!(!summary.has_detections());
    assert!(summary.tainted_vars.is_empty());
}
