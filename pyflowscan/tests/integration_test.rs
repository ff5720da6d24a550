//! End-to-end pipeline tests over fixture projects.
#![allow(missing_docs)]

use pyflowscan::analyzer::Analyzer;
use pyflowscan::callgraph::CallGraph;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn fixture(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    dir
}

fn analyze(files: &[(&str, &str)]) -> (pyflowscan::AnalysisOutput, TempDir) {
    let dir = fixture(files);
    let output = Analyzer::new().analyze(dir.path()).unwrap();
    (output, dir)
}

fn site<'g>(
    graph: &'g CallGraph,
    caller: &str,
    target: &str,
) -> &'g pyflowscan::CallSite {
    graph
        .sites_of(caller)
        .iter()
        .find(|s| s.target == target)
        .unwrap_or_else(|| panic!("no call site {target} in {caller}"))
}

#[test]
fn test_literal_flow_resolves_builtin_method() {
    let (output, _dir) = analyze(&[(
        "test.py",
        "def process_text():\n    data = \"hello world\"\n    uppercased = data.upper()\n    return uppercased\n",
    )]);

    let s = site(&output.call_graph, "test.process_text", "data.upper");
    assert!(s.resolved);
    assert_eq!(s.target_fqn, "builtins.str.upper");
}

#[test]
fn test_list_methods_resolve() {
    let (output, _dir) = analyze(&[(
        "test.py",
        "def collect():\n    numbers = [1, 2, 3]\n    numbers.append(4)\n    n = numbers.count(2)\n    return n\n",
    )]);

    let graph = &output.call_graph;
    assert_eq!(
        site(graph, "test.collect", "numbers.append").target_fqn,
        "builtins.list.append"
    );
    assert_eq!(
        site(graph, "test.collect", "numbers.count").target_fqn,
        "builtins.list.count"
    );
}

#[test]
fn test_factory_return_type_propagation() {
    let (output, _dir) = analyze(&[(
        "test.py",
        "class User:\n    def save(self):\n        pass\n\ndef create_user():\n    return User()\n\nuser = create_user()\nuser.save()\n",
    )]);

    let graph = &output.call_graph;
    // Module-level call through the factory's propagated return type.
    let s = site(graph, "test", "user.save");
    assert!(s.resolved);
    assert_eq!(s.target_fqn, "test.User.save");

    // The factory call itself resolves to the project function.
    let s = site(graph, "test", "create_user");
    assert!(s.resolved);
    assert_eq!(s.target_fqn, "test.create_user");
}

#[test]
fn test_local_module_shadows_stdlib_json() {
    let (output, _dir) = analyze(&[
        ("json.py", "def loads(data):\n    return {}\n"),
        ("app.py", "from json import loads\n\nloads('{}')\n"),
    ]);

    let s = site(&output.call_graph, "app", "loads");
    assert!(s.resolved);
    // The project's own json module wins over any framework rule.
    assert_eq!(s.target_fqn, "json.loads");
    assert!(output
        .call_graph
        .callees_of("app")
        .contains(&"json.loads".to_owned()));
}

#[test]
fn test_self_method_resolution() {
    let (output, _dir) = analyze(&[(
        "models.py",
        "class Account:\n    def close(self):\n        self.flush()\n\n    def flush(self):\n        pass\n",
    )]);

    let s = site(&output.call_graph, "models.Account.close", "self.flush");
    assert!(s.resolved);
    assert_eq!(s.target_fqn, "models.Account.flush");
}

#[test]
fn test_self_attribute_builtin_chain() {
    let (output, _dir) = analyze(&[(
        "models.py",
        "class Basket:\n    def __init__(self):\n        self.items = []\n\n    def add(self, thing):\n        self.items.append(thing)\n",
    )]);

    let s = site(&output.call_graph, "models.Basket.add", "self.items.append");
    assert!(s.resolved);
    assert_eq!(s.target_fqn, "builtins.list.append");
}

#[test]
fn test_every_edge_backed_by_resolved_site() {
    let (output, _dir) = analyze(&[
        (
            "app.py",
            "from helpers import greet\n\ndef main():\n    name = input()\n    greet(name)\n",
        ),
        ("helpers.py", "def greet(name):\n    print(name)\n"),
    ]);

    let graph = &output.call_graph;
    assert!(graph.edge_count() > 0);
    for (caller, callees) in &graph.edges {
        for callee in callees {
            let backed = graph
                .sites_of(caller)
                .iter()
                .any(|s| s.resolved && &s.target_fqn == callee);
            assert!(backed, "edge {caller} -> {callee} has no resolved site");
        }
    }
}

#[test]
fn test_unresolved_sites_produce_no_edges() {
    let (output, _dir) = analyze(&[(
        "app.py",
        "def main():\n    mystery_call()\n",
    )]);

    let graph = &output.call_graph;
    let s = site(graph, "app.main", "mystery_call");
    assert!(!s.resolved);
    assert_eq!(s.target_fqn, "mystery_call");
    assert!(graph.callees_of("app.main").is_empty());
}

#[test]
fn test_call_graph_serde_round_trip() {
    let (output, _dir) = analyze(&[
        (
            "app.py",
            "from helpers import greet\n\ndef main():\n    data = input()\n    greet(data)\n",
        ),
        ("helpers.py", "def greet(name):\n    eval(name)\n"),
    ]);

    let graph = &output.call_graph;
    let json = serde_json::to_string(graph).unwrap();
    let back: CallGraph = serde_json::from_str(&json).unwrap();

    assert_eq!(back.functions, graph.functions);
    assert_eq!(back.edges, graph.edges);
    assert_eq!(back.reverse_edges, graph.reverse_edges);
    assert_eq!(back.call_sites, graph.call_sites);
    assert_eq!(back.summaries.len(), graph.summaries.len());
}

#[test]
fn test_relative_import_resolution() {
    let (output, _dir) = analyze(&[
        ("pkg/__init__.py", ""),
        ("pkg/helpers.py", "def shout(text):\n    return text.upper()\n"),
        (
            "pkg/app.py",
            "from .helpers import shout\n\ndef run():\n    shout(\"hi\")\n",
        ),
    ]);

    let s = site(&output.call_graph, "pkg.app.run", "shout");
    assert!(s.resolved);
    assert_eq!(s.target_fqn, "pkg.helpers.shout");
}

#[test]
fn test_broken_file_does_not_abort_the_run() {
    let dir = fixture(&[
        ("good.py", "def fine():\n    pass\n"),
        ("bad.py", "def broken(:\n"),
    ]);
    let output = Analyzer::new().analyze(dir.path()).unwrap();
    assert!(output.call_graph.functions.contains_key("good.fine"));
}

#[test]
fn test_empty_project_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Analyzer::new().analyze(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        pyflowscan::AnalyzeError::NoModules(_)
    ));
}

#[test]
fn test_cancellation_aborts_run() {
    let dir = fixture(&[("app.py", "def main():\n    pass\n")]);
    let analyzer = Analyzer::new();
    analyzer.cancel();
    let err = analyzer.analyze(dir.path()).unwrap_err();
    assert!(matches!(err, pyflowscan::AnalyzeError::Cancelled));
}

#[test]
fn test_python_version_detection_flows_through() {
    let dir = fixture(&[
        ("app.py", "def main():\n    pass\n"),
        (".python-version", "3.12.1\n"),
    ]);
    let output = Analyzer::new().analyze(dir.path()).unwrap();
    assert_eq!(output.python_version, "3.12");
}

#[test]
fn test_duplicate_short_names_keep_both_modules() {
    let (output, dir) = analyze(&[
        ("a/utils.py", "def first():\n    pass\n"),
        ("b/utils.py", "def second():\n    pass\n"),
    ]);
    let _ = dir;
    let graph = &output.call_graph;
    assert!(graph.functions.contains_key("a.utils.first"));
    assert!(graph.functions.contains_key("b.utils.second"));
}

#[test]
fn test_run_stats() {
    let (output, _dir) = analyze(&[(
        "app.py",
        "class Box:\n    def __init__(self):\n        self.a = []\n\n    def poke(self):\n        self.a.b.c.run()\n        eval(\"1\")\n",
    )]);

    let stats = &output.stats;
    assert_eq!(stats.files_scanned, 1);
    assert_eq!(stats.functions_indexed, 2);
    assert!(stats.call_sites_total >= 2);
    assert!(stats.call_sites_resolved >= 1);
    // self.a.b.c.run is deliberately left unresolved and counted.
    assert_eq!(stats.deep_attribute_chains, 1);
    assert!(stats.call_sites_resolved <= stats.call_sites_total);
}

#[test]
fn test_function_nodes_carry_location_metadata() {
    let (output, dir) = analyze(&[(
        "app.py",
        "def main():\n    pass\n",
    )]);

    let node = output.call_graph.functions.get("app.main").unwrap();
    assert_eq!(node.line, 1);
    assert_eq!(node.snippet, "def main():");
    assert_eq!(node.file, dir.path().join("app.py"));
    assert!(Path::new(&node.file).ends_with("app.py"));
}
