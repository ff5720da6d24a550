//! Degradation behavior: warnings are recorded, runs keep going.
#![allow(missing_docs)]

use pyflowscan::analyzer::Analyzer;
use pyflowscan::WarningCategory;
use std::fs;

#[test]
fn test_duplicate_module_fqn_warns_and_first_wins() {
    // pkg.py and pkg/__init__.py both derive the module FQN `pkg`.
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pkg.py"), "def from_file():\n    pass\n").unwrap();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(
        dir.path().join("pkg/__init__.py"),
        "def from_package():\n    pass\n",
    )
    .unwrap();

    let output = Analyzer::new().analyze(dir.path()).unwrap();

    assert!(output
        .warnings
        .iter()
        .any(|w| w.category == WarningCategory::Resolution && w.message.contains("pkg")));

    // Exactly one of the two definitions is indexed under pkg.*.
    let functions = &output.call_graph.functions;
    let indexed = usize::from(functions.contains_key("pkg.from_file"))
        + usize::from(functions.contains_key("pkg.from_package"));
    assert_eq!(indexed, 1);
}

#[test]
fn test_ambiguous_short_names_warn() {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["a", "b"] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
        fs::write(
            dir.path().join(sub).join("utils.py"),
            "def helper():\n    pass\n",
        )
        .unwrap();
    }

    let output = Analyzer::new().analyze(dir.path()).unwrap();
    assert!(output
        .warnings
        .iter()
        .any(|w| w.message.contains("short name utils")));
}

#[test]
fn test_failed_remote_catalog_warns_but_run_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".pyflowscan.toml"),
        "[pyflowscan]\nstdlib_base_url = \"http://127.0.0.1:1\"\nstdlib_timeout_secs = 1\n",
    )
    .unwrap();
    fs::write(dir.path().join("app.py"), "def run():\n    pass\n").unwrap();

    let config = pyflowscan::config::Config::load_from_path(dir.path());
    let output = Analyzer::with_config(config).analyze(dir.path()).unwrap();

    assert!(output
        .warnings
        .iter()
        .any(|w| w.category == WarningCategory::Network));
    assert!(output.call_graph.functions.contains_key("app.run"));
}

#[test]
fn test_missing_local_catalog_warns_but_run_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".pyflowscan.toml"),
        "[pyflowscan]\nstdlib_local_dir = \"/nonexistent/catalog\"\n",
    )
    .unwrap();
    fs::write(dir.path().join("app.py"), "def run():\n    pass\n").unwrap();

    let config = pyflowscan::config::Config::load_from_path(dir.path());
    let output = Analyzer::with_config(config).analyze(dir.path()).unwrap();

    assert!(output
        .warnings
        .iter()
        .any(|w| w.category == WarningCategory::Integrity));
    assert!(output.call_graph.functions.contains_key("app.run"));
}

#[test]
fn test_exclude_folders_from_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".pyflowscan.toml"),
        "[pyflowscan]\nexclude_folders = [\"generated\"]\n",
    )
    .unwrap();
    fs::write(dir.path().join("app.py"), "def run():\n    pass\n").unwrap();
    fs::create_dir_all(dir.path().join("generated")).unwrap();
    fs::write(
        dir.path().join("generated/out.py"),
        "def skipped():\n    pass\n",
    )
    .unwrap();

    let config = pyflowscan::config::Config::load_from_path(dir.path());
    let output = Analyzer::with_config(config).analyze(dir.path()).unwrap();

    assert!(output.call_graph.functions.contains_key("app.run"));
    assert!(!output
        .call_graph
        .functions
        .contains_key("generated.out.skipped"));
}

#[test]
fn test_include_tests_toggle() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".pyflowscan.toml"),
        "[pyflowscan]\ninclude_tests = false\n",
    )
    .unwrap();
    fs::write(dir.path().join("app.py"), "def run():\n    pass\n").unwrap();
    fs::write(
        dir.path().join("test_app.py"),
        "def test_run():\n    pass\n",
    )
    .unwrap();

    let config = pyflowscan::config::Config::load_from_path(dir.path());
    let output = Analyzer::with_config(config).analyze(dir.path()).unwrap();

    assert!(output.call_graph.functions.contains_key("app.run"));
    assert!(!output
        .call_graph
        .functions
        .contains_key("test_app.test_run"));
}
