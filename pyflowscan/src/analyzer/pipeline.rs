//! The analysis passes.

use super::{AnalysisOutput, AnalysisStats, AnalyzeError, Analyzer};
use crate::callgraph::{caller_for_line, CallGraph, CallSite};
use crate::diagnostics::{Warning, WarningCategory};
use crate::graph::{CodeGraph, NodeKind};
use crate::inference::attributes::{extract_file_attributes, AttributeRegistry, ClassAttributes};
use crate::inference::engine::{extract_file, FileTypeExtraction, TypeInferenceEngine};
use crate::parser::{node_text, ParsedSource, PyParser};
use crate::patterns::run_patterns;
use crate::pyversion::detect_python_version;
use crate::registry::builtins::BuiltinRegistry;
use crate::registry::frameworks::FrameworkTable;
use crate::registry::modules::ModuleRegistry;
use crate::registry::stdlib::{LocalStdlibRegistry, StdlibQuery};
use crate::registry::stdlib_remote::{RemoteOptions, RemoteStdlibRegistry};
use crate::resolver::callsites::{extract_call_sites, RawCallSite};
use crate::resolver::imports::{ImportMap, ImportMapCache};
use crate::resolver::resolve::{CallResolver, CallerContext};
use crate::scanner::scan_file;
use crate::taint::{analyze_function, DefUseChain, Statement, TaintSpec};
use crate::utils::collect_python_files;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Everything one file contributes before the global reducers run.
struct FileProducts {
    file: PathBuf,
    module_fqn: String,
    code_graph: CodeGraph,
    attributes: Vec<ClassAttributes>,
    inference: FileTypeExtraction,
    call_sites: Vec<RawCallSite>,
    /// Function FQN to its statement IR; module-level statements are
    /// keyed by the module FQN itself.
    statements: FxHashMap<String, Vec<Statement>>,
    warnings: Vec<Warning>,
}

impl Analyzer {
    /// Runs the full pipeline over a project root.
    ///
    /// # Errors
    /// Fails only when no module registry can be built or the run is
    /// cancelled; per-file problems become warnings.
    pub fn analyze(&self, root: &Path) -> Result<AnalysisOutput, AnalyzeError> {
        let mut warnings = Vec::new();

        // Pass 0: discover files, modules, Python version.
        let mut files =
            collect_python_files(root, &self.exclude_folders, &self.include_folders);
        if !self.include_tests {
            files.retain(|f| !is_test_file(f));
        }

        let python_version = detect_python_version(root);
        let (modules, module_warnings) = ModuleRegistry::from_files(root, &files);
        warnings.extend(module_warnings);
        if modules.is_empty() {
            return Err(AnalyzeError::NoModules(root.to_path_buf()));
        }
        debug!(files = files.len(), modules = modules.len(), %python_version, "project indexed");

        let built_stdlib = self.build_stdlib(&python_version, &mut warnings);
        let stdlib: Option<&dyn StdlibQuery> =
            self.stdlib_query().or(built_stdlib.as_deref());

        let builtins = BuiltinRegistry::new();
        let frameworks = FrameworkTable::new();
        let import_cache = ImportMapCache::new();
        let attribute_registry = AttributeRegistry::new();

        // Pass 1: per-file extraction, in parallel. Workers observe the
        // cancellation flag at file granularity.
        let products: Vec<Option<FileProducts>> = files
            .par_iter()
            .map(|file| self.process_file(file, &modules, &builtins, &import_cache))
            .collect();

        if self.is_cancelled() {
            return Err(AnalyzeError::Cancelled);
        }

        // Barrier: merge per-file results single-threaded.
        let mut code_graph = CodeGraph::new();
        let mut engine = TypeInferenceEngine::new();
        let mut file_products = Vec::new();
        for mut product in products.into_iter().flatten() {
            warnings.append(&mut product.warnings);
            code_graph.merge(std::mem::take(&mut product.code_graph));
            for class in std::mem::take(&mut product.attributes) {
                attribute_registry.insert(class);
            }
            engine.merge(std::mem::take(&mut product.inference));
            file_products.push(product);
        }

        // Pass 2: placeholder sweeps, strictly after all extraction.
        engine.resolve_placeholders(&modules, &import_cache);
        let known_classes = qualified_fqns(&code_graph, &modules, NodeKind::Class);
        attribute_registry.resolve_placeholders(&modules, &known_classes, &engine);

        // Pass 3: resolve call sites and assemble the graph.
        let mut known_callables = known_classes.clone();
        known_callables.extend(qualified_fqns(&code_graph, &modules, NodeKind::Function));
        known_callables.extend(qualified_fqns(&code_graph, &modules, NodeKind::Method));

        let resolver = CallResolver {
            builtins: Some(&builtins),
            modules: &modules,
            frameworks: &frameworks,
            engine: Some(&engine),
            attributes: Some(&attribute_registry),
            stdlib,
            known_callables: &known_callables,
        };

        let mut graph = CallGraph::new();
        graph.index_functions(&code_graph, &modules);

        let mut stats = AnalysisStats {
            files_scanned: files.len(),
            ..AnalysisStats::default()
        };
        for product in &file_products {
            if self.is_cancelled() {
                return Err(AnalyzeError::Cancelled);
            }
            resolve_file_sites(
                product,
                &code_graph,
                &modules,
                &known_classes,
                &resolver,
                &import_cache,
                &mut graph,
                &mut stats,
            );
        }
        graph.finalize();
        stats.functions_indexed = graph.functions.len();

        // Pass 4: intra-procedural taint summaries.
        let registry = self.pattern_registry();
        let taint_spec = TaintSpec {
            sources: registry.all_sources(),
            sinks: registry.all_sinks(),
            sanitizers: registry.all_sanitizers(),
        };
        for product in &file_products {
            for (fqn, statements) in &product.statements {
                let chain = DefUseChain::build(statements);
                let summary = analyze_function(fqn, &chain, graph.sites_of(fqn), &taint_spec);
                graph.add_summary(fqn, summary);
            }
        }

        // Pass 5: pattern matching over the finalized graph.
        let matches = run_patterns(&graph, &registry);

        Ok(AnalysisOutput {
            call_graph: graph,
            matches,
            warnings,
            python_version,
            stats,
        })
    }

    /// Builds the configured stdlib backend: a bundled local directory
    /// wins over the remote CDN.
    fn build_stdlib(
        &self,
        python_version: &str,
        warnings: &mut Vec<Warning>,
    ) -> Option<Box<dyn StdlibQuery>> {
        if self.stdlib_query().is_some() {
            return None;
        }
        let section = &self.config.pyflowscan;

        if let Some(dir) = &section.stdlib_local_dir {
            match LocalStdlibRegistry::load(Path::new(dir)) {
                Ok(registry) => return Some(Box::new(registry)),
                Err(err) => {
                    warnings.push(Warning::new(
                        WarningCategory::Integrity,
                        format!("local stdlib catalog unavailable: {err}"),
                    ));
                }
            }
        }

        if let Some(base_url) = &section.stdlib_base_url {
            let options = RemoteOptions {
                timeout: section
                    .stdlib_timeout_secs
                    .map_or(crate::registry::stdlib_remote::DEFAULT_FETCH_TIMEOUT, Duration::from_secs),
                retry: section.stdlib_retry.unwrap_or(false),
            };
            let registry = RemoteStdlibRegistry::connect(base_url, python_version, options);
            if registry.is_failed() {
                warnings.push(Warning::new(
                    WarningCategory::Network,
                    format!("stdlib manifest fetch failed from {base_url}"),
                ));
            }
            return Some(Box::new(registry));
        }

        None
    }

    /// Pass-1 worker: parse one file and extract everything local to it.
    fn process_file(
        &self,
        file: &Path,
        modules: &ModuleRegistry,
        builtins: &BuiltinRegistry,
        import_cache: &ImportMapCache,
    ) -> Option<FileProducts> {
        if self.is_cancelled() {
            return None;
        }
        let module_fqn = modules.module_of(file)?.clone();
        let mut warnings = Vec::new();

        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                warn!(file = %file.display(), %err, "skipping unreadable file");
                warnings.push(Warning::for_path(
                    WarningCategory::Input,
                    format!("unreadable file: {err}"),
                    file,
                ));
                return Some(FileProducts::empty(file, module_fqn, warnings));
            }
        };

        let mut parser = match PyParser::new() {
            Ok(parser) => parser,
            Err(err) => {
                warnings.push(Warning::for_path(
                    WarningCategory::Input,
                    format!("parser unavailable: {err}"),
                    file,
                ));
                return Some(FileProducts::empty(file, module_fqn, warnings));
            }
        };
        let parsed = match parser.parse(&source) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(file = %file.display(), %err, "skipping unparseable file");
                warnings.push(Warning::for_path(
                    WarningCategory::Input,
                    format!("parse failed: {err}"),
                    file,
                ));
                return Some(FileProducts::empty(file, module_fqn, warnings));
            }
        };

        let import_map = import_cache
            .get_or_extract(file, || ImportMap::extract(&parsed, file, &module_fqn));

        let mut code_graph = CodeGraph::new();
        scan_file(&parsed, file, &mut code_graph);

        let attributes =
            extract_file_attributes(&parsed, file, &module_fqn, builtins, &import_map);
        let inference = extract_file(&parsed, file, &module_fqn, builtins, &import_map);
        let call_sites = extract_call_sites(&parsed);
        let statements = extract_function_statements(&parsed, &module_fqn);

        Some(FileProducts {
            file: file.to_path_buf(),
            module_fqn,
            code_graph,
            attributes,
            inference,
            call_sites,
            statements,
            warnings,
        })
    }

}

/// Pass-3 worker: resolves one file's call sites into the graph.
#[allow(clippy::too_many_arguments)]
fn resolve_file_sites(
    product: &FileProducts,
    code_graph: &CodeGraph,
    modules: &ModuleRegistry,
    known_classes: &FxHashSet<String>,
    resolver: &CallResolver<'_>,
    import_cache: &ImportMapCache,
    graph: &mut CallGraph,
    stats: &mut AnalysisStats,
) {
    let Some(import_map) = import_cache.get(&product.file) else {
        return;
    };

    // Function spans of this file, for caller attribution.
    let functions: Vec<(usize, usize, String)> = code_graph
        .nodes_in_file(&product.file)
        .into_iter()
        .filter(|n| matches!(n.kind, NodeKind::Function | NodeKind::Method))
        .filter_map(|n| {
            modules
                .module_of(&n.file)
                .map(|m| (n.line, n.end_line, format!("{m}.{}", n.name)))
        })
        .collect();

    for raw in &product.call_sites {
        let caller = caller_for_line(&functions, &product.module_fqn, raw.line);
        let class_fqn = enclosing_class(&caller, known_classes);
        let ctx = CallerContext {
            module_fqn: &product.module_fqn,
            caller_fqn: &caller,
            class_fqn: class_fqn.as_deref(),
            import_map: &import_map,
        };

        let resolution = resolver.resolve(&raw.target, &ctx);
        stats.call_sites_total += 1;
        if resolution.resolved {
            stats.call_sites_resolved += 1;
            graph.add_edge(&caller, &resolution.fqn);
        }
        if raw.target.starts_with("self.") && raw.target.matches('.').count() > 2 {
            stats.deep_attribute_chains += 1;
        }
        graph.add_call_site(
            &caller,
            CallSite {
                target: raw.target.clone(),
                target_fqn: resolution.fqn,
                resolved: resolution.resolved,
                line: raw.line,
            },
        );
    }
}

impl FileProducts {
    fn empty(file: &Path, module_fqn: String, warnings: Vec<Warning>) -> Self {
        Self {
            file: file.to_path_buf(),
            module_fqn,
            code_graph: CodeGraph::new(),
            attributes: Vec::new(),
            inference: FileTypeExtraction::default(),
            call_sites: Vec::new(),
            statements: FxHashMap::default(),
            warnings,
        }
    }
}

/// All node FQNs of one kind, qualified with their module.
fn qualified_fqns(
    code_graph: &CodeGraph,
    modules: &ModuleRegistry,
    kind: NodeKind,
) -> FxHashSet<String> {
    code_graph
        .nodes_of_kind(kind)
        .filter_map(|n| {
            modules
                .module_of(&n.file)
                .map(|m| format!("{m}.{}", n.name))
        })
        .collect()
}

/// The enclosing class of a method FQN, when its parent is a known
/// class (`m.User.save` -> `m.User`).
fn enclosing_class(caller: &str, known_classes: &FxHashSet<String>) -> Option<String> {
    let (parent, _) = caller.rsplit_once('.')?;
    known_classes.contains(parent).then(|| parent.to_owned())
}

/// Statement IR per function FQN, plus module-level statements keyed by
/// the module FQN.
fn extract_function_statements(
    parsed: &ParsedSource,
    module_fqn: &str,
) -> FxHashMap<String, Vec<Statement>> {
    use crate::taint::extract_statements;

    let mut out = FxHashMap::default();
    out.insert(
        module_fqn.to_owned(),
        extract_statements(parsed.root(), parsed),
    );

    for def in parsed.find_by_kind("function_definition") {
        let Some(dotted) = dotted_name_of(def, &parsed.source) else {
            continue;
        };
        let Some(body) = def.child_by_field_name("body") else {
            continue;
        };
        out.insert(
            format!("{module_fqn}.{dotted}"),
            extract_statements(body, parsed),
        );
    }
    out
}

/// Dotted in-module name of a definition, built by climbing enclosing
/// definitions (`User.save`, `outer.inner`).
fn dotted_name_of(def: tree_sitter::Node<'_>, source: &str) -> Option<String> {
    let name = node_text(def.child_by_field_name("name")?, source).to_owned();
    let mut parts = vec![name];

    let mut current = def;
    while let Some(parent) = current.parent() {
        if matches!(parent.kind(), "function_definition" | "class_definition") {
            if let Some(parent_name) = parent.child_by_field_name("name") {
                parts.push(node_text(parent_name, source).to_owned());
            }
        }
        current = parent;
    }

    parts.reverse();
    Some(parts.join("."))
}

/// Test-file heuristic used when tests are excluded from analysis.
fn is_test_file(path: &Path) -> bool {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.starts_with("test_")
        || stem.ends_with("_test")
        || path
            .components()
            .any(|c| c.as_os_str() == "tests" || c.as_os_str() == "test")
}
