//! The analysis orchestrator.
//!
//! Drives the three-pass pipeline: per-file extraction in parallel
//! (imports, variables, attributes, call sites, statement IR), the
//! global placeholder sweeps after a barrier, then call-site
//! resolution, graph assembly, taint summaries and pattern matching.

mod pipeline;

use crate::callgraph::CallGraph;
use crate::config::Config;
use crate::diagnostics::Warning;
use crate::patterns::{PatternMatch, PatternRegistry};
use crate::registry::stdlib::StdlibQuery;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fatal analysis errors. Everything else degrades into warnings.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The module registry could not be built at all.
    #[error("no Python modules found under {0}")]
    NoModules(PathBuf),
    /// The run was cancelled; partial results are discarded.
    #[error("analysis cancelled")]
    Cancelled,
}

/// Aggregate counters for one run, including structured resolution
/// failure stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisStats {
    /// Python files scanned.
    pub files_scanned: usize,
    /// Function and method nodes indexed into the call graph.
    pub functions_indexed: usize,
    /// Call sites extracted.
    pub call_sites_total: usize,
    /// Call sites the cascade resolved.
    pub call_sites_resolved: usize,
    /// `self.a.b...` chains deeper than two dots, left unresolved by
    /// policy rather than guessed at.
    pub deep_attribute_chains: usize,
}

/// Result of a full project analysis.
#[derive(Debug)]
pub struct AnalysisOutput {
    /// The resolved call graph with call sites and taint summaries.
    pub call_graph: CallGraph,
    /// Pattern matches, in pattern-catalog order.
    pub matches: Vec<PatternMatch>,
    /// Non-fatal problems encountered along the way.
    pub warnings: Vec<Warning>,
    /// Detected Python version (`major.minor`).
    pub python_version: String,
    /// Run counters.
    pub stats: AnalysisStats,
}

/// The analyzer. Configuration is read once at construction; a single
/// instance can analyze multiple roots.
pub struct Analyzer {
    /// Loaded configuration.
    pub config: Config,
    /// Folders to exclude beyond the defaults.
    pub exclude_folders: Vec<String>,
    /// Folders to force-include.
    pub include_folders: Vec<String>,
    /// Whether test files take part in the analysis.
    pub include_tests: bool,
    /// Injected stdlib catalog; when unset, one is built from the
    /// configuration (local directory or remote base URL).
    stdlib_override: Option<Box<dyn StdlibQuery>>,
    /// Cooperative cancellation flag, checked at file granularity.
    cancel: Arc<AtomicBool>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl Analyzer {
    /// Creates an analyzer with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an analyzer from a loaded configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let section = &config.pyflowscan;
        let exclude_folders = section.exclude_folders.clone().unwrap_or_default();
        let include_folders = section.include_folders.clone().unwrap_or_default();
        let include_tests = section.include_tests.unwrap_or(true);
        Self {
            config,
            exclude_folders,
            include_folders,
            include_tests,
            stdlib_override: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Injects a stdlib catalog, overriding the configured backends.
    #[must_use]
    pub fn with_stdlib(mut self, stdlib: Box<dyn StdlibQuery>) -> Self {
        self.stdlib_override = Some(stdlib);
        self
    }

    /// The cancellation flag; setting it makes in-flight extraction
    /// return promptly and the run end with [`AnalyzeError::Cancelled`].
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub(crate) fn stdlib_query(&self) -> Option<&dyn StdlibQuery> {
        self.stdlib_override.as_deref()
    }

    /// Builds the pattern catalog: defaults plus configured extras.
    #[must_use]
    pub fn pattern_registry(&self) -> PatternRegistry {
        let mut registry = PatternRegistry::with_defaults();
        for custom in &self.config.pyflowscan.patterns {
            registry.add(custom.to_pattern());
        }
        registry
    }
}
