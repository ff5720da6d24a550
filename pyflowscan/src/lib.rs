//! Core library of pyflowscan, a static call-graph and taint-flow
//! analyzer for Python source trees.
//!
//! The crate turns a directory of Python files into a semantically
//! resolved call graph (callers to callees at fully-qualified-name
//! level), per-function intra-procedural taint summaries, and pattern
//! matches for source-to-sink flows lacking sanitization.

// Allow common complexity warnings - these are intentional design choices
#![allow(
    clippy::type_complexity,
    clippy::too_many_arguments,
    clippy::similar_names,
    clippy::map_unwrap_or,
    clippy::items_after_statements
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// The analysis orchestrator: passes, parallelism, cancellation.
pub mod analyzer;

/// The resolved call graph model and its assembler.
pub mod callgraph;

/// Configuration loading (`.pyflowscan.toml`, `pyproject.toml`).
pub mod config;

/// Shared constants and compiled regex patterns.
pub mod constants;

/// Warnings surfaced alongside results.
pub mod diagnostics;

/// The syntactic code graph built by the scanner.
pub mod graph;

/// Type inference: variable bindings, return types, class attributes.
pub mod inference;

/// Tree-sitter parsing of Python sources.
pub mod parser;

/// Pattern catalog and matching engine.
pub mod patterns;

/// Python version autodetection.
pub mod pyversion;

/// Registries: builtins, stdlib catalogs, project modules, frameworks.
pub mod registry;

/// Import maps, call-site extraction and the resolution cascade.
pub mod resolver;

/// Scanner producing the code graph from parse trees.
pub mod scanner;

/// Def-use chains and intra-procedural taint analysis.
pub mod taint;

/// Path helpers and Python file discovery.
pub mod utils;

pub use analyzer::{AnalysisOutput, AnalysisStats, AnalyzeError, Analyzer};
pub use callgraph::{CallGraph, CallSite, FunctionNode};
pub use diagnostics::{Warning, WarningCategory};
pub use patterns::{Pattern, PatternMatch, PatternRegistry, PatternType, Severity};
