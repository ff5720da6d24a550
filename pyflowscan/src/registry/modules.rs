//! Module registry: filesystem paths to dotted module FQNs and back.
//!
//! Populated once during the first pass over the project, then published
//! immutably; every later pass only reads it.

use crate::diagnostics::{Warning, WarningCategory};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Bidirectional index between Python files and module FQNs, plus a
/// short-name index for heuristic lookups.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    /// Module FQN to the file that defines it.
    modules: FxHashMap<String, PathBuf>,
    /// File to its module FQN.
    file_to_module: FxHashMap<PathBuf, String>,
    /// Simple (last-segment) name to all files carrying it.
    short_names: FxHashMap<String, Vec<PathBuf>>,
}

impl ModuleRegistry {
    /// Builds the registry from a project root and its Python files.
    ///
    /// Duplicate module FQNs keep the first file seen and record a
    /// resolution warning; the run continues.
    #[must_use]
    pub fn from_files(root: &Path, files: &[PathBuf]) -> (Self, Vec<Warning>) {
        let mut registry = Self::default();
        let mut warnings = Vec::new();

        for file in files {
            let Some(fqn) = module_fqn(root, file) else {
                continue;
            };
            if fqn.is_empty() {
                continue;
            }

            if let Some(existing) = registry.modules.get(&fqn) {
                warnings.push(Warning::for_path(
                    WarningCategory::Resolution,
                    format!(
                        "module {fqn} already defined by {}; keeping the first",
                        existing.display()
                    ),
                    file.clone(),
                ));
                continue;
            }

            let short = fqn.rsplit('.').next().unwrap_or(&fqn).to_owned();
            registry
                .short_names
                .entry(short)
                .or_default()
                .push(file.clone());
            registry.file_to_module.insert(file.clone(), fqn.clone());
            registry.modules.insert(fqn, file.clone());
        }

        // Ambiguous short names degrade heuristic lookups; the first
        // file wins there, so surface the ambiguity once.
        let mut ambiguous: Vec<(&String, usize)> = registry
            .short_names
            .iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(name, paths)| (name, paths.len()))
            .collect();
        ambiguous.sort();
        for (name, count) in ambiguous {
            warnings.push(Warning::new(
                WarningCategory::Resolution,
                format!("short name {name} maps to {count} modules; heuristics use the first"),
            ));
        }

        (registry, warnings)
    }

    /// True if the dotted name is a registered module.
    #[must_use]
    pub fn is_module(&self, fqn: &str) -> bool {
        self.modules.contains_key(fqn)
    }

    /// True if the parent of the dotted name is a registered module,
    /// i.e. the name plausibly refers to a member of a project module.
    #[must_use]
    pub fn has_parent_module(&self, fqn: &str) -> bool {
        fqn.rsplit_once('.')
            .is_some_and(|(parent, _)| self.modules.contains_key(parent))
    }

    /// Path of a registered module.
    #[must_use]
    pub fn path_of(&self, fqn: &str) -> Option<&PathBuf> {
        self.modules.get(fqn)
    }

    /// Module FQN of a project file.
    #[must_use]
    pub fn module_of(&self, file: &Path) -> Option<&String> {
        self.file_to_module.get(file)
    }

    /// All files whose module short name matches.
    #[must_use]
    pub fn short_name_paths(&self, name: &str) -> &[PathBuf] {
        self.short_names.get(name).map_or(&[], Vec::as_slice)
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True when nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterates registered (FQN, path) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PathBuf)> {
        self.modules.iter()
    }
}

/// Derives the dotted module FQN of a file under a project root.
///
/// `pkg/utils.py` becomes `pkg.utils`; a package `pkg/__init__.py`
/// collapses to `pkg`. Files outside the root yield `None`.
#[must_use]
pub fn module_fqn(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let mut parts: Vec<String> = Vec::new();

    for component in relative.components() {
        let text = component.as_os_str().to_str()?;
        parts.push(text.to_owned());
    }

    let last = parts.pop()?;
    let stem = last.strip_suffix(".py")?;
    if stem != "__init__" {
        parts.push(stem.to_owned());
    }

    Some(parts.join("."))
}
