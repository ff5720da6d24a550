//! Checksum-verified catalog of Python stdlib module APIs.
//!
//! Two backends share one query interface: a local directory of JSON
//! files (this module) and a lazy HTTP loader
//! ([`crate::registry::stdlib_remote`]). Both validate FQNs by resolving
//! the longest module prefix listed in a manifest and then checking the
//! member against the module's function and class tables.

use rustc_hash::FxHashMap;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Manifest wire format: `{schemaVersion, modules: [{name, file, checksum}]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StdlibManifest {
    /// Manifest schema version, e.g. `"1.0.0"`.
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    /// Module entries.
    pub modules: Vec<ManifestEntry>,
}

/// One module entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    /// Dotted module name, e.g. `os` or `os.path`.
    pub name: String,
    /// File name of the module JSON, relative to the manifest.
    pub file: String,
    /// Expected digest, `sha256:<lowercase hex>`.
    pub checksum: String,
}

/// A function entry in a module catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionEntry {
    /// Return type name (bare builtin name or dotted FQN), if declared.
    #[serde(rename = "returnType")]
    pub return_type: Option<String>,
}

/// A class entry in a module catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassEntry {
    /// Kind tag for the class, e.g. `"class"`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Catalog of one stdlib module.
#[derive(Debug, Clone, Deserialize)]
pub struct StdlibModule {
    /// Dotted module name.
    pub module: String,
    /// Python version the catalog was generated for.
    #[serde(rename = "pythonVersion")]
    pub python_version: Option<String>,
    /// Function name to entry.
    #[serde(default)]
    pub functions: FxHashMap<String, FunctionEntry>,
    /// Class name to entry.
    #[serde(default)]
    pub classes: FxHashMap<String, ClassEntry>,
    /// Alias to canonical module name (e.g. `path` -> `posixpath` in `os`).
    #[serde(default)]
    pub aliases: FxHashMap<String, String>,
}

/// Errors raised while loading a stdlib catalog.
#[derive(Debug, thiserror::Error)]
pub enum StdlibError {
    /// Manifest or module file could not be read.
    #[error("Failed to read stdlib catalog file {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Manifest or module JSON did not parse.
    #[error("Malformed stdlib catalog JSON in {path}: {source}")]
    Malformed {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// A module file did not match its manifest checksum.
    #[error("Checksum mismatch for stdlib module {module}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Module name.
        module: String,
        /// Manifest digest.
        expected: String,
        /// Computed digest.
        actual: String,
    },
}

/// Computes the `sha256:<hex>` digest of a byte buffer.
#[must_use]
pub fn sha256_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(7 + digest.len() * 2);
    out.push_str("sha256:");
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Verifies a byte buffer against a manifest checksum entry.
///
/// # Errors
/// Returns [`StdlibError::ChecksumMismatch`] when the digests differ.
pub fn verify_checksum(module: &str, bytes: &[u8], expected: &str) -> Result<(), StdlibError> {
    let actual = sha256_digest(bytes);
    if actual == expected.to_lowercase() {
        Ok(())
    } else {
        Err(StdlibError::ChecksumMismatch {
            module: module.to_owned(),
            expected: expected.to_owned(),
            actual,
        })
    }
}

/// Query interface shared by the local and remote backends.
pub trait StdlibQuery: Send + Sync {
    /// True if `fqn` names a function or class of a cataloged module.
    fn validate_fqn(&self, fqn: &str) -> bool;

    /// Declared return type for a cataloged function, if any.
    fn return_type(&self, fqn: &str) -> Option<String>;
}

/// Kind of member an FQN resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Function,
    Class,
}

/// Shared longest-prefix + alias resolution.
///
/// `is_module` answers whether a dotted name is listed in the manifest;
/// `load` produces the (cached) module catalog for a listed name.
pub(crate) fn resolve_member<M, L>(
    fqn: &str,
    is_module: &M,
    load: &L,
) -> Option<(Arc<StdlibModule>, String, MemberKind)>
where
    M: Fn(&str) -> bool,
    L: Fn(&str) -> Option<Arc<StdlibModule>>,
{
    resolve_member_inner(fqn, is_module, load, 0)
}

fn resolve_member_inner<M, L>(
    fqn: &str,
    is_module: &M,
    load: &L,
    depth: usize,
) -> Option<(Arc<StdlibModule>, String, MemberKind)>
where
    M: Fn(&str) -> bool,
    L: Fn(&str) -> Option<Arc<StdlibModule>>,
{
    // Alias chains are short (os.path -> posixpath); the bound only
    // guards against a cyclic catalog.
    if depth > 4 {
        return None;
    }

    let parts: Vec<&str> = fqn.split('.').collect();
    if parts.len() < 2 {
        return None;
    }

    // Longest module prefix wins, so `os.path.join` prefers an `os.path`
    // manifest entry over `os`.
    for split in (1..parts.len()).rev() {
        let prefix = parts[..split].join(".");
        if !is_module(&prefix) {
            continue;
        }
        let module = load(&prefix)?;
        let member = parts[split..].join(".");

        if !member.contains('.') {
            if module.functions.contains_key(&member) {
                return Some((module, member, MemberKind::Function));
            }
            if module.classes.contains_key(&member) {
                return Some((module, member, MemberKind::Class));
            }
        }

        // Alias rewrite: `os.path.join` with os aliasing path ->
        // posixpath continues as `posixpath.join`.
        let head = parts[split];
        if let Some(target) = module.aliases.get(head) {
            let rest = parts[split + 1..].join(".");
            let rewritten = if rest.is_empty() {
                target.clone()
            } else {
                format!("{target}.{rest}")
            };
            return resolve_member_inner(&rewritten, is_module, load, depth + 1);
        }

        return None;
    }

    None
}

/// Stdlib catalog loaded from a bundled directory.
///
/// The directory holds `manifest.json` plus one JSON file per module.
/// Every module file is sha256-verified against its manifest entry at
/// load time; a mismatch disables that module and is surfaced as a
/// warning, never a run failure.
#[derive(Debug)]
pub struct LocalStdlibRegistry {
    modules: FxHashMap<String, Arc<StdlibModule>>,
}

impl LocalStdlibRegistry {
    /// Loads and verifies a catalog directory.
    ///
    /// # Errors
    /// Returns an error when the manifest itself is unreadable or
    /// malformed. Individual module failures (missing file, bad JSON,
    /// checksum mismatch) disable that module only.
    pub fn load(dir: &Path) -> Result<Self, StdlibError> {
        let manifest_path = dir.join("manifest.json");
        let bytes = fs::read(&manifest_path).map_err(|source| StdlibError::Io {
            path: manifest_path.display().to_string(),
            source,
        })?;
        let manifest: StdlibManifest =
            serde_json::from_slice(&bytes).map_err(|source| StdlibError::Malformed {
                path: manifest_path.display().to_string(),
                source,
            })?;

        let mut modules = FxHashMap::default();
        for entry in &manifest.modules {
            match Self::load_module(dir, entry) {
                Ok(module) => {
                    modules.insert(entry.name.clone(), Arc::new(module));
                }
                Err(err) => {
                    warn!(module = %entry.name, %err, "disabling stdlib module");
                }
            }
        }

        Ok(Self { modules })
    }

    fn load_module(dir: &Path, entry: &ManifestEntry) -> Result<StdlibModule, StdlibError> {
        let path = dir.join(&entry.file);
        let bytes = fs::read(&path).map_err(|source| StdlibError::Io {
            path: path.display().to_string(),
            source,
        })?;
        verify_checksum(&entry.name, &bytes, &entry.checksum)?;
        serde_json::from_slice(&bytes).map_err(|source| StdlibError::Malformed {
            path: path.display().to_string(),
            source,
        })
    }

    /// Number of successfully loaded modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn resolve(&self, fqn: &str) -> Option<(Arc<StdlibModule>, String, MemberKind)> {
        resolve_member(
            fqn,
            &|name: &str| self.modules.contains_key(name),
            &|name: &str| self.modules.get(name).cloned(),
        )
    }
}

impl StdlibQuery for LocalStdlibRegistry {
    fn validate_fqn(&self, fqn: &str) -> bool {
        self.resolve(fqn).is_some()
    }

    fn return_type(&self, fqn: &str) -> Option<String> {
        let (module, member, kind) = self.resolve(fqn)?;
        if kind == MemberKind::Function {
            module.functions.get(&member)?.return_type.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_catalog(dir: &Path, modules: &[(&str, &str)]) {
        let mut entries = Vec::new();
        for (name, body) in modules {
            let file = format!("{name}.json");
            let mut f = fs::File::create(dir.join(&file)).unwrap();
            f.write_all(body.as_bytes()).unwrap();
            entries.push(serde_json::json!({
                "name": name,
                "file": file,
                "checksum": sha256_digest(body.as_bytes()),
            }));
        }
        let manifest = serde_json::json!({
            "schemaVersion": "1.0.0",
            "modules": entries,
        });
        fs::write(
            dir.join("manifest.json"),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_validate_function_and_class() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(
            dir.path(),
            &[(
                "os",
                r#"{"module":"os","pythonVersion":"3.14","functions":{"getcwd":{"returnType":"str"}},"classes":{"DirEntry":{"type":"class"}}}"#,
            )],
        );

        let reg = LocalStdlibRegistry::load(dir.path()).unwrap();
        assert!(reg.validate_fqn("os.getcwd"));
        assert!(reg.validate_fqn("os.DirEntry"));
        assert!(!reg.validate_fqn("os.nope"));
        assert!(!reg.validate_fqn("sys.exit"));
        assert_eq!(reg.return_type("os.getcwd"), Some("str".to_owned()));
    }

    #[test]
    fn test_alias_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(
            dir.path(),
            &[
                (
                    "os",
                    r#"{"module":"os","functions":{},"aliases":{"path":"posixpath"}}"#,
                ),
                (
                    "posixpath",
                    r#"{"module":"posixpath","functions":{"join":{"returnType":"str"}}}"#,
                ),
            ],
        );

        let reg = LocalStdlibRegistry::load(dir.path()).unwrap();
        assert!(reg.validate_fqn("os.path.join"));
        assert_eq!(reg.return_type("os.path.join"), Some("str".to_owned()));
    }

    #[test]
    fn test_checksum_mismatch_disables_module() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(
            dir.path(),
            &[(
                "os",
                r#"{"module":"os","functions":{"getcwd":{"returnType":"str"}}}"#,
            )],
        );
        // Corrupt the module file after the manifest was written.
        fs::write(
            dir.path().join("os.json"),
            r#"{"module":"os","functions":{"evil":{"returnType":"str"}}}"#,
        )
        .unwrap();

        let reg = LocalStdlibRegistry::load(dir.path()).unwrap();
        assert_eq!(reg.module_count(), 0);
        assert!(!reg.validate_fqn("os.getcwd"));
    }

    #[test]
    fn test_digest_format() {
        let digest = sha256_digest(b"hello");
        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), 7 + 64);
        assert_eq!(digest, digest.to_lowercase());
    }
}
