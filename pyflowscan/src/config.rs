//! Analyzer configuration, loaded from `.pyflowscan.toml` or
//! `pyproject.toml` (`[tool.pyflowscan]`), walking parent directories.

use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default, Clone)]
/// Top-level configuration struct.
pub struct Config {
    #[serde(default)]
    /// The main configuration section.
    pub pyflowscan: PyflowscanConfig,
}

#[derive(Debug, Deserialize, Default, Clone)]
/// Configuration options for the analyzer.
pub struct PyflowscanConfig {
    /// List of folders to exclude.
    pub exclude_folders: Option<Vec<String>>,
    /// List of folders to force-include.
    pub include_folders: Option<Vec<String>>,
    /// Whether to include test files.
    pub include_tests: Option<bool>,
    /// Base URL of the remote stdlib type catalog. Unset disables the
    /// remote registry.
    pub stdlib_base_url: Option<String>,
    /// Directory of a bundled local stdlib catalog.
    pub stdlib_local_dir: Option<String>,
    /// Per-request deadline for catalog fetches, in seconds.
    pub stdlib_timeout_secs: Option<u64>,
    /// Retry a failed catalog fetch once, with backoff.
    pub stdlib_retry: Option<bool>,
    /// Extra pattern definitions merged into the default catalog.
    #[serde(default)]
    pub patterns: Vec<CustomPattern>,
}

/// A custom pattern defined in TOML configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct CustomPattern {
    /// Rule ID (e.g. `ORG-T010`).
    pub id: String,
    /// Name/description of the pattern.
    pub name: String,
    /// Pattern family: `source_sink`, `missing_sanitizer` or
    /// `dangerous_function`.
    pub pattern_type: String,
    /// Severity level (LOW, MEDIUM, HIGH, CRITICAL).
    #[serde(default = "default_severity")]
    pub severity: String,
    /// Source call names.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Sink call names.
    #[serde(default)]
    pub sinks: Vec<String>,
    /// Sanitizer call names.
    #[serde(default)]
    pub sanitizers: Vec<String>,
    /// Flagged functions.
    #[serde(default)]
    pub dangerous_functions: Vec<String>,
    /// CWE identifier.
    #[serde(default)]
    pub cwe: String,
    /// OWASP category.
    #[serde(default)]
    pub owasp: String,
}

fn default_severity() -> String {
    "HIGH".to_owned()
}

#[derive(Debug, Deserialize, Clone)]
struct PyProject {
    tool: ToolConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct ToolConfig {
    pyflowscan: PyflowscanConfig,
}

impl Config {
    /// Loads configuration from default locations in the current dir.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from_path(Path::new("."))
    }

    /// Loads configuration starting from a specific path and traversing up.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        let mut current = path.to_path_buf();
        if current.is_file() {
            current.pop();
        }

        loop {
            // 1. Try .pyflowscan.toml
            let own_toml = current.join(".pyflowscan.toml");
            if own_toml.exists() {
                if let Ok(content) = fs::read_to_string(&own_toml) {
                    if let Ok(config) = toml::from_str::<Config>(&content) {
                        return config;
                    }
                }
            }

            // 2. Try pyproject.toml
            let pyproject_toml = current.join("pyproject.toml");
            if pyproject_toml.exists() {
                if let Ok(content) = fs::read_to_string(&pyproject_toml) {
                    if let Ok(pyproject) = toml::from_str::<PyProject>(&content) {
                        return Config {
                            pyflowscan: pyproject.tool.pyflowscan,
                        };
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        Config::default()
    }
}

impl CustomPattern {
    /// Converts the TOML definition into a catalog pattern. Unknown
    /// family or severity strings fall back to conservative defaults.
    #[must_use]
    pub fn to_pattern(&self) -> crate::patterns::Pattern {
        use crate::patterns::{PatternType, Severity};

        let pattern_type = match self.pattern_type.as_str() {
            "source_sink" => PatternType::SourceSink,
            "dangerous_function" => PatternType::DangerousFunction,
            _ => PatternType::MissingSanitizer,
        };
        let severity = match self.severity.to_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::High,
        };

        crate::patterns::Pattern {
            id: self.id.clone(),
            name: self.name.clone(),
            pattern_type,
            severity,
            sources: self.sources.clone(),
            sinks: self.sinks.clone(),
            sanitizers: self.sanitizers.clone(),
            dangerous_functions: self.dangerous_functions.clone(),
            cwe: self.cwe.clone(),
            owasp: self.owasp.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_own_toml() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(".pyflowscan.toml"),
            r#"
[pyflowscan]
stdlib_base_url = "https://types.example.dev"
stdlib_timeout_secs = 10
exclude_folders = ["migrations"]

[[pyflowscan.patterns]]
id = "ORG-T010"
name = "input to template"
pattern_type = "missing_sanitizer"
sources = ["input"]
sinks = ["render_template_string"]
sanitizers = ["escape"]
cwe = "CWE-79"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(dir.path());
        let section = &config.pyflowscan;
        assert_eq!(
            section.stdlib_base_url.as_deref(),
            Some("https://types.example.dev")
        );
        assert_eq!(section.stdlib_timeout_secs, Some(10));
        assert_eq!(
            section.exclude_folders.as_deref(),
            Some(&["migrations".to_owned()][..])
        );
        assert_eq!(section.patterns.len(), 1);

        let pattern = section.patterns[0].to_pattern();
        assert_eq!(pattern.id, "ORG-T010");
        assert_eq!(pattern.sinks, vec!["render_template_string".to_owned()]);
    }

    #[test]
    fn test_load_pyproject_section() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "[tool.pyflowscan]\ninclude_tests = true\n",
        )
        .unwrap();

        let config = Config::load_from_path(dir.path());
        assert_eq!(config.pyflowscan.include_tests, Some(true));
    }

    #[test]
    fn test_missing_config_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from_path(dir.path());
        assert!(config.pyflowscan.stdlib_base_url.is_none());
        assert!(config.pyflowscan.patterns.is_empty());
    }
}
