//! Shared constants and compiled regex patterns.

use regex::Regex;
use std::sync::OnceLock;

/// Directories that are never worth scanning, applied on top of
/// gitignore rules.
#[allow(non_snake_case)]
#[must_use]
pub fn DEFAULT_EXCLUDE_FOLDERS() -> &'static [&'static str] {
    &[
        ".git",
        ".hg",
        ".svn",
        ".tox",
        ".nox",
        ".venv",
        "venv",
        ".env",
        "env",
        "__pycache__",
        ".mypy_cache",
        ".pytest_cache",
        ".ruff_cache",
        "node_modules",
        "site-packages",
        "build",
        "dist",
        ".eggs",
    ]
}

/// Python built-in callables the resolver recognizes by bare name.
/// These resolve to `builtins.<name>` without any import.
#[allow(non_snake_case)]
#[must_use]
pub fn PYTHON_BUILTIN_CALLS() -> &'static [&'static str] {
    &["eval", "exec", "input", "raw_input", "compile", "__import__"]
}

/// Matches `requires-python = ">=3.11"` style lines in pyproject.toml.
#[allow(non_snake_case)]
#[must_use]
pub fn REQUIRES_PYTHON_RE() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"requires-python\s*=\s*"[><=~^]*(\d+\.\d+)"#).unwrap()
    })
}

/// Matches `python = "^3.11"` style lines (poetry) in pyproject.toml.
#[allow(non_snake_case)]
#[must_use]
pub fn PYTHON_VERSION_RE() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"python\s*=\s*"[\^~>=<]*(\d+\.\d+)"#).unwrap()
    })
}

/// Extracts `major.minor` from a `.python-version` line like `3.11.5`.
#[allow(non_snake_case)]
#[must_use]
pub fn MAJOR_MINOR_RE() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^(\d+\.\d+)").unwrap()
    })
}

/// PascalCase class-name shape used by the instantiation heuristic.
#[allow(non_snake_case)]
#[must_use]
pub fn PASCAL_CASE_RE() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[A-Z][A-Za-z0-9]*$").unwrap()
    })
}

/// Default Python version assumed when no project marker is found.
pub const DEFAULT_PYTHON_VERSION: &str = "3.14";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_python_re() {
        let caps = REQUIRES_PYTHON_RE()
            .captures(r#"requires-python = ">=3.11""#)
            .unwrap();
        assert_eq!(&caps[1], "3.11");
    }

    #[test]
    fn test_poetry_python_re() {
        let caps = PYTHON_VERSION_RE().captures(r#"python = "^3.10""#).unwrap();
        assert_eq!(&caps[1], "3.10");
    }

    #[test]
    fn test_pascal_case() {
        assert!(PASCAL_CASE_RE().is_match("User"));
        assert!(PASCAL_CASE_RE().is_match("HttpClient"));
        assert!(!PASCAL_CASE_RE().is_match("user"));
        assert!(!PASCAL_CASE_RE().is_match("_User"));
    }
}
