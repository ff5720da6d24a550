//! Python version autodetection.
//!
//! Precedence: `.python-version` first, then `pyproject.toml` scanned
//! line by line, then the default. The pyproject scan is deliberately
//! textual; a half-broken manifest should still yield a version.

use crate::constants::{
    DEFAULT_PYTHON_VERSION, MAJOR_MINOR_RE, PYTHON_VERSION_RE, REQUIRES_PYTHON_RE,
};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Detects the project's Python version as a `major.minor` string.
#[must_use]
pub fn detect_python_version(root: &Path) -> String {
    if let Some(version) = from_python_version_file(root) {
        debug!(%version, "python version from .python-version");
        return version;
    }
    if let Some(version) = from_pyproject(root) {
        debug!(%version, "python version from pyproject.toml");
        return version;
    }
    DEFAULT_PYTHON_VERSION.to_owned()
}

/// First non-blank line of `.python-version`, reduced to major.minor
/// (`3.11.5` becomes `3.11`).
fn from_python_version_file(root: &Path) -> Option<String> {
    let content = fs::read_to_string(root.join(".python-version")).ok()?;
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    MAJOR_MINOR_RE()
        .captures(line)
        .map(|caps| caps[1].to_owned())
}

/// Line-wise scan of pyproject.toml: `requires-python` wins over the
/// poetry-style `python = "..."`; first match of either form wins.
fn from_pyproject(root: &Path) -> Option<String> {
    let content = fs::read_to_string(root.join("pyproject.toml")).ok()?;
    for line in content.lines() {
        if let Some(caps) = REQUIRES_PYTHON_RE().captures(line) {
            return Some(caps[1].to_owned());
        }
        if let Some(caps) = PYTHON_VERSION_RE().captures(line) {
            return Some(caps[1].to_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_python_version_file_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".python-version"), "\n3.11.5\n").unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "requires-python = \">=3.9\"\n",
        )
        .unwrap();
        assert_eq!(detect_python_version(dir.path()), "3.11");
    }

    #[test]
    fn test_pyproject_requires_python() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "[project]\nname = \"x\"\nrequires-python = \">=3.10\"\n",
        )
        .unwrap();
        assert_eq!(detect_python_version(dir.path()), "3.10");
    }

    #[test]
    fn test_pyproject_poetry_style() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "[tool.poetry.dependencies]\npython = \"^3.12\"\n",
        )
        .unwrap();
        assert_eq!(detect_python_version(dir.path()), "3.12");
    }

    #[test]
    fn test_default_when_nothing_found() {
        let dir = tempdir().unwrap();
        assert_eq!(detect_python_version(dir.path()), "3.14");
    }
}
