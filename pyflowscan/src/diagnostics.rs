//! Non-fatal diagnostics surfaced alongside analysis results.
//!
//! The pipeline never aborts on a single bad file or registry; it
//! records a warning and keeps going.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Coarse category of a warning, mirroring the failure taxonomy of the
/// pipeline (input, resolution ambiguity, registry integrity, network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    /// Unreadable file, parse failure, encoding problem.
    Input,
    /// Ambiguous resolution (duplicate module FQN, many short-name hits).
    Resolution,
    /// Checksum mismatch or malformed registry data.
    Integrity,
    /// Manifest or module fetch failure.
    Network,
}

/// A recorded, non-fatal problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// What went wrong, broadly.
    pub category: WarningCategory,
    /// Human-readable description.
    pub message: String,
    /// File the warning concerns, if any.
    pub path: Option<PathBuf>,
}

impl Warning {
    /// Creates a warning without an associated path.
    #[must_use]
    pub fn new(category: WarningCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a warning tied to a file.
    #[must_use]
    pub fn for_path(
        category: WarningCategory,
        message: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
