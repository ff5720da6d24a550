//! Core types for the inference engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of a `call:` placeholder (unresolved function-call result).
pub const CALL_PLACEHOLDER: &str = "call:";
/// Prefix of a `class:` placeholder (class name pending module lookup).
pub const CLASS_PLACEHOLDER: &str = "class:";
/// Prefix of a `param:` placeholder (annotated constructor parameter).
pub const PARAM_PLACEHOLDER: &str = "param:";
/// Prefix of a `var:` placeholder (aliased variable pending scope lookup).
pub const VAR_PLACEHOLDER: &str = "var:";

/// How a type was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSource {
    /// Directly from a literal expression.
    Literal,
    /// From an explicit type annotation.
    Annotation,
    /// Copied from another binding on assignment.
    Assignment,
    /// Name-shape or table-based guess.
    Heuristic,
    /// Unresolved `call:` placeholder awaiting the resolution sweep.
    FunctionCallPlaceholder,
    /// Return type propagated from a resolved callee.
    FunctionCallPropagation,
    /// Inherited from a `self.<attr>` binding.
    SelfAttribute,
    /// A literal in a return statement.
    ReturnLiteral,
    /// A builtin constructor call in a return statement.
    ReturnBuiltinConstructor,
    /// Instantiation of a known class.
    ClassInstantiation,
}

/// An inferred type with a confidence score.
///
/// `type_fqn` may be a placeholder (`call:`, `class:`, `param:`, `var:`)
/// which must be refined by a resolution sweep before consumers act on it.
/// Confidence is always within `[0.0, 1.0]`; consumers check thresholds
/// before committing to a heuristic resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Fully qualified type name, or a placeholder.
    pub type_fqn: String,
    /// Certainty of the inference, in `[0.0, 1.0]`.
    pub confidence: f64,
    /// How the type was derived.
    pub source: TypeSource,
}

impl TypeInfo {
    /// Creates a new type with the given confidence, clamped to `[0, 1]`.
    #[must_use]
    pub fn new(type_fqn: impl Into<String>, confidence: f64, source: TypeSource) -> Self {
        Self {
            type_fqn: type_fqn.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    /// True when the type is any placeholder variant.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.type_fqn.starts_with(CALL_PLACEHOLDER)
            || self.type_fqn.starts_with(CLASS_PLACEHOLDER)
            || self.type_fqn.starts_with(PARAM_PLACEHOLDER)
            || self.type_fqn.starts_with(VAR_PLACEHOLDER)
    }

    /// True when the type names a Python builtin (`builtins.` prefix).
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.type_fqn.starts_with("builtins.")
    }

    /// Returns the placeholder payload if this is a `call:` placeholder.
    #[must_use]
    pub fn call_target(&self) -> Option<&str> {
        self.type_fqn.strip_prefix(CALL_PLACEHOLDER)
    }

    /// Returns a copy with confidence decayed by `factor` for transitive
    /// flow, re-tagged with the given source.
    #[must_use]
    pub fn propagated(&self, factor: f64, source: TypeSource) -> Self {
        Self::new(self.type_fqn.clone(), self.confidence * factor, source)
    }
}

/// Source location of a binding or attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Absolute file path.
    pub file: PathBuf,
    /// 1-indexed line number.
    pub line: usize,
}

/// A typed variable within one function scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableBinding {
    /// Bare variable name.
    pub var_name: String,
    /// Inferred type (possibly a placeholder until the sweep runs).
    pub type_info: TypeInfo,
    /// FQN of the called function the value came from, if any.
    pub assigned_from: Option<String>,
    /// Where the binding was created.
    pub location: Location,
}

/// Variable bindings and return type for a single function.
///
/// Created when the extractor first enters the function, mutated only
/// during that file's extraction pass, and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionScope {
    /// FQN of the function this scope belongs to.
    pub function_fqn: String,
    /// Variable name to binding.
    pub variables: rustc_hash::FxHashMap<String, VariableBinding>,
    /// Merged return type, if any return statement was typed.
    pub return_type: Option<TypeInfo>,
}

impl FunctionScope {
    /// Creates an empty scope for a function.
    #[must_use]
    pub fn new(function_fqn: impl Into<String>) -> Self {
        Self {
            function_fqn: function_fqn.into(),
            variables: rustc_hash::FxHashMap::default(),
            return_type: None,
        }
    }

    /// Looks up a variable binding by name.
    #[must_use]
    pub fn get(&self, var_name: &str) -> Option<&VariableBinding> {
        self.variables.get(var_name)
    }

    /// Inserts or replaces a binding. Redefinition replaces the previous
    /// type; source order is preserved by the extraction walk.
    pub fn bind(&mut self, binding: VariableBinding) {
        self.variables.insert(binding.var_name.clone(), binding);
    }
}
