//! Type inference: variable bindings, return types, class attributes
//! and the placeholder-resolution sweeps.

pub mod attributes;
pub mod engine;
pub mod types;

pub use attributes::{AttributeRegistry, ClassAttribute, ClassAttributes};
pub use engine::{extract_file, FileTypeExtraction, TypeInferenceEngine};
pub use types::{FunctionScope, Location, TypeInfo, TypeSource, VariableBinding};
