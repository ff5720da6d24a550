//! Per-class attribute typing extracted from method bodies.
//!
//! The extractor records every `self.<attr> = rhs` assignment with a
//! type inferred from the right-hand side; a second pass resolves the
//! `class:` / `param:` / `call:` placeholders once all files have been
//! seen. The registry is shared across worker threads behind a
//! read/write lock: insertion is serialized, resolution-time reads run
//! concurrently.

use crate::constants::PASCAL_CASE_RE;
use crate::inference::engine::TypeInferenceEngine;
use crate::inference::types::{
    Location, TypeInfo, TypeSource, CALL_PLACEHOLDER, CLASS_PLACEHOLDER, PARAM_PLACEHOLDER,
};
use crate::parser::{line_of, named_children_of, node_text, unwrap_decorated, ParsedSource};
use crate::registry::builtins::BuiltinRegistry;
use crate::registry::modules::ModuleRegistry;
use crate::resolver::imports::ImportMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tree_sitter::Node;

/// One typed attribute of a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAttribute {
    /// Attribute name (without the `self.` prefix).
    pub name: String,
    /// Inferred type, possibly a placeholder until the second pass.
    pub type_info: TypeInfo,
    /// Method the assignment was seen in (e.g. `__init__`).
    pub assigned_in: String,
    /// Where the assignment occurred.
    pub location: Location,
}

/// All attributes and methods of one class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAttributes {
    /// FQN of the class.
    pub class_fqn: String,
    /// Attribute name to its record. The first assignment wins; later
    /// writes in other methods do not overwrite `__init__` typing.
    pub attributes: FxHashMap<String, ClassAttribute>,
    /// Method FQNs (`<classFQN>.<method>`).
    pub methods: Vec<String>,
    /// Defining file.
    pub file_path: PathBuf,
}

/// Thread-safe registry of class attributes across the project.
#[derive(Debug, Default)]
pub struct AttributeRegistry {
    classes: RwLock<FxHashMap<String, ClassAttributes>>,
}

impl AttributeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or merges) a class record.
    pub fn insert(&self, class: ClassAttributes) {
        #[allow(clippy::unwrap_used)]
        let mut classes = self.classes.write().unwrap();
        match classes.get_mut(&class.class_fqn) {
            Some(existing) => {
                for (name, attr) in class.attributes {
                    existing.attributes.entry(name).or_insert(attr);
                }
                for method in class.methods {
                    if !existing.methods.contains(&method) {
                        existing.methods.push(method);
                    }
                }
            }
            None => {
                classes.insert(class.class_fqn.clone(), class);
            }
        }
    }

    /// Clones the record of a class, if registered.
    #[must_use]
    pub fn get(&self, class_fqn: &str) -> Option<ClassAttributes> {
        #[allow(clippy::unwrap_used)]
        let classes = self.classes.read().unwrap();
        classes.get(class_fqn).cloned()
    }

    /// Type of one attribute of a class.
    #[must_use]
    pub fn attribute_type(&self, class_fqn: &str, attr: &str) -> Option<TypeInfo> {
        #[allow(clippy::unwrap_used)]
        let classes = self.classes.read().unwrap();
        classes
            .get(class_fqn)?
            .attributes
            .get(attr)
            .map(|a| a.type_info.clone())
    }

    /// Number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        #[allow(clippy::unwrap_used)]
        let classes = self.classes.read().unwrap();
        classes.len()
    }

    /// True when no class has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Second pass: resolves attribute placeholders against the module
    /// registry, the set of known class FQNs, and collected return
    /// types.
    ///
    /// - `class:Name` looks for the class in the owning module, then in
    ///   the short-name index (first file wins); confidence 0.9.
    /// - `param:Name` does the same lookup at confidence 0.95 since the
    ///   annotation is authoritative.
    /// - `call:fn` consults `returnTypes[<module>.fn]` and decays its
    ///   confidence by 0.8.
    pub fn resolve_placeholders(
        &self,
        modules: &ModuleRegistry,
        known_classes: &FxHashSet<String>,
        engine: &TypeInferenceEngine,
    ) {
        #[allow(clippy::unwrap_used)]
        let mut classes = self.classes.write().unwrap();

        for class in classes.values_mut() {
            let module_fqn = class
                .class_fqn
                .rsplit_once('.')
                .map_or("", |(module, _)| module)
                .to_owned();

            for attr in class.attributes.values_mut() {
                let fqn = attr.type_info.type_fqn.clone();

                if let Some(name) = fqn.strip_prefix(CLASS_PLACEHOLDER) {
                    if let Some(class_fqn) =
                        find_class(name, &module_fqn, modules, known_classes)
                    {
                        attr.type_info =
                            TypeInfo::new(class_fqn, 0.9, TypeSource::ClassInstantiation);
                    }
                } else if let Some(name) = fqn.strip_prefix(PARAM_PLACEHOLDER) {
                    if let Some(class_fqn) =
                        find_class(name, &module_fqn, modules, known_classes)
                    {
                        attr.type_info = TypeInfo::new(class_fqn, 0.95, TypeSource::Annotation);
                    }
                } else if let Some(callee) = fqn.strip_prefix(CALL_PLACEHOLDER) {
                    let candidate = if callee.contains('.') {
                        callee.to_owned()
                    } else {
                        format!("{module_fqn}.{callee}")
                    };
                    if let Some(rt) = engine.return_type_of(&candidate) {
                        if !rt.is_placeholder() {
                            attr.type_info =
                                rt.propagated(0.8, TypeSource::FunctionCallPropagation);
                        }
                    }
                }
            }
        }
    }
}

/// Finds a class by bare name: the owning module first, then the module
/// short-name index (first file).
fn find_class(
    name: &str,
    module_fqn: &str,
    modules: &ModuleRegistry,
    known_classes: &FxHashSet<String>,
) -> Option<String> {
    let local = format!("{module_fqn}.{name}");
    if known_classes.contains(&local) {
        return Some(local);
    }

    for path in modules.short_name_paths(name) {
        if let Some(module) = modules.module_of(path) {
            let candidate = format!("{module}.{name}");
            if known_classes.contains(&candidate) {
                return Some(candidate);
            }
        }
    }

    // Fall back to any known class with a matching last segment.
    known_classes
        .iter()
        .find(|fqn| fqn.rsplit('.').next() == Some(name))
        .cloned()
}

/// Extracts the attribute records of every class in a parsed file.
#[must_use]
pub fn extract_file_attributes(
    parsed: &ParsedSource,
    file: &Path,
    module_fqn: &str,
    builtins: &BuiltinRegistry,
    imports: &ImportMap,
) -> Vec<ClassAttributes> {
    let local_classes: FxHashSet<String> = parsed
        .find_by_kind("class_definition")
        .into_iter()
        .filter_map(|node| {
            node.child_by_field_name("name")
                .map(|n| node_text(n, &parsed.source).to_owned())
        })
        .collect();

    parsed
        .find_by_kind("class_definition")
        .into_iter()
        .filter_map(|class_node| {
            extract_class(
                class_node,
                parsed,
                file,
                module_fqn,
                builtins,
                imports,
                &local_classes,
            )
        })
        .collect()
}

fn extract_class(
    class_node: Node<'_>,
    parsed: &ParsedSource,
    file: &Path,
    module_fqn: &str,
    builtins: &BuiltinRegistry,
    imports: &ImportMap,
    local_classes: &FxHashSet<String>,
) -> Option<ClassAttributes> {
    let name_node = class_node.child_by_field_name("name")?;
    let class_name = node_text(name_node, &parsed.source);
    let class_fqn = format!("{module_fqn}.{class_name}");

    let mut record = ClassAttributes {
        class_fqn: class_fqn.clone(),
        attributes: FxHashMap::default(),
        methods: Vec::new(),
        file_path: file.to_path_buf(),
    };

    let body = class_node.child_by_field_name("body")?;
    for stmt in named_children_of(body) {
        let stmt = unwrap_decorated(stmt);
        if stmt.kind() != "function_definition" {
            continue;
        }
        let Some(method_name_node) = stmt.child_by_field_name("name") else {
            continue;
        };
        let method_name = node_text(method_name_node, &parsed.source).to_owned();
        record.methods.push(format!("{class_fqn}.{method_name}"));

        let annotated = annotated_params(stmt, parsed);
        if let Some(method_body) = stmt.child_by_field_name("body") {
            collect_self_assignments(
                method_body,
                parsed,
                file,
                module_fqn,
                &method_name,
                builtins,
                imports,
                local_classes,
                &annotated,
                &mut record,
            );
        }
    }

    Some(record)
}

/// Parameter name to annotation text for the annotated parameters of a
/// method (`def __init__(self, repo: Repo)` yields `repo -> Repo`).
fn annotated_params(func: Node<'_>, parsed: &ParsedSource) -> FxHashMap<String, String> {
    let mut out = FxHashMap::default();
    let Some(params) = func.child_by_field_name("parameters") else {
        return out;
    };
    for param in named_children_of(params) {
        match param.kind() {
            "typed_parameter" => {
                let name = named_children_of(param)
                    .into_iter()
                    .find(|n| n.kind() == "identifier")
                    .map(|n| node_text(n, &parsed.source).to_owned());
                let annotation = param
                    .child_by_field_name("type")
                    .map(|n| node_text(n, &parsed.source).to_owned());
                if let (Some(name), Some(annotation)) = (name, annotation) {
                    out.insert(name, annotation);
                }
            }
            "typed_default_parameter" => {
                let name = param
                    .child_by_field_name("name")
                    .map(|n| node_text(n, &parsed.source).to_owned());
                let annotation = param
                    .child_by_field_name("type")
                    .map(|n| node_text(n, &parsed.source).to_owned());
                if let (Some(name), Some(annotation)) = (name, annotation) {
                    out.insert(name, annotation);
                }
            }
            _ => {}
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn collect_self_assignments(
    node: Node<'_>,
    parsed: &ParsedSource,
    file: &Path,
    module_fqn: &str,
    method_name: &str,
    builtins: &BuiltinRegistry,
    imports: &ImportMap,
    local_classes: &FxHashSet<String>,
    annotated: &FxHashMap<String, String>,
    record: &mut ClassAttributes,
) {
    for child in named_children_of(node) {
        match child.kind() {
            "expression_statement" => {
                for expr in named_children_of(child) {
                    if expr.kind() != "assignment" {
                        continue;
                    }
                    handle_self_assignment(
                        expr,
                        parsed,
                        file,
                        module_fqn,
                        method_name,
                        builtins,
                        imports,
                        local_classes,
                        annotated,
                        record,
                    );
                }
            }
            "if_statement" | "elif_clause" | "else_clause" | "for_statement"
            | "while_statement" | "with_statement" | "try_statement" | "except_clause"
            | "finally_clause" | "block" => {
                collect_self_assignments(
                    child,
                    parsed,
                    file,
                    module_fqn,
                    method_name,
                    builtins,
                    imports,
                    local_classes,
                    annotated,
                    record,
                );
            }
            _ => {}
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_self_assignment(
    assign: Node<'_>,
    parsed: &ParsedSource,
    file: &Path,
    module_fqn: &str,
    method_name: &str,
    builtins: &BuiltinRegistry,
    imports: &ImportMap,
    local_classes: &FxHashSet<String>,
    annotated: &FxHashMap<String, String>,
    record: &mut ClassAttributes,
) {
    let (Some(left), Some(right)) = (
        assign.child_by_field_name("left"),
        assign.child_by_field_name("right"),
    ) else {
        return;
    };
    if left.kind() != "attribute" {
        return;
    }
    let Some(object) = left.child_by_field_name("object") else {
        return;
    };
    if node_text(object, &parsed.source) != "self" {
        return;
    }
    let Some(attr_node) = left.child_by_field_name("attribute") else {
        return;
    };
    let attr_name = node_text(attr_node, &parsed.source).to_owned();

    let Some(type_info) = infer_attribute_rhs(
        right,
        parsed,
        module_fqn,
        builtins,
        imports,
        local_classes,
        annotated,
    ) else {
        return;
    };

    record
        .attributes
        .entry(attr_name.clone())
        .or_insert(ClassAttribute {
            name: attr_name,
            type_info,
            assigned_in: method_name.to_owned(),
            location: Location {
                file: file.to_path_buf(),
                line: line_of(assign),
            },
        });
}

fn infer_attribute_rhs(
    rhs: Node<'_>,
    parsed: &ParsedSource,
    module_fqn: &str,
    builtins: &BuiltinRegistry,
    imports: &ImportMap,
    local_classes: &FxHashSet<String>,
    annotated: &FxHashMap<String, String>,
) -> Option<TypeInfo> {
    match rhs.kind() {
        "call" => {
            let callee = rhs.child_by_field_name("function")?;
            match callee.kind() {
                "identifier" => {
                    let name = node_text(callee, &parsed.source);
                    if PASCAL_CASE_RE().is_match(name) {
                        if local_classes.contains(name) {
                            return Some(TypeInfo::new(
                                format!("{module_fqn}.{name}"),
                                0.9,
                                TypeSource::ClassInstantiation,
                            ));
                        }
                        if let Some(fqn) = imports.get(name) {
                            return Some(TypeInfo::new(
                                fqn.clone(),
                                0.9,
                                TypeSource::ClassInstantiation,
                            ));
                        }
                        // Unknown class name; leave for the second pass.
                        return Some(TypeInfo::new(
                            format!("{CLASS_PLACEHOLDER}{name}"),
                            0.5,
                            TypeSource::Heuristic,
                        ));
                    }
                    Some(TypeInfo::new(
                        format!("{CALL_PLACEHOLDER}{name}"),
                        0.5,
                        TypeSource::FunctionCallPlaceholder,
                    ))
                }
                "attribute" => Some(TypeInfo::new(
                    format!("{CALL_PLACEHOLDER}{}", node_text(callee, &parsed.source)),
                    0.5,
                    TypeSource::FunctionCallPlaceholder,
                )),
                _ => None,
            }
        }
        "identifier" => {
            let name = node_text(rhs, &parsed.source);
            annotated.get(name).map(|annotation| {
                TypeInfo::new(
                    format!("{PARAM_PLACEHOLDER}{annotation}"),
                    0.5,
                    TypeSource::Annotation,
                )
            })
        }
        _ => builtins
            .infer_literal_type(node_text(rhs, &parsed.source))
            .map(|info| TypeInfo {
                source: TypeSource::SelfAttribute,
                ..info
            }),
    }
}
