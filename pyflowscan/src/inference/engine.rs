//! Per-function variable typing, return types, and the placeholder
//! resolution sweep.
//!
//! Extraction runs once per file (in parallel across files); the merged
//! engine is then swept once, replacing `call:` and `var:` placeholders
//! with types propagated from collected return types. The sweep never
//! creates new placeholders, so one iteration suffices.

use crate::constants::PASCAL_CASE_RE;
use crate::inference::types::{
    FunctionScope, Location, TypeInfo, TypeSource, VariableBinding, CALL_PLACEHOLDER,
    VAR_PLACEHOLDER,
};
use crate::parser::{line_of, named_children_of, node_text, unwrap_decorated, ParsedSource};
use crate::registry::builtins::BuiltinRegistry;
use crate::registry::modules::ModuleRegistry;
use crate::resolver::imports::{ImportMap, ImportMapCache};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use tracing::debug;
use tree_sitter::Node;

/// Node kinds the text-based literal classifier is allowed to see.
/// Guarding on kind keeps parenthesized expressions from being read as
/// tuples and comprehension generators from being read at all.
const LITERAL_KINDS: &[&str] = &[
    "string",
    "concatenated_string",
    "integer",
    "float",
    "true",
    "false",
    "none",
    "list",
    "dictionary",
    "set",
    "tuple",
    "list_comprehension",
    "dictionary_comprehension",
    "set_comprehension",
    "unary_operator",
];

/// Builtin constructors recognized in return position.
const BUILTIN_CONSTRUCTORS: &[&str] = &[
    "str", "list", "dict", "set", "tuple", "int", "float", "bool", "bytes",
];

/// Variable typing produced from a single file. Merged into the engine
/// after the parallel extraction pass.
#[derive(Debug, Default)]
pub struct FileTypeExtraction {
    /// Function FQN to its scope.
    pub scopes: FxHashMap<String, FunctionScope>,
    /// Function FQN to merged return type.
    pub return_types: FxHashMap<String, TypeInfo>,
}

/// Project-wide variable bindings and return types.
#[derive(Debug, Default)]
pub struct TypeInferenceEngine {
    /// Function FQN to its scope. Module-level code owns a scope keyed
    /// by the module FQN itself.
    pub scopes: FxHashMap<String, FunctionScope>,
    /// Function FQN to merged return type.
    pub return_types: FxHashMap<String, TypeInfo>,
}

impl TypeInferenceEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one file's extraction into the engine. Scope keys are
    /// disjoint across files, so merging is insertion.
    pub fn merge(&mut self, file: FileTypeExtraction) {
        self.scopes.extend(file.scopes);
        self.return_types.extend(file.return_types);
    }

    /// Looks up a function scope.
    #[must_use]
    pub fn scope(&self, function_fqn: &str) -> Option<&FunctionScope> {
        self.scopes.get(function_fqn)
    }

    /// Looks up a variable binding within a function scope.
    #[must_use]
    pub fn binding(&self, function_fqn: &str, var: &str) -> Option<&VariableBinding> {
        self.scopes.get(function_fqn)?.get(var)
    }

    /// Merged return type of a function.
    #[must_use]
    pub fn return_type_of(&self, function_fqn: &str) -> Option<&TypeInfo> {
        self.return_types.get(function_fqn)
    }

    /// Resolves `call:` and `var:` placeholders left by extraction.
    ///
    /// For `call:x`, the candidate callee FQN is `x` itself when dotted,
    /// otherwise the import-map binding or the enclosing module prefix.
    /// On a hit against the collected return types the binding is
    /// replaced by the return type with confidence decayed by 0.95; the
    /// replacement is skipped when it would not improve on the
    /// placeholder (the sweep is monotone in confidence).
    pub fn resolve_placeholders(&mut self, modules: &ModuleRegistry, imports: &ImportMapCache) {
        let scope_keys: Vec<String> = self.scopes.keys().cloned().collect();

        for scope_key in scope_keys {
            let module_fqn = enclosing_module(modules, &scope_key);
            let import_map = module_fqn
                .as_deref()
                .and_then(|m| modules.path_of(m))
                .and_then(|path| imports.get(path));

            let var_names: Vec<String> = self
                .scopes
                .get(&scope_key)
                .map(|s| s.variables.keys().cloned().collect())
                .unwrap_or_default();

            for var in var_names {
                let Some(type_fqn) = self
                    .scopes
                    .get(&scope_key)
                    .and_then(|s| s.get(&var))
                    .map(|b| b.type_info.type_fqn.clone())
                else {
                    continue;
                };

                if let Some(callee) = type_fqn.strip_prefix(CALL_PLACEHOLDER) {
                    self.resolve_call_placeholder(
                        &scope_key,
                        &var,
                        callee,
                        module_fqn.as_deref(),
                        import_map.as_deref(),
                    );
                } else if let Some(aliased) = type_fqn.strip_prefix(VAR_PLACEHOLDER) {
                    self.resolve_var_placeholder(&scope_key, &var, &aliased.to_owned());
                }
            }
        }
    }

    fn resolve_call_placeholder(
        &mut self,
        scope_key: &str,
        var: &str,
        callee: &str,
        module_fqn: Option<&str>,
        import_map: Option<&ImportMap>,
    ) {
        let mut candidates: Vec<String> = Vec::new();
        if callee.contains('.') {
            candidates.push(callee.to_owned());
        } else {
            if let Some(fqn) = import_map.and_then(|m| m.get(callee)) {
                candidates.push(fqn.clone());
            }
            if let Some(module) = module_fqn {
                candidates.push(format!("{module}.{callee}"));
            }
        }

        for candidate in candidates {
            let Some(return_type) = self.return_types.get(&candidate) else {
                continue;
            };
            // Propagating another placeholder would not refine anything.
            if return_type.is_placeholder() {
                continue;
            }

            let resolved =
                return_type.propagated(0.95, TypeSource::FunctionCallPropagation);
            if let Some(scope) = self.scopes.get_mut(scope_key) {
                if let Some(binding) = scope.variables.get_mut(var) {
                    if resolved.confidence >= binding.type_info.confidence {
                        debug!(
                            scope = scope_key,
                            var,
                            callee = %candidate,
                            resolved = %resolved.type_fqn,
                            "resolved call placeholder"
                        );
                        binding.type_info = resolved;
                        binding.assigned_from = Some(candidate);
                    }
                }
            }
            return;
        }
    }

    fn resolve_var_placeholder(&mut self, scope_key: &str, var: &str, aliased: &str) {
        let source_type = self
            .scopes
            .get(scope_key)
            .and_then(|s| s.get(aliased))
            .map(|b| b.type_info.clone());

        let Some(source_type) = source_type else {
            return;
        };
        if source_type.is_placeholder() {
            return;
        }

        let resolved = source_type.propagated(0.95, TypeSource::Assignment);
        if let Some(scope) = self.scopes.get_mut(scope_key) {
            if let Some(binding) = scope.variables.get_mut(var) {
                if resolved.confidence >= binding.type_info.confidence {
                    binding.type_info = resolved;
                }
            }
        }
    }
}

/// Longest registered module prefix of a function FQN.
fn enclosing_module(modules: &ModuleRegistry, fqn: &str) -> Option<String> {
    let parts: Vec<&str> = fqn.split('.').collect();
    for split in (1..=parts.len()).rev() {
        let prefix = parts[..split].join(".");
        if modules.is_module(&prefix) {
            return Some(prefix);
        }
    }
    None
}

/// Extracts variable bindings and return types from one parsed file.
#[must_use]
pub fn extract_file(
    parsed: &ParsedSource,
    file: &Path,
    module_fqn: &str,
    builtins: &BuiltinRegistry,
    imports: &ImportMap,
) -> FileTypeExtraction {
    let classes = collect_class_names(parsed);
    let mut extraction = FileTypeExtraction::default();
    // Module-level assignments live in a scope keyed by the module FQN.
    extraction
        .scopes
        .insert(module_fqn.to_owned(), FunctionScope::new(module_fqn));

    let ctx = ExtractionContext {
        file,
        module_fqn,
        builtins,
        imports,
        classes: &classes,
    };
    walk_scope(
        parsed.root(),
        parsed,
        &ctx,
        &mut extraction,
        &mut vec![module_fqn.to_owned()],
    );
    extraction
}

struct ExtractionContext<'a> {
    file: &'a Path,
    module_fqn: &'a str,
    builtins: &'a BuiltinRegistry,
    imports: &'a ImportMap,
    classes: &'a FxHashSet<String>,
}

fn collect_class_names(parsed: &ParsedSource) -> FxHashSet<String> {
    parsed
        .find_by_kind("class_definition")
        .into_iter()
        .filter_map(|node| {
            node.child_by_field_name("name")
                .map(|n| node_text(n, &parsed.source).to_owned())
        })
        .collect()
}

fn walk_scope(
    node: Node<'_>,
    parsed: &ParsedSource,
    ctx: &ExtractionContext<'_>,
    extraction: &mut FileTypeExtraction,
    scope_stack: &mut Vec<String>,
) {
    for child in named_children_of(node) {
        let child = unwrap_decorated(child);
        match child.kind() {
            "function_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, &parsed.source);
                let parent = scope_stack.last().cloned().unwrap_or_default();
                let fqn = format!("{parent}.{name}");

                extraction
                    .scopes
                    .entry(fqn.clone())
                    .or_insert_with(|| FunctionScope::new(&fqn));

                scope_stack.push(fqn);
                if let Some(body) = child.child_by_field_name("body") {
                    walk_scope(body, parsed, ctx, extraction, scope_stack);
                }
                scope_stack.pop();
            }
            "class_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, &parsed.source);
                let parent = scope_stack.last().cloned().unwrap_or_default();
                scope_stack.push(format!("{parent}.{name}"));
                if let Some(body) = child.child_by_field_name("body") {
                    walk_scope(body, parsed, ctx, extraction, scope_stack);
                }
                scope_stack.pop();
            }
            "expression_statement" => {
                for expr in named_children_of(child) {
                    if expr.kind() == "assignment" {
                        handle_assignment(expr, parsed, ctx, extraction, scope_stack);
                    }
                }
            }
            "return_statement" => {
                handle_return(child, parsed, ctx, extraction, scope_stack);
            }
            "if_statement" | "elif_clause" | "else_clause" | "for_statement"
            | "while_statement" | "with_statement" | "try_statement" | "except_clause"
            | "finally_clause" | "block" => {
                walk_scope(child, parsed, ctx, extraction, scope_stack);
            }
            _ => {}
        }
    }
}

fn handle_assignment(
    assign: Node<'_>,
    parsed: &ParsedSource,
    ctx: &ExtractionContext<'_>,
    extraction: &mut FileTypeExtraction,
    scope_stack: &[String],
) {
    let (Some(left), Some(right)) = (
        assign.child_by_field_name("left"),
        assign.child_by_field_name("right"),
    ) else {
        return;
    };
    if left.kind() != "identifier" {
        return;
    }

    let Some((type_info, assigned_from)) = infer_rhs(right, parsed, ctx) else {
        return;
    };

    let var_name = node_text(left, &parsed.source).to_owned();
    let Some(scope_key) = scope_stack.last() else {
        return;
    };
    if let Some(scope) = extraction.scopes.get_mut(scope_key) {
        scope.bind(VariableBinding {
            var_name,
            type_info,
            assigned_from,
            location: Location {
                file: ctx.file.to_path_buf(),
                line: line_of(assign),
            },
        });
    }
}

/// Infers the type of a right-hand side expression, returning the type
/// plus the callee FQN when the value came from a known constructor.
fn infer_rhs(
    rhs: Node<'_>,
    parsed: &ParsedSource,
    ctx: &ExtractionContext<'_>,
) -> Option<(TypeInfo, Option<String>)> {
    let kind = rhs.kind();

    if LITERAL_KINDS.contains(&kind) {
        let text = node_text(rhs, &parsed.source);
        return ctx
            .builtins
            .infer_literal_type(text)
            .map(|info| (info, None));
    }

    match kind {
        "call" => {
            let callee = rhs.child_by_field_name("function")?;
            match callee.kind() {
                "identifier" => {
                    let name = node_text(callee, &parsed.source);
                    if let Some((class_fqn, conf)) = class_instantiation(name, ctx) {
                        return Some((
                            TypeInfo::new(class_fqn.clone(), conf, TypeSource::ClassInstantiation),
                            Some(class_fqn),
                        ));
                    }
                    Some((
                        TypeInfo::new(
                            format!("{CALL_PLACEHOLDER}{name}"),
                            0.5,
                            TypeSource::FunctionCallPlaceholder,
                        ),
                        None,
                    ))
                }
                "attribute" => {
                    let target = node_text(callee, &parsed.source);
                    Some((
                        TypeInfo::new(
                            format!("{CALL_PLACEHOLDER}{target}"),
                            0.5,
                            TypeSource::FunctionCallPlaceholder,
                        ),
                        None,
                    ))
                }
                _ => None,
            }
        }
        "identifier" => {
            let name = node_text(rhs, &parsed.source);
            Some((
                TypeInfo::new(
                    format!("{VAR_PLACEHOLDER}{name}"),
                    0.5,
                    TypeSource::Assignment,
                ),
                None,
            ))
        }
        _ => None,
    }
}

/// PascalCase name declared as a class in this file or bound by an
/// import resolves as an instantiation with confidence 0.9.
fn class_instantiation(name: &str, ctx: &ExtractionContext<'_>) -> Option<(String, f64)> {
    if !PASCAL_CASE_RE().is_match(name) {
        return None;
    }
    if ctx.classes.contains(name) {
        return Some((format!("{}.{name}", ctx.module_fqn), 0.9));
    }
    if let Some(fqn) = ctx.imports.get(name) {
        return Some((fqn.clone(), 0.9));
    }
    None
}

fn handle_return(
    ret: Node<'_>,
    parsed: &ParsedSource,
    ctx: &ExtractionContext<'_>,
    extraction: &mut FileTypeExtraction,
    scope_stack: &[String],
) {
    let Some(scope_key) = scope_stack.last() else {
        return;
    };
    // Returns at module level are syntax errors; only functions count.
    if scope_key == ctx.module_fqn {
        return;
    }

    let Some(value) = named_children_of(ret).into_iter().next() else {
        return;
    };

    let Some(candidate) = infer_return(value, parsed, ctx, extraction, scope_key) else {
        return;
    };

    // Merge multiple returns: highest confidence wins, first seen on ties.
    match extraction.return_types.get(scope_key) {
        Some(existing) if existing.confidence >= candidate.confidence => {}
        _ => {
            extraction.return_types.insert(scope_key.clone(), candidate);
        }
    }
}

fn infer_return(
    value: Node<'_>,
    parsed: &ParsedSource,
    ctx: &ExtractionContext<'_>,
    extraction: &FileTypeExtraction,
    scope_key: &str,
) -> Option<TypeInfo> {
    let kind = value.kind();

    if LITERAL_KINDS.contains(&kind) {
        let text = node_text(value, &parsed.source);
        return ctx.builtins.infer_literal_type(text).map(|info| TypeInfo {
            source: TypeSource::ReturnLiteral,
            ..info
        });
    }

    match kind {
        "call" => {
            let callee = value.child_by_field_name("function")?;
            if callee.kind() == "identifier" {
                let name = node_text(callee, &parsed.source);
                if BUILTIN_CONSTRUCTORS.contains(&name) {
                    return Some(TypeInfo::new(
                        format!("builtins.{name}"),
                        0.9,
                        TypeSource::ReturnBuiltinConstructor,
                    ));
                }
                if let Some((class_fqn, _)) = class_instantiation(name, ctx) {
                    // Returned instances type stronger than plain
                    // assignments: one propagation hop must still clear
                    // the strict-resolution threshold.
                    return Some(TypeInfo::new(
                        class_fqn,
                        0.95,
                        TypeSource::ClassInstantiation,
                    ));
                }
                return Some(TypeInfo::new(
                    format!("{CALL_PLACEHOLDER}{name}"),
                    0.5,
                    TypeSource::FunctionCallPlaceholder,
                ));
            }
            if callee.kind() == "attribute" {
                let target = node_text(callee, &parsed.source);
                return Some(TypeInfo::new(
                    format!("{CALL_PLACEHOLDER}{target}"),
                    0.5,
                    TypeSource::FunctionCallPlaceholder,
                ));
            }
            None
        }
        "identifier" => {
            let name = node_text(value, &parsed.source);
            extraction
                .scopes
                .get(scope_key)
                .and_then(|s| s.get(name))
                .map(|b| b.type_info.clone())
        }
        _ => None,
    }
}
