//! Call-target resolution: an ordered cascade from raw textual targets
//! to FQNs.
//!
//! The cascade tries, in order: self methods, self-attribute chains,
//! bare-name rules (builtins, imports, same module), qualified-name
//! rules, typed-variable methods (builtin then user class), the stdlib
//! catalog, the framework/ORM table, and finally method chains. The
//! first success terminates; everything failing leaves the site
//! unresolved with its raw target. Missing optional registries skip
//! their steps rather than failing.

use crate::constants::PYTHON_BUILTIN_CALLS;
use crate::inference::attributes::AttributeRegistry;
use crate::inference::engine::TypeInferenceEngine;
use crate::inference::types::{TypeInfo, TypeSource};
use crate::registry::builtins::BuiltinRegistry;
use crate::registry::frameworks::FrameworkTable;
use crate::registry::modules::ModuleRegistry;
use crate::registry::stdlib::StdlibQuery;
use crate::resolver::imports::ImportMap;
use rustc_hash::FxHashSet;

/// Minimum confidence for resolving a method on a builtin-typed
/// variable.
pub const HEURISTIC_CONFIDENCE: f64 = 0.5;
/// Minimum confidence for resolving a method on a user-class-typed
/// variable without an existence check.
pub const STRICT_CONFIDENCE: f64 = 0.9;

/// Result of resolving one call target.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Resolved FQN, or the raw target when unresolved.
    pub fqn: String,
    /// Whether the cascade succeeded.
    pub resolved: bool,
    /// Return type of the call when known; consumed only by the chain
    /// walker, never stored on call sites.
    pub return_type: Option<TypeInfo>,
}

impl Resolution {
    fn unresolved(raw: &str) -> Self {
        Self {
            fqn: raw.to_owned(),
            resolved: false,
            return_type: None,
        }
    }

    fn resolved(fqn: impl Into<String>, return_type: Option<TypeInfo>) -> Self {
        Self {
            fqn: fqn.into(),
            resolved: true,
            return_type,
        }
    }
}

/// Per-caller context for resolution.
#[derive(Debug, Clone, Copy)]
pub struct CallerContext<'a> {
    /// Module FQN of the file being resolved.
    pub module_fqn: &'a str,
    /// FQN of the enclosing function (the module itself at top level).
    pub caller_fqn: &'a str,
    /// FQN of the enclosing class, for methods.
    pub class_fqn: Option<&'a str>,
    /// Import map of the file.
    pub import_map: &'a ImportMap,
}

/// The resolver, holding references to every registry it may consult.
/// Optional registries are skipped when absent; the cascade degrades
/// instead of failing.
pub struct CallResolver<'a> {
    /// Built-in types and methods.
    pub builtins: Option<&'a BuiltinRegistry>,
    /// Project module index.
    pub modules: &'a ModuleRegistry,
    /// Framework/ORM rules.
    pub frameworks: &'a FrameworkTable,
    /// Variable typing, for steps 5/6 and chains.
    pub engine: Option<&'a TypeInferenceEngine>,
    /// Class attribute typing, for `self.attr.method`.
    pub attributes: Option<&'a AttributeRegistry>,
    /// Active stdlib catalog.
    pub stdlib: Option<&'a dyn StdlibQuery>,
    /// Every known function, method and class FQN in the project.
    pub known_callables: &'a FxHashSet<String>,
}

impl<'a> CallResolver<'a> {
    /// Resolves one textual call target. Never panics; a nil or
    /// unusable input yields the raw target, unresolved.
    #[must_use]
    pub fn resolve(&self, target: &str, ctx: &CallerContext<'_>) -> Resolution {
        let target = target.trim();
        if target.is_empty() {
            return Resolution::unresolved(target);
        }

        // Method chains carry call parentheses in the target text and
        // are walked step by step against the running type.
        if target.contains('(') {
            return self.resolve_chain(target, ctx);
        }

        if let Some(rest) = target.strip_prefix("self.") {
            return self.resolve_self(target, rest, ctx);
        }

        if target.contains('.') {
            self.resolve_qualified(target, ctx)
        } else {
            self.resolve_bare(target, ctx)
        }
    }

    /// Steps 1-2: `self.m` and `self.attr.m`.
    fn resolve_self(&self, raw: &str, rest: &str, ctx: &CallerContext<'_>) -> Resolution {
        let Some(class_fqn) = ctx.class_fqn else {
            return Resolution::unresolved(raw);
        };

        let segments: Vec<&str> = rest.split('.').collect();
        match segments.len() {
            1 => {
                // self.m resolves onto the enclosing class when the
                // method is known; otherwise keep the class-qualified
                // prefix, unresolved.
                let candidate = format!("{class_fqn}.{rest}");
                if self.known_callables.contains(&candidate) {
                    let return_type = self.return_type_of(&candidate);
                    Resolution::resolved(candidate, return_type)
                } else {
                    Resolution {
                        fqn: candidate,
                        resolved: false,
                        return_type: None,
                    }
                }
            }
            2 => {
                // self.attr.m goes through the attribute registry; only
                // builtin-typed attributes resolve in this release.
                let (attr, method) = (segments[0], segments[1]);
                let attr_type = self
                    .attributes
                    .and_then(|reg| reg.attribute_type(class_fqn, attr));
                if let Some(attr_type) = attr_type {
                    if attr_type.is_builtin() && !attr_type.is_placeholder() {
                        if let Some(found) = self.builtin_method(&attr_type.type_fqn, method) {
                            return found;
                        }
                    }
                }
                Resolution::unresolved(raw)
            }
            // Deeper chains are out of scope; never guess.
            _ => Resolution::unresolved(raw),
        }
    }

    /// Step 3: bare names.
    fn resolve_bare(&self, name: &str, ctx: &CallerContext<'_>) -> Resolution {
        // 3a. Python built-in call table.
        if PYTHON_BUILTIN_CALLS().contains(&name) {
            let return_type = match name {
                "input" | "raw_input" => Some(TypeInfo::new(
                    "builtins.str",
                    1.0,
                    TypeSource::Heuristic,
                )),
                _ => None,
            };
            return Resolution::resolved(format!("builtins.{name}"), return_type);
        }

        // 3b. Import map, validated against the module registry.
        if let Some(fqn) = ctx.import_map.get(name) {
            if self.valid_project_fqn(fqn) {
                let return_type = self.return_type_of(fqn);
                return Resolution::resolved(fqn.clone(), return_type);
            }
            // Imported but external to the project: stdlib and
            // framework rules still get a chance with the expanded name.
            if let Some(found) = self.resolve_external(fqn) {
                return found;
            }
        }

        // 3c. Same module.
        let candidate = format!("{}.{name}", ctx.module_fqn);
        if self.known_callables.contains(&candidate) {
            let return_type = self.return_type_of(&candidate);
            return Resolution::resolved(candidate, return_type);
        }

        Resolution::unresolved(name)
    }

    /// Steps 4-8: qualified names.
    fn resolve_qualified(&self, target: &str, ctx: &CallerContext<'_>) -> Resolution {
        // 4a. Import-expanded candidate, validated.
        let expanded = ctx.import_map.resolve_target(target).map(|(fqn, rest)| {
            if rest.is_empty() {
                fqn
            } else {
                format!("{fqn}.{rest}")
            }
        });
        if let Some(candidate) = &expanded {
            if self.valid_project_fqn(candidate) {
                let return_type = self.return_type_of(candidate);
                return Resolution::resolved(candidate.clone(), return_type);
            }
        }

        // 4b. Same-module candidate (covers Class.method in this file).
        let local = format!("{}.{target}", ctx.module_fqn);
        if self.known_callables.contains(&local) {
            let return_type = self.return_type_of(&local);
            return Resolution::resolved(local, return_type);
        }

        // Steps 5-6. Methods on typed variables (two segments only).
        let segments: Vec<&str> = target.split('.').collect();
        if segments.len() == 2 {
            if let Some(found) = self.resolve_typed_variable(segments[0], segments[1], ctx) {
                return found;
            }
        }

        // Steps 7-8. Stdlib catalog, then framework rules, preferring
        // the import-expanded candidate over the raw text.
        if let Some(candidate) = &expanded {
            if let Some(found) = self.resolve_external(candidate) {
                return found;
            }
        }
        if let Some(found) = self.resolve_external(target) {
            return found;
        }

        Resolution::unresolved(target)
    }

    /// Steps 5-6: `v.m` where `v` has an inferred type in the caller's
    /// scope. Placeholder types are skipped without terminating the
    /// cascade.
    fn resolve_typed_variable(
        &self,
        var: &str,
        method: &str,
        ctx: &CallerContext<'_>,
    ) -> Option<Resolution> {
        let engine = self.engine?;
        let binding = engine.binding(ctx.caller_fqn, var)?;
        let type_info = &binding.type_info;

        if type_info.is_placeholder() {
            return None;
        }

        // Step 5: builtin methods need the method to exist in the table.
        if type_info.is_builtin() && type_info.confidence >= HEURISTIC_CONFIDENCE {
            if let Some(found) = self.builtin_method(&type_info.type_fqn, method) {
                return Some(found);
            }
            return None;
        }

        // Step 6: high-confidence user class, no existence check.
        if !type_info.is_builtin() && type_info.confidence >= STRICT_CONFIDENCE {
            let fqn = format!("{}.{method}", type_info.type_fqn);
            let return_type = self.return_type_of(&fqn);
            return Some(Resolution::resolved(fqn, return_type));
        }

        None
    }

    /// Steps 7-8 against one candidate name.
    fn resolve_external(&self, candidate: &str) -> Option<Resolution> {
        if let Some(stdlib) = self.stdlib {
            if stdlib.validate_fqn(candidate) {
                let return_type = stdlib
                    .return_type(candidate)
                    .map(|t| TypeInfo::new(qualify_builtin(&t), 0.9, TypeSource::Heuristic));
                return Some(Resolution::resolved(candidate, return_type));
            }
        }

        // Local project modules shadow framework prefixes; import and
        // same-module steps already ran, so reaching this point means
        // no project module claimed the name.
        if let Some(hit) = self.frameworks.resolve(candidate) {
            return Some(Resolution::resolved(hit.fqn, None));
        }

        None
    }

    /// Step 9: `a().b().c()` walked left to right, each step typed
    /// against the previous step's return type. An untyped or
    /// unresolved step aborts the chain.
    fn resolve_chain(&self, target: &str, ctx: &CallerContext<'_>) -> Resolution {
        let mut steps = target.split("()").peekable();
        let Some(base) = steps.next() else {
            return Resolution::unresolved(target);
        };
        let base = base.trim();
        if base.is_empty() || base.contains('(') {
            return Resolution::unresolved(target);
        }

        let mut current = self.resolve(base, ctx);
        if !current.resolved {
            return Resolution::unresolved(target);
        }

        for step in steps {
            let step = step.trim();
            if step.is_empty() {
                continue;
            }
            let Some(method) = step.strip_prefix('.') else {
                return Resolution::unresolved(target);
            };
            let Some(running) = current.return_type.clone() else {
                return Resolution::unresolved(target);
            };
            if running.is_placeholder() {
                return Resolution::unresolved(target);
            }

            if running.is_builtin() {
                match self.builtin_method(&running.type_fqn, method) {
                    Some(found) => current = found,
                    None => return Resolution::unresolved(target),
                }
            } else {
                let fqn = format!("{}.{method}", running.type_fqn);
                let return_type = self.return_type_of(&fqn);
                current = Resolution::resolved(fqn, return_type);
            }
        }

        current
    }

    /// Builtin method lookup producing a resolution with return type.
    fn builtin_method(&self, type_fqn: &str, method: &str) -> Option<Resolution> {
        let builtins = self.builtins?;
        let entry = builtins.get_method(type_fqn, method)?;
        let bare = type_fqn.strip_prefix("builtins.").unwrap_or(type_fqn);
        Some(Resolution::resolved(
            format!("builtins.{bare}.{method}"),
            entry.return_type,
        ))
    }

    /// Valid when the FQN is a project module or a member of one.
    fn valid_project_fqn(&self, fqn: &str) -> bool {
        self.modules.is_module(fqn) || self.modules.has_parent_module(fqn)
    }

    /// Non-placeholder collected return type of a function.
    fn return_type_of(&self, fqn: &str) -> Option<TypeInfo> {
        let rt = self.engine?.return_type_of(fqn)?;
        if rt.is_placeholder() {
            None
        } else {
            Some(rt.clone())
        }
    }
}

/// Maps a bare builtin type name from a catalog (`str`) onto its FQN;
/// dotted names pass through.
fn qualify_builtin(name: &str) -> String {
    if name.contains('.') {
        name.to_owned()
    } else {
        format!("builtins.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{FunctionScope, Location, VariableBinding};
    use std::path::{Path, PathBuf};

    struct FakeStdlib;

    impl StdlibQuery for FakeStdlib {
        fn validate_fqn(&self, fqn: &str) -> bool {
            fqn == "os.getcwd" || fqn == "os.path.join"
        }

        fn return_type(&self, fqn: &str) -> Option<String> {
            (fqn == "os.getcwd").then(|| "str".to_owned())
        }
    }

    struct Fixture {
        modules: ModuleRegistry,
        frameworks: FrameworkTable,
        builtins: BuiltinRegistry,
        engine: TypeInferenceEngine,
        attributes: AttributeRegistry,
        known: FxHashSet<String>,
        import_map: ImportMap,
    }

    impl Fixture {
        fn new() -> Self {
            let root = Path::new("/proj");
            let files = vec![root.join("app.py"), root.join("utils.py")];
            let (modules, _) = ModuleRegistry::from_files(root, &files);

            let mut known = FxHashSet::default();
            known.insert("app.main".to_owned());
            known.insert("app.helper".to_owned());
            known.insert("app.User".to_owned());
            known.insert("app.User.save".to_owned());
            known.insert("utils.sanitize".to_owned());

            let mut engine = TypeInferenceEngine::new();
            let mut scope = FunctionScope::new("app.main");
            scope.bind(VariableBinding {
                var_name: "data".to_owned(),
                type_info: TypeInfo::new("builtins.str", 1.0, TypeSource::Literal),
                assigned_from: None,
                location: Location {
                    file: PathBuf::from("/proj/app.py"),
                    line: 2,
                },
            });
            scope.bind(VariableBinding {
                var_name: "user".to_owned(),
                type_info: TypeInfo::new("app.User", 0.9, TypeSource::ClassInstantiation),
                assigned_from: Some("app.User".to_owned()),
                location: Location {
                    file: PathBuf::from("/proj/app.py"),
                    line: 3,
                },
            });
            scope.bind(VariableBinding {
                var_name: "pending".to_owned(),
                type_info: TypeInfo::new(
                    "call:make_thing",
                    0.5,
                    TypeSource::FunctionCallPlaceholder,
                ),
                assigned_from: None,
                location: Location {
                    file: PathBuf::from("/proj/app.py"),
                    line: 4,
                },
            });
            engine.scopes.insert("app.main".to_owned(), scope);
            engine.return_types.insert(
                "app.helper".to_owned(),
                TypeInfo::new("builtins.str", 1.0, TypeSource::ReturnLiteral),
            );

            let mut import_map = ImportMap::default();
            import_map
                .imports
                .insert("sanitize".to_owned(), "utils.sanitize".to_owned());
            import_map
                .imports
                .insert("os".to_owned(), "os".to_owned());

            Self {
                modules,
                frameworks: FrameworkTable::new(),
                builtins: BuiltinRegistry::new(),
                engine,
                attributes: AttributeRegistry::new(),
                known,
                import_map,
            }
        }

        fn resolver(&self) -> CallResolver<'_> {
            CallResolver {
                builtins: Some(&self.builtins),
                modules: &self.modules,
                frameworks: &self.frameworks,
                engine: Some(&self.engine),
                attributes: Some(&self.attributes),
                stdlib: Some(&FAKE_STDLIB),
                known_callables: &self.known,
            }
        }

        fn ctx(&self) -> CallerContext<'_> {
            CallerContext {
                module_fqn: "app",
                caller_fqn: "app.main",
                class_fqn: None,
                import_map: &self.import_map,
            }
        }
    }

    static FAKE_STDLIB: FakeStdlib = FakeStdlib;

    #[test]
    fn test_bare_builtin() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("eval", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "builtins.eval");

        let r = fx.resolver().resolve("input", &fx.ctx());
        assert_eq!(r.fqn, "builtins.input");
        assert_eq!(r.return_type.unwrap().type_fqn, "builtins.str");
    }

    #[test]
    fn test_bare_import() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("sanitize", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "utils.sanitize");
    }

    #[test]
    fn test_same_module_function() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("helper", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "app.helper");
        assert_eq!(r.return_type.unwrap().type_fqn, "builtins.str");
    }

    #[test]
    fn test_unknown_bare_name() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("mystery", &fx.ctx());
        assert!(!r.resolved);
        assert_eq!(r.fqn, "mystery");
    }

    #[test]
    fn test_builtin_method_on_typed_variable() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("data.upper", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "builtins.str.upper");

        // Method that does not exist on str falls through unresolved.
        let r = fx.resolver().resolve("data.append", &fx.ctx());
        assert!(!r.resolved);
    }

    #[test]
    fn test_user_class_method_on_typed_variable() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("user.save", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "app.User.save");
    }

    #[test]
    fn test_placeholder_variable_skipped() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("pending.run", &fx.ctx());
        assert!(!r.resolved);
        assert_eq!(r.fqn, "pending.run");
    }

    #[test]
    fn test_stdlib_resolution() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("os.getcwd", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "os.getcwd");
        assert_eq!(r.return_type.unwrap().type_fqn, "builtins.str");
    }

    #[test]
    fn test_framework_orm() {
        let fx = Fixture::new();
        let r = fx.resolver().resolve("Widget.objects.filter", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "django.db.models.Manager.filter");
    }

    #[test]
    fn test_self_method() {
        let fx = Fixture::new();
        let ctx = CallerContext {
            module_fqn: "app",
            caller_fqn: "app.User.rename",
            class_fqn: Some("app.User"),
            import_map: &fx.import_map,
        };
        let r = fx.resolver().resolve("self.save", &ctx);
        assert!(r.resolved);
        assert_eq!(r.fqn, "app.User.save");

        // Unknown method keeps the class prefix but stays unresolved.
        let r = fx.resolver().resolve("self.missing", &ctx);
        assert!(!r.resolved);
        assert_eq!(r.fqn, "app.User.missing");
    }

    #[test]
    fn test_self_attribute_chain() {
        use crate::inference::attributes::{ClassAttribute, ClassAttributes};
        use rustc_hash::FxHashMap;

        let fx = Fixture::new();
        let mut attributes = FxHashMap::default();
        attributes.insert(
            "items".to_owned(),
            ClassAttribute {
                name: "items".to_owned(),
                type_info: TypeInfo::new("builtins.list", 1.0, TypeSource::SelfAttribute),
                assigned_in: "__init__".to_owned(),
                location: Location {
                    file: PathBuf::from("/proj/app.py"),
                    line: 2,
                },
            },
        );
        fx.attributes.insert(ClassAttributes {
            class_fqn: "app.User".to_owned(),
            attributes,
            methods: vec!["app.User.save".to_owned()],
            file_path: PathBuf::from("/proj/app.py"),
        });

        let ctx = CallerContext {
            module_fqn: "app",
            caller_fqn: "app.User.add",
            class_fqn: Some("app.User"),
            import_map: &fx.import_map,
        };
        let r = fx.resolver().resolve("self.items.append", &ctx);
        assert!(r.resolved);
        assert_eq!(r.fqn, "builtins.list.append");

        // Chains deeper than two dots stay unresolved.
        let r = fx.resolver().resolve("self.items.data.append", &ctx);
        assert!(!r.resolved);
    }

    #[test]
    fn test_chain_resolution() {
        let fx = Fixture::new();
        // helper() returns str; .upper() then types as str.
        let r = fx.resolver().resolve("helper().upper", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "builtins.str.upper");
        assert_eq!(r.return_type.unwrap().type_fqn, "builtins.str");

        let r = fx.resolver().resolve("helper().upper().strip", &fx.ctx());
        assert!(r.resolved);
        assert_eq!(r.fqn, "builtins.str.strip");

        // Unresolvable base aborts the chain.
        let r = fx.resolver().resolve("mystery().upper", &fx.ctx());
        assert!(!r.resolved);
    }

    #[test]
    fn test_nil_registries_degrade() {
        let fx = Fixture::new();
        let resolver = CallResolver {
            builtins: None,
            modules: &fx.modules,
            frameworks: &fx.frameworks,
            engine: None,
            attributes: None,
            stdlib: None,
            known_callables: &fx.known,
        };
        let r = resolver.resolve("data.upper", &fx.ctx());
        assert!(!r.resolved);
        let r = resolver.resolve("", &fx.ctx());
        assert!(!r.resolved);
    }
}
