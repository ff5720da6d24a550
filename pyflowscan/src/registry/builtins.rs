//! Static registry of Python built-in types and their methods.
//!
//! The type set is a closed enumeration; anything outside it is either a
//! user class, a stdlib type (see the stdlib registries) or unknown. The
//! registry also classifies literal expressions by their source text.

use crate::inference::types::{TypeInfo, TypeSource};
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

/// The closed set of built-in type names known to the registry.
pub static BUILTIN_TYPES: &[&str] = &[
    "str",
    "list",
    "dict",
    "set",
    "tuple",
    "int",
    "float",
    "bool",
    "bytes",
    "NoneType",
    "dict_keys",
    "dict_values",
    "dict_items",
];

fn int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[+-]?(0[xX][0-9a-fA-F_]+|0[oO][0-7_]+|0[bB][01_]+|\d[\d_]*)$").unwrap()
    })
}

fn float_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[+-]?(\d[\d_]*\.[\d_]*|\.\d[\d_]*|\d[\d_]*(\.[\d_]*)?[eE][+-]?\d+)$").unwrap()
    })
}

/// A method entry on a built-in type.
#[derive(Debug, Clone)]
pub struct BuiltinMethod {
    /// Return type of the method, when statically known.
    /// Methods whose result depends on the element type (e.g. `list.pop`)
    /// exist in the table but carry no return type.
    pub return_type: Option<TypeInfo>,
}

/// Registry of built-in types, their methods and the literal classifier.
#[derive(Debug)]
pub struct BuiltinRegistry {
    methods: FxHashMap<&'static str, FxHashMap<&'static str, Option<&'static str>>>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinRegistry {
    /// Builds the registry with its full method tables.
    #[must_use]
    pub fn new() -> Self {
        let mut methods: FxHashMap<&'static str, FxHashMap<&'static str, Option<&'static str>>> =
            FxHashMap::default();

        let str_methods: &[(&str, Option<&str>)] = &[
            ("upper", Some("str")),
            ("lower", Some("str")),
            ("strip", Some("str")),
            ("lstrip", Some("str")),
            ("rstrip", Some("str")),
            ("title", Some("str")),
            ("capitalize", Some("str")),
            ("casefold", Some("str")),
            ("replace", Some("str")),
            ("format", Some("str")),
            ("join", Some("str")),
            ("center", Some("str")),
            ("zfill", Some("str")),
            ("split", Some("list")),
            ("rsplit", Some("list")),
            ("splitlines", Some("list")),
            ("partition", Some("tuple")),
            ("rpartition", Some("tuple")),
            ("encode", Some("bytes")),
            ("startswith", Some("bool")),
            ("endswith", Some("bool")),
            ("isdigit", Some("bool")),
            ("isalpha", Some("bool")),
            ("isalnum", Some("bool")),
            ("islower", Some("bool")),
            ("isupper", Some("bool")),
            ("isspace", Some("bool")),
            ("find", Some("int")),
            ("rfind", Some("int")),
            ("index", Some("int")),
            ("count", Some("int")),
        ];

        let list_methods: &[(&str, Option<&str>)] = &[
            ("append", Some("NoneType")),
            ("extend", Some("NoneType")),
            ("insert", Some("NoneType")),
            ("remove", Some("NoneType")),
            ("clear", Some("NoneType")),
            ("reverse", Some("NoneType")),
            ("sort", Some("NoneType")),
            ("count", Some("int")),
            ("index", Some("int")),
            ("copy", Some("list")),
            ("pop", None),
        ];

        let dict_methods: &[(&str, Option<&str>)] = &[
            ("keys", Some("dict_keys")),
            ("values", Some("dict_values")),
            ("items", Some("dict_items")),
            ("update", Some("NoneType")),
            ("clear", Some("NoneType")),
            ("copy", Some("dict")),
            ("popitem", Some("tuple")),
            ("get", None),
            ("pop", None),
            ("setdefault", None),
        ];

        let set_methods: &[(&str, Option<&str>)] = &[
            ("add", Some("NoneType")),
            ("remove", Some("NoneType")),
            ("discard", Some("NoneType")),
            ("clear", Some("NoneType")),
            ("union", Some("set")),
            ("intersection", Some("set")),
            ("difference", Some("set")),
            ("symmetric_difference", Some("set")),
            ("copy", Some("set")),
            ("issubset", Some("bool")),
            ("issuperset", Some("bool")),
            ("isdisjoint", Some("bool")),
            ("pop", None),
        ];

        let tuple_methods: &[(&str, Option<&str>)] =
            &[("count", Some("int")), ("index", Some("int"))];

        let int_methods: &[(&str, Option<&str>)] = &[
            ("bit_length", Some("int")),
            ("bit_count", Some("int")),
            ("to_bytes", Some("bytes")),
            ("conjugate", Some("int")),
        ];

        let float_methods: &[(&str, Option<&str>)] =
            &[("is_integer", Some("bool")), ("hex", Some("str"))];

        let bytes_methods: &[(&str, Option<&str>)] = &[
            ("decode", Some("str")),
            ("hex", Some("str")),
            ("upper", Some("bytes")),
            ("lower", Some("bytes")),
            ("strip", Some("bytes")),
            ("replace", Some("bytes")),
            ("split", Some("list")),
            ("startswith", Some("bool")),
            ("endswith", Some("bool")),
            ("find", Some("int")),
            ("count", Some("int")),
        ];

        let view_methods: &[(&str, Option<&str>)] = &[("isdisjoint", Some("bool"))];

        methods.insert("str", str_methods.iter().copied().collect());
        methods.insert("list", list_methods.iter().copied().collect());
        methods.insert("dict", dict_methods.iter().copied().collect());
        methods.insert("set", set_methods.iter().copied().collect());
        methods.insert("tuple", tuple_methods.iter().copied().collect());
        methods.insert("int", int_methods.iter().copied().collect());
        methods.insert("float", float_methods.iter().copied().collect());
        methods.insert("bool", int_methods.iter().copied().collect());
        methods.insert("bytes", bytes_methods.iter().copied().collect());
        methods.insert("NoneType", FxHashMap::default());
        methods.insert("dict_keys", view_methods.iter().copied().collect());
        methods.insert("dict_values", view_methods.iter().copied().collect());
        methods.insert("dict_items", view_methods.iter().copied().collect());

        Self { methods }
    }

    /// True if `name` (bare, no `builtins.` prefix) is a known type.
    #[must_use]
    pub fn has_type(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Looks up a method on a type. `type_fqn` may carry the `builtins.`
    /// prefix or be the bare type name.
    #[must_use]
    pub fn get_method(&self, type_fqn: &str, method: &str) -> Option<BuiltinMethod> {
        let bare = type_fqn.strip_prefix("builtins.").unwrap_or(type_fqn);
        let entry = self.methods.get(bare)?.get(method)?;
        Some(BuiltinMethod {
            return_type: entry
                .map(|t| TypeInfo::new(format!("builtins.{t}"), 1.0, TypeSource::Heuristic)),
        })
    }

    /// Classifies a literal expression by its (trimmed) source text.
    ///
    /// Returns a `TypeInfo` with confidence 1.0 and source `literal`, or
    /// `None` when the text is not a recognizable closed literal. The
    /// classifier never guesses: unclosed strings and ambiguous tokens
    /// yield `None`.
    #[must_use]
    pub fn infer_literal_type(&self, literal: &str) -> Option<TypeInfo> {
        let text = literal.trim();
        if text.is_empty() {
            return None;
        }

        classify_literal(text).map(|name| {
            TypeInfo::new(format!("builtins.{name}"), 1.0, TypeSource::Literal)
        })
    }
}

/// Returns the bare builtin type name for a literal token, if any.
fn classify_literal(text: &str) -> Option<&'static str> {
    match text {
        "True" | "False" => return Some("bool"),
        "None" => return Some("NoneType"),
        _ => {}
    }

    if let Some(kind) = classify_string_literal(text) {
        return Some(kind);
    }

    if int_re().is_match(text) {
        return Some("int");
    }
    if float_re().is_match(text) {
        return Some("float");
    }

    if text.starts_with('[') {
        return text.ends_with(']').then_some("list");
    }
    if text.starts_with('(') {
        return text.ends_with(')').then_some("tuple");
    }
    if text.starts_with('{') {
        if !text.ends_with('}') {
            return None;
        }
        // Empty braces are a dict; a colon at brace depth 0 makes it a
        // dict, anything else is a set literal.
        let inner = &text[1..text.len() - 1];
        if inner.trim().is_empty() {
            return Some("dict");
        }
        return if has_top_level_colon(inner) {
            Some("dict")
        } else {
            Some("set")
        };
    }

    None
}

/// Classifies quoted string/bytes literals, honoring `r`/`u`/`f`/`b`
/// prefixes. Unterminated quotes yield `None`.
fn classify_string_literal(text: &str) -> Option<&'static str> {
    let lower_prefix: String = text
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();
    if lower_prefix.len() > 2 {
        return None;
    }
    let is_bytes = lower_prefix.contains('b');
    if !lower_prefix.is_empty() && !lower_prefix.chars().all(|c| "rubf".contains(c)) {
        return None;
    }

    let body = &text[lower_prefix.len()..];
    let quoted = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .any(|q| body.len() >= q.len() * 2 && body.starts_with(q) && body.ends_with(q));

    if quoted {
        Some(if is_bytes { "bytes" } else { "str" })
    } else {
        None
    }
}

/// True if the text contains a `:` outside of any nested brackets,
/// braces, parens or string quotes.
fn has_top_level_colon(inner: &str) -> bool {
    let mut depth = 0_i32;
    let mut quote: Option<char> = None;
    for c in inner.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' | '{' | '(' => depth += 1,
                ']' | '}' | ')' => depth -= 1,
                ':' if depth == 0 => return true,
                _ => {}
            },
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Option<String> {
        BuiltinRegistry::new()
            .infer_literal_type(text)
            .map(|t| t.type_fqn)
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(classify("\"hello\""), Some("builtins.str".to_owned()));
        assert_eq!(classify("'hi'"), Some("builtins.str".to_owned()));
        assert_eq!(classify("'''doc'''"), Some("builtins.str".to_owned()));
        assert_eq!(classify("f'hi {x}'"), Some("builtins.str".to_owned()));
        assert_eq!(classify("b'raw'"), Some("builtins.bytes".to_owned()));
        assert_eq!(classify("rb'raw'"), Some("builtins.bytes".to_owned()));
        // Unterminated string must not classify
        assert_eq!(classify("\"oops"), None);
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(classify("42"), Some("builtins.int".to_owned()));
        assert_eq!(classify("-7"), Some("builtins.int".to_owned()));
        assert_eq!(classify("1_000_000"), Some("builtins.int".to_owned()));
        assert_eq!(classify("0xFF"), Some("builtins.int".to_owned()));
        assert_eq!(classify("0o755"), Some("builtins.int".to_owned()));
        assert_eq!(classify("0b1010"), Some("builtins.int".to_owned()));
        assert_eq!(classify("3.14"), Some("builtins.float".to_owned()));
        assert_eq!(classify(".5"), Some("builtins.float".to_owned()));
        assert_eq!(classify("1e10"), Some("builtins.float".to_owned()));
        assert_eq!(classify("2.5e-3"), Some("builtins.float".to_owned()));
    }

    #[test]
    fn test_keyword_literals() {
        assert_eq!(classify("True"), Some("builtins.bool".to_owned()));
        assert_eq!(classify("False"), Some("builtins.bool".to_owned()));
        assert_eq!(classify("None"), Some("builtins.NoneType".to_owned()));
    }

    #[test]
    fn test_container_literals() {
        assert_eq!(classify("[1, 2, 3]"), Some("builtins.list".to_owned()));
        assert_eq!(classify("(1, 2)"), Some("builtins.tuple".to_owned()));
        assert_eq!(classify("{}"), Some("builtins.dict".to_owned()));
        assert_eq!(classify("{'a': 1}"), Some("builtins.dict".to_owned()));
        assert_eq!(classify("{1, 2, 3}"), Some("builtins.set".to_owned()));
        // Colon nested in a value does not make the outer braces a dict
        assert_eq!(classify("{(1, 2)}"), Some("builtins.set".to_owned()));
    }

    #[test]
    fn test_ambiguous_yields_none() {
        assert_eq!(classify("foo"), None);
        assert_eq!(classify("[1, 2"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("1 + 2"), None);
    }

    #[test]
    fn test_method_lookup() {
        let reg = BuiltinRegistry::new();
        let m = reg.get_method("builtins.str", "upper").unwrap();
        assert_eq!(m.return_type.unwrap().type_fqn, "builtins.str");

        let m = reg.get_method("list", "append").unwrap();
        assert_eq!(m.return_type.unwrap().type_fqn, "builtins.NoneType");

        // pop exists but has no statically known return type
        let m = reg.get_method("builtins.list", "pop").unwrap();
        assert!(m.return_type.is_none());

        assert!(reg.get_method("builtins.str", "append").is_none());
        assert!(reg.get_method("builtins.Frob", "x").is_none());
    }
}
