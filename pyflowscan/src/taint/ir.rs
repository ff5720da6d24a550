//! Statement-level IR extracted from function bodies.
//!
//! The IR is deliberately small: each statement carries at most one
//! defined variable, the bare identifiers it uses, the textual call
//! target if it performs a call, and nested statements for control
//! flow. Variables are bare names, never FQNs.

use crate::parser::{line_of, named_children_of, node_text, ParsedSource};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tree_sitter::Node;

/// Statement discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    /// `x = expr` without a call on the right-hand side.
    Assignment,
    /// A call, bare or feeding an assignment (`x = f(...)`).
    Call,
    /// `return expr`.
    Return,
    /// `if ...:` with nested body and else branch.
    If,
    /// `for x in xs:`.
    For,
    /// `while cond:`.
    While,
    /// `with expr as name:`.
    With,
    /// `try:` with handlers in the else branch.
    Try,
    /// `raise expr`.
    Raise,
    /// `import ...` / `from ... import ...`.
    Import,
    /// Anything else with data flow (bare expression).
    Expression,
}

/// One IR statement. Statements form a DAG by nesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    /// Statement discriminator.
    pub kind: StatementKind,
    /// Variable defined by this statement, if exactly one.
    pub def: Option<String>,
    /// Bare identifiers read by this statement.
    pub uses: SmallVec<[String; 4]>,
    /// 1-indexed source line.
    pub line: usize,
    /// Textual call target (e.g. `sanitize`, `cursor.execute`) when the
    /// statement performs a call, regardless of kind.
    pub call_target: Option<String>,
    /// Nested statements (loop/conditional bodies).
    pub nested: Vec<Statement>,
    /// Else/handler branch statements.
    pub else_branch: Vec<Statement>,
}

impl Statement {
    fn new(kind: StatementKind, line: usize) -> Self {
        Self {
            kind,
            def: None,
            uses: SmallVec::new(),
            line,
            call_target: None,
            nested: Vec::new(),
            else_branch: Vec::new(),
        }
    }
}

/// Extracts the statement IR of a block (function body or module).
#[must_use]
pub fn extract_statements(block: Node<'_>, parsed: &ParsedSource) -> Vec<Statement> {
    let mut out = Vec::new();
    for child in named_children_of(block) {
        if let Some(stmt) = extract_statement(child, parsed) {
            out.push(stmt);
        }
    }
    out
}

fn extract_statement(node: Node<'_>, parsed: &ParsedSource) -> Option<Statement> {
    let line = line_of(node);
    match node.kind() {
        "expression_statement" => {
            let inner = named_children_of(node).into_iter().next()?;
            match inner.kind() {
                "assignment" => extract_assignment(inner, parsed),
                "augmented_assignment" => extract_augmented(inner, parsed),
                "call" => {
                    let mut stmt = Statement::new(StatementKind::Call, line);
                    apply_call(&mut stmt, inner, parsed);
                    Some(stmt)
                }
                _ => {
                    let mut stmt = Statement::new(StatementKind::Expression, line);
                    collect_uses(inner, parsed, &mut stmt.uses);
                    Some(stmt)
                }
            }
        }
        "return_statement" => {
            let mut stmt = Statement::new(StatementKind::Return, line);
            if let Some(value) = named_children_of(node).into_iter().next() {
                if value.kind() == "call" {
                    apply_call(&mut stmt, value, parsed);
                } else {
                    collect_uses(value, parsed, &mut stmt.uses);
                }
            }
            Some(stmt)
        }
        "if_statement" => {
            let mut stmt = Statement::new(StatementKind::If, line);
            if let Some(cond) = node.child_by_field_name("condition") {
                collect_uses(cond, parsed, &mut stmt.uses);
            }
            if let Some(body) = node.child_by_field_name("consequence") {
                stmt.nested = extract_statements(body, parsed);
            }
            for clause in named_children_of(node) {
                match clause.kind() {
                    "elif_clause" => {
                        if let Some(body) = clause.child_by_field_name("consequence") {
                            stmt.else_branch.extend(extract_statements(body, parsed));
                        }
                    }
                    "else_clause" => {
                        if let Some(body) = clause.child_by_field_name("body") {
                            stmt.else_branch.extend(extract_statements(body, parsed));
                        }
                    }
                    _ => {}
                }
            }
            Some(stmt)
        }
        "for_statement" => {
            let mut stmt = Statement::new(StatementKind::For, line);
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "identifier" {
                    stmt.def = Some(node_text(left, &parsed.source).to_owned());
                }
            }
            if let Some(right) = node.child_by_field_name("right") {
                collect_uses(right, parsed, &mut stmt.uses);
            }
            if let Some(body) = node.child_by_field_name("body") {
                stmt.nested = extract_statements(body, parsed);
            }
            if let Some(alt) = node.child_by_field_name("alternative") {
                if let Some(body) = alt.child_by_field_name("body") {
                    stmt.else_branch = extract_statements(body, parsed);
                }
            }
            Some(stmt)
        }
        "while_statement" => {
            let mut stmt = Statement::new(StatementKind::While, line);
            if let Some(cond) = node.child_by_field_name("condition") {
                collect_uses(cond, parsed, &mut stmt.uses);
            }
            if let Some(body) = node.child_by_field_name("body") {
                stmt.nested = extract_statements(body, parsed);
            }
            if let Some(alt) = node.child_by_field_name("alternative") {
                if let Some(body) = alt.child_by_field_name("body") {
                    stmt.else_branch = extract_statements(body, parsed);
                }
            }
            Some(stmt)
        }
        "with_statement" => {
            let mut stmt = Statement::new(StatementKind::With, line);
            collect_with_items(node, parsed, &mut stmt);
            if let Some(body) = node.child_by_field_name("body") {
                stmt.nested = extract_statements(body, parsed);
            }
            Some(stmt)
        }
        "try_statement" => {
            let mut stmt = Statement::new(StatementKind::Try, line);
            if let Some(body) = node.child_by_field_name("body") {
                stmt.nested = extract_statements(body, parsed);
            }
            for clause in named_children_of(node) {
                match clause.kind() {
                    "except_clause" | "finally_clause" | "else_clause" => {
                        for block in named_children_of(clause) {
                            if block.kind() == "block" {
                                stmt.else_branch.extend(extract_statements(block, parsed));
                            }
                        }
                    }
                    _ => {}
                }
            }
            Some(stmt)
        }
        "raise_statement" => {
            let mut stmt = Statement::new(StatementKind::Raise, line);
            for child in named_children_of(node) {
                collect_uses(child, parsed, &mut stmt.uses);
            }
            Some(stmt)
        }
        "match_statement" => {
            // Case bodies behave like conditional branches.
            let mut stmt = Statement::new(StatementKind::If, line);
            if let Some(subject) = node.child_by_field_name("subject") {
                collect_uses(subject, parsed, &mut stmt.uses);
            }
            if let Some(body) = node.child_by_field_name("body") {
                for case in named_children_of(body) {
                    if case.kind() != "case_clause" {
                        continue;
                    }
                    for block in named_children_of(case) {
                        if block.kind() == "block" {
                            stmt.nested.extend(extract_statements(block, parsed));
                        }
                    }
                }
            }
            Some(stmt)
        }
        "assert_statement" | "delete_statement" => {
            let mut stmt = Statement::new(StatementKind::Expression, line);
            for child in named_children_of(node) {
                collect_uses(child, parsed, &mut stmt.uses);
            }
            Some(stmt)
        }
        "import_statement" | "import_from_statement" => {
            Some(Statement::new(StatementKind::Import, line))
        }
        _ => None,
    }
}

fn extract_assignment(assign: Node<'_>, parsed: &ParsedSource) -> Option<Statement> {
    let line = line_of(assign);
    let left = assign.child_by_field_name("left")?;
    let right = assign.child_by_field_name("right")?;

    let mut stmt = if right.kind() == "call" {
        let mut stmt = Statement::new(StatementKind::Call, line);
        apply_call(&mut stmt, right, parsed);
        stmt
    } else {
        let mut stmt = Statement::new(StatementKind::Assignment, line);
        collect_uses(right, parsed, &mut stmt.uses);
        stmt
    };

    if left.kind() == "identifier" {
        stmt.def = Some(node_text(left, &parsed.source).to_owned());
    } else {
        // Attribute or subscript target: no single def, but the target
        // expression still reads its receiver.
        collect_uses(left, parsed, &mut stmt.uses);
    }
    Some(stmt)
}

/// `x += expr` both defines and uses `x`.
fn extract_augmented(assign: Node<'_>, parsed: &ParsedSource) -> Option<Statement> {
    let line = line_of(assign);
    let left = assign.child_by_field_name("left")?;
    let right = assign.child_by_field_name("right")?;

    let mut stmt = Statement::new(StatementKind::Assignment, line);
    if right.kind() == "call" {
        stmt.kind = StatementKind::Call;
        apply_call(&mut stmt, right, parsed);
    } else {
        collect_uses(right, parsed, &mut stmt.uses);
    }

    if left.kind() == "identifier" {
        let name = node_text(left, &parsed.source).to_owned();
        stmt.uses.push(name.clone());
        stmt.def = Some(name);
    }
    Some(stmt)
}

fn collect_with_items(node: Node<'_>, parsed: &ParsedSource, stmt: &mut Statement) {
    for clause in named_children_of(node) {
        if clause.kind() != "with_clause" {
            continue;
        }
        for item in named_children_of(clause) {
            if item.kind() != "with_item" {
                continue;
            }
            for value in named_children_of(item) {
                if value.kind() == "as_pattern" {
                    let children = named_children_of(value);
                    if let Some(expr) = children.first() {
                        if expr.kind() == "call" {
                            apply_call(stmt, *expr, parsed);
                        } else {
                            collect_uses(*expr, parsed, &mut stmt.uses);
                        }
                    }
                    if let Some(alias) = value.child_by_field_name("alias") {
                        stmt.def = Some(node_text(alias, &parsed.source).to_owned());
                    }
                } else if value.kind() == "call" {
                    apply_call(stmt, value, parsed);
                } else {
                    collect_uses(value, parsed, &mut stmt.uses);
                }
            }
        }
    }
}

/// Fills in the call target and argument/receiver uses of a call node.
fn apply_call(stmt: &mut Statement, call: Node<'_>, parsed: &ParsedSource) {
    if let Some(function) = call.child_by_field_name("function") {
        stmt.call_target = Some(node_text(function, &parsed.source).to_owned());
        // A method receiver is a read of its root identifier.
        if function.kind() == "attribute" {
            if let Some(object) = function.child_by_field_name("object") {
                collect_uses(object, parsed, &mut stmt.uses);
            }
        }
    }
    if let Some(args) = call.child_by_field_name("arguments") {
        for arg in named_children_of(args) {
            collect_uses(arg, parsed, &mut stmt.uses);
        }
    }
}

/// Collects the bare identifiers an expression reads. Callee names are
/// not uses; receivers and arguments are.
fn collect_uses(node: Node<'_>, parsed: &ParsedSource, uses: &mut SmallVec<[String; 4]>) {
    match node.kind() {
        "identifier" => {
            let name = node_text(node, &parsed.source).to_owned();
            if !name.is_empty() && !uses.contains(&name) {
                uses.push(name);
            }
        }
        "attribute" => {
            if let Some(object) = node.child_by_field_name("object") {
                collect_uses(object, parsed, uses);
            }
        }
        "call" => {
            if let Some(function) = node.child_by_field_name("function") {
                if function.kind() == "attribute" {
                    if let Some(object) = function.child_by_field_name("object") {
                        collect_uses(object, parsed, uses);
                    }
                }
            }
            if let Some(args) = node.child_by_field_name("arguments") {
                for arg in named_children_of(args) {
                    collect_uses(arg, parsed, uses);
                }
            }
        }
        "keyword_argument" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_uses(value, parsed, uses);
            }
        }
        _ => {
            for child in named_children_of(node) {
                collect_uses(child, parsed, uses);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PyParser;

    fn extract(code: &str) -> Vec<Statement> {
        let mut parser = PyParser::new().unwrap();
        let parsed = parser.parse(code).unwrap();
        extract_statements(parsed.root(), &parsed)
    }

    #[test]
    fn test_assignment_def_and_uses() {
        let stmts = extract("y = x + z\n");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].kind, StatementKind::Assignment);
        assert_eq!(stmts[0].def.as_deref(), Some("y"));
        assert!(stmts[0].uses.contains(&"x".to_owned()));
        assert!(stmts[0].uses.contains(&"z".to_owned()));
    }

    #[test]
    fn test_call_statement() {
        let stmts = extract("data = input()\nexecute(data)\n");
        assert_eq!(stmts[0].kind, StatementKind::Call);
        assert_eq!(stmts[0].def.as_deref(), Some("data"));
        assert_eq!(stmts[0].call_target.as_deref(), Some("input"));

        assert_eq!(stmts[1].kind, StatementKind::Call);
        assert_eq!(stmts[1].def, None);
        assert_eq!(stmts[1].call_target.as_deref(), Some("execute"));
        assert!(stmts[1].uses.contains(&"data".to_owned()));
    }

    #[test]
    fn test_method_receiver_is_a_use() {
        let stmts = extract("out = data.upper()\n");
        assert_eq!(stmts[0].call_target.as_deref(), Some("data.upper"));
        assert!(stmts[0].uses.contains(&"data".to_owned()));
    }

    #[test]
    fn test_augmented_assignment_defs_and_uses_same_var() {
        let stmts = extract("x += y\n");
        assert_eq!(stmts[0].def.as_deref(), Some("x"));
        assert!(stmts[0].uses.contains(&"x".to_owned()));
        assert!(stmts[0].uses.contains(&"y".to_owned()));
    }

    #[test]
    fn test_control_flow_nesting() {
        let stmts = extract("if cond:\n    a = 1\nelse:\n    b = 2\n");
        assert_eq!(stmts[0].kind, StatementKind::If);
        assert!(stmts[0].uses.contains(&"cond".to_owned()));
        assert_eq!(stmts[0].nested.len(), 1);
        assert_eq!(stmts[0].nested[0].def.as_deref(), Some("a"));
        assert_eq!(stmts[0].else_branch.len(), 1);
        assert_eq!(stmts[0].else_branch[0].def.as_deref(), Some("b"));
    }

    #[test]
    fn test_for_loop_defines_target() {
        let stmts = extract("for item in rows:\n    consume(item)\n");
        assert_eq!(stmts[0].kind, StatementKind::For);
        assert_eq!(stmts[0].def.as_deref(), Some("item"));
        assert!(stmts[0].uses.contains(&"rows".to_owned()));
        assert_eq!(stmts[0].nested.len(), 1);
    }

    #[test]
    fn test_return_with_call() {
        let stmts = extract("def f(q):\n    return run(q)\n");
        // Function bodies are extracted separately; pull them here.
        assert!(stmts.is_empty());

        let mut parser = PyParser::new().unwrap();
        let parsed = parser.parse("def f(q):\n    return run(q)\n").unwrap();
        let body = parsed.find_by_kind("function_definition")[0]
            .child_by_field_name("body")
            .unwrap();
        let stmts = extract_statements(body, &parsed);
        assert_eq!(stmts[0].kind, StatementKind::Return);
        assert_eq!(stmts[0].call_target.as_deref(), Some("run"));
        assert!(stmts[0].uses.contains(&"q".to_owned()));
    }

    #[test]
    fn test_fstring_interpolation_uses() {
        let stmts = extract("q = f\"SELECT {user_id}\"\n");
        assert_eq!(stmts[0].def.as_deref(), Some("q"));
        assert!(stmts[0].uses.contains(&"user_id".to_owned()));
    }
}
