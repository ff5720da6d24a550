//! Def-use chains over the statement IR.
//!
//! Statements are flattened depth-first (parent first, then nested
//! body, then else branch) and indexed by the variables they define and
//! use. The chain also exposes summary statistics used for diagnostics
//! (undefined and dead variables).

use super::ir::Statement;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Def-use index of one function.
#[derive(Debug, Default, Clone)]
pub struct DefUseChain {
    /// Flattened statements, in traversal order.
    statements: Vec<Statement>,
    /// Variable to indices of statements defining it, in order.
    defs: FxHashMap<String, Vec<usize>>,
    /// Variable to indices of statements using it, in order.
    uses: FxHashMap<String, Vec<usize>>,
}

/// Aggregate statistics over a def-use chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefUseStats {
    /// Number of distinct variables seen in defs or uses.
    pub num_variables: usize,
    /// Total def entries.
    pub num_defs: usize,
    /// Total use entries.
    pub num_uses: usize,
    /// Largest def list of any variable.
    pub max_defs_per_variable: usize,
    /// Largest use list of any variable.
    pub max_uses_per_variable: usize,
    /// Variables used but never defined, sorted.
    pub undefined_variables: Vec<String>,
    /// Variables defined but never used, sorted.
    pub dead_variables: Vec<String>,
}

impl DefUseChain {
    /// Builds the chain from a statement tree.
    #[must_use]
    pub fn build(statements: &[Statement]) -> Self {
        let mut flattened = Vec::new();
        flatten_into(statements, &mut flattened);

        let mut chain = Self {
            statements: flattened,
            defs: FxHashMap::default(),
            uses: FxHashMap::default(),
        };

        for (index, stmt) in chain.statements.iter().enumerate() {
            if let Some(def) = &stmt.def {
                if !def.is_empty() {
                    chain.defs.entry(def.clone()).or_default().push(index);
                }
            }
            for used in &stmt.uses {
                if !used.is_empty() {
                    chain.uses.entry(used.clone()).or_default().push(index);
                }
            }
        }

        chain
    }

    /// The flattened statement list, in traversal order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Statements defining a variable, in order.
    #[must_use]
    pub fn get_defs(&self, var: &str) -> Vec<&Statement> {
        self.defs
            .get(var)
            .map(|ids| ids.iter().map(|&i| &self.statements[i]).collect())
            .unwrap_or_default()
    }

    /// Statements using a variable, in order.
    #[must_use]
    pub fn get_uses(&self, var: &str) -> Vec<&Statement> {
        self.uses
            .get(var)
            .map(|ids| ids.iter().map(|&i| &self.statements[i]).collect())
            .unwrap_or_default()
    }

    /// True when the variable has at least one def.
    #[must_use]
    pub fn is_defined(&self, var: &str) -> bool {
        self.defs.get(var).is_some_and(|v| !v.is_empty())
    }

    /// True when the variable has at least one use.
    #[must_use]
    pub fn is_used(&self, var: &str) -> bool {
        self.uses.get(var).is_some_and(|v| !v.is_empty())
    }

    /// Computes the chain's summary statistics.
    #[must_use]
    pub fn stats(&self) -> DefUseStats {
        let mut variables: Vec<&String> = self.defs.keys().chain(self.uses.keys()).collect();
        variables.sort();
        variables.dedup();

        let mut undefined: Vec<String> = self
            .uses
            .keys()
            .filter(|v| !self.is_defined(v))
            .cloned()
            .collect();
        undefined.sort();

        let mut dead: Vec<String> = self
            .defs
            .keys()
            .filter(|v| !self.is_used(v))
            .cloned()
            .collect();
        dead.sort();

        DefUseStats {
            num_variables: variables.len(),
            num_defs: self.defs.values().map(Vec::len).sum(),
            num_uses: self.uses.values().map(Vec::len).sum(),
            max_defs_per_variable: self.defs.values().map(Vec::len).max().unwrap_or(0),
            max_uses_per_variable: self.uses.values().map(Vec::len).max().unwrap_or(0),
            undefined_variables: undefined,
            dead_variables: dead,
        }
    }
}

/// Depth-first flattening: parent, nested body, else branch.
fn flatten_into(statements: &[Statement], out: &mut Vec<Statement>) {
    for stmt in statements {
        let mut flat = stmt.clone();
        let nested = std::mem::take(&mut flat.nested);
        let else_branch = std::mem::take(&mut flat.else_branch);
        out.push(flat);
        flatten_into(&nested, out);
        flatten_into(&else_branch, out);
    }
}
