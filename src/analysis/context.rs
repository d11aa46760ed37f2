//! Per-file analysis state
//!
//! All symbol tables live in one context created fresh for each source
//! file, populated during the single traversal pass, consulted while the
//! file's call sites resolve, and dropped once the file is evicted from
//! the symbol resolver.

use std::collections::HashMap;

use crate::analysis::model::{DeclaredClass, DeclaredFunction};

/// Module bindings split into two tables: declaration-position keys for
/// scope-accurate CommonJS lookups, alias-name keys for syntactically
/// static ES-module bindings.
#[derive(Debug, Default)]
pub struct ModuleBindings {
    by_position: HashMap<u32, String>,
    by_name: HashMap<String, String>,
}

impl ModuleBindings {
    /// Binds a module at a declaration position. Positions are
    /// append-only: a later write to the same position is ignored.
    pub fn bind_position(&mut self, position: u32, module: String) {
        self.by_position.entry(position).or_insert(module);
    }

    pub fn bind_name(&mut self, name: &str, module: String) {
        self.by_name.insert(name.to_string(), module);
    }

    pub fn at_position(&self, position: u32) -> Option<&str> {
        self.by_position.get(&position).map(String::as_str)
    }

    pub fn named(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }
}

/// A variable or property bound to a `new ClassName(...)` result (or a
/// RegExp literal), so later member calls on it carry a class hint.
#[derive(Debug, Clone)]
pub struct ClassReceiver {
    pub position: u32,
    pub class_name: String,
}

/// Deferred alias-propagation check: once every declaration in the file
/// has been visited, a references query at `query_end` decides whether
/// the binding at `target_position` copies the module of the
/// cross-referenced declaration.
#[derive(Debug, Clone)]
pub struct AliasCheck {
    pub query_end: u32,
    pub source_text: String,
    pub target_name: String,
    pub target_position: u32,
}

/// Deferred class-hint confirmation for a call-site fact: the receiver
/// text matched a tracked class receiver, and a references query must
/// confirm the call site names the same binding (not a shadowing
/// variable of the same name).
#[derive(Debug, Clone)]
pub struct HintCheck {
    pub fact_index: usize,
    pub query_end: u32,
    pub expected_position: u32,
    pub class_name: String,
}

#[derive(Default)]
pub struct AnalysisContext {
    pub file: String,
    pub required_modules: ModuleBindings,
    /// Normalized initializer text -> declaration position of the
    /// require-bound alias it can be traced to.
    pub cross_references: HashMap<String, u32>,
    /// Local alias -> original imported/exported name.
    pub imported_methods: HashMap<String, String>,
    pub class_receivers: HashMap<String, ClassReceiver>,
    pub declared_functions: Vec<DeclaredFunction>,
    pub declared_classes: HashMap<String, DeclaredClass>,
    pub alias_checks: Vec<AliasCheck>,
    pub hint_checks: Vec<HintCheck>,
}

impl AnalysisContext {
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            ..Self::default()
        }
    }

    pub fn has_declared_function(&self, name: &str) -> bool {
        self.declared_functions.iter().any(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_bindings_are_append_only() {
        let mut bindings = ModuleBindings::default();
        bindings.bind_position(10, "first".to_string());
        bindings.bind_position(10, "second".to_string());
        assert_eq!(bindings.at_position(10), Some("first"));
    }

    #[test]
    fn test_name_and_position_tables_are_separate() {
        let mut bindings = ModuleBindings::default();
        bindings.bind_position(7, "cjs".to_string());
        bindings.bind_name("_", "underscore".to_string());
        assert_eq!(bindings.at_position(7), Some("cjs"));
        assert_eq!(bindings.named("_"), Some("underscore"));
        assert_eq!(bindings.named("cjs"), None);
    }
}
