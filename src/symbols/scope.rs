//! Scope-based in-process symbol resolver
//!
//! Builds a per-file function-scope tree: declarations are hoisted to
//! their enclosing function before identifier references resolve, the
//! way `var` and function declarations behave. A small ambient table
//! models the Node environment so `require`, `console` and friends
//! satisfy definition queries without a source position.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ast::{parse_module, Node, NodeKind, Span};
use crate::error::{AnalysisError, Result};
use crate::symbols::{Definition, PositionQuery, ReferenceSet, SymbolResolver};

const AMBIENT_GLOBALS: &[&str] = &[
    "require",
    "module",
    "exports",
    "console",
    "process",
    "global",
    "globalThis",
    "Buffer",
    "JSON",
    "Math",
    "Object",
    "Array",
    "String",
    "Number",
    "Boolean",
    "Promise",
    "Date",
    "RegExp",
    "Error",
    "Map",
    "Set",
    "Symbol",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
];

#[derive(Debug)]
struct Binding {
    /// Declaration span; `None` for ambient globals.
    decl: Option<Span>,
}

#[derive(Debug)]
struct RefSite {
    binding: usize,
    span: Span,
}

#[derive(Debug, Default)]
struct FileIndex {
    bindings: Vec<Binding>,
    refs: Vec<RefSite>,
}

impl FileIndex {
    fn ref_at(&self, position: u32) -> Option<&RefSite> {
        self.refs
            .iter()
            .filter(|r| r.span.start <= position && position <= r.span.end)
            .min_by_key(|r| r.span.end - r.span.start)
    }
}

#[derive(Default)]
pub struct ScopeResolver {
    files: RwLock<HashMap<String, FileIndex>>,
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SymbolResolver for ScopeResolver {
    async fn add_file(&self, name: &str, source: &str) -> Result<()> {
        let index = match parse_module(name, source) {
            Ok((_, program)) => Binder::index_program(&program),
            Err(AnalysisError::Parse(reason)) => {
                debug!(file = name, %reason, "not indexing unparsable file");
                FileIndex::default()
            }
            Err(e) => return Err(e),
        };
        self.files.write().await.insert(name.to_string(), index);
        Ok(())
    }

    async fn remove_file(&self, name: &str) -> Result<()> {
        self.files.write().await.remove(name);
        Ok(())
    }

    async fn definition(&self, query: &PositionQuery) -> Result<Option<Definition>> {
        let files = self.files.read().await;
        let Some(index) = files.get(&query.file) else {
            return Ok(None);
        };
        let Some(site) = index.ref_at(query.end) else {
            return Ok(None);
        };
        let decl = index.bindings[site.binding].decl;
        Ok(Some(Definition {
            start: decl.map(|span| span.start),
            origin: if decl.is_some() {
                query.file.clone()
            } else {
                "node".to_string()
            },
        }))
    }

    async fn references(&self, query: &PositionQuery) -> Result<Option<ReferenceSet>> {
        let files = self.files.read().await;
        let Some(index) = files.get(&query.file) else {
            return Ok(None);
        };
        let Some(site) = index.ref_at(query.end) else {
            return Ok(None);
        };
        let binding = site.binding;
        Ok(Some(ReferenceSet {
            refs: index
                .refs
                .iter()
                .filter(|r| r.binding == binding)
                .map(|r| r.span)
                .collect(),
        }))
    }
}

struct Scope {
    parent: Option<usize>,
    names: HashMap<String, usize>,
}

struct Binder {
    index: FileIndex,
    scopes: Vec<Scope>,
}

impl Binder {
    fn index_program(program: &Node) -> FileIndex {
        let mut binder = Binder {
            index: FileIndex::default(),
            scopes: vec![Scope {
                parent: None,
                names: HashMap::new(),
            }],
        };
        for global in AMBIENT_GLOBALS {
            let id = binder.index.bindings.len();
            binder.index.bindings.push(Binding { decl: None });
            binder.scopes[0].names.insert((*global).to_string(), id);
        }
        let module_scope = binder.push_scope(0);
        binder.hoist(program, module_scope);
        binder.resolve(program, module_scope);
        binder.index
    }

    fn push_scope(&mut self, parent: usize) -> usize {
        self.scopes.push(Scope {
            parent: Some(parent),
            names: HashMap::new(),
        });
        self.scopes.len() - 1
    }

    fn lookup(&self, mut scope: usize, name: &str) -> Option<usize> {
        loop {
            if let Some(&binding) = self.scopes[scope].names.get(name) {
                return Some(binding);
            }
            scope = self.scopes[scope].parent?;
        }
    }

    /// Declares `name` in `scope`; a redeclaration reuses the existing
    /// binding and records the new site as a reference of it.
    fn declare(&mut self, scope: usize, name: &str, span: Span) {
        let binding = match self.scopes[scope].names.get(name) {
            Some(&existing) => existing,
            None => {
                let id = self.index.bindings.len();
                self.index.bindings.push(Binding { decl: Some(span) });
                self.scopes[scope].names.insert(name.to_string(), id);
                id
            }
        };
        self.index.refs.push(RefSite { binding, span });
    }

    fn bind_pattern(&mut self, scope: usize, pattern: &Node) {
        match &pattern.kind {
            NodeKind::Identifier { name } => self.declare(scope, name, pattern.span),
            NodeKind::ObjectPattern { properties } => {
                for prop in properties {
                    match &prop.kind {
                        NodeKind::Property { value, .. } => self.bind_pattern(scope, value),
                        NodeKind::RestElement { argument } => self.bind_pattern(scope, argument),
                        _ => {}
                    }
                }
            }
            NodeKind::ArrayPattern { elements } => {
                for element in elements {
                    self.bind_pattern(scope, element);
                }
            }
            NodeKind::AssignmentPattern { left, .. } => self.bind_pattern(scope, left),
            NodeKind::RestElement { argument } => self.bind_pattern(scope, argument),
            _ => {}
        }
    }

    /// Collects the declarations of one function body (or the program)
    /// without entering nested functions.
    fn hoist(&mut self, node: &Node, scope: usize) {
        match &node.kind {
            NodeKind::FunctionDeclaration { id, .. } => {
                if let (Some(id), Some(name)) = (id, id.as_ref().and_then(|n| n.identifier_name()))
                {
                    self.declare(scope, name, id.span);
                }
            }
            NodeKind::FunctionExpression { .. }
            | NodeKind::ArrowFunctionExpression { .. }
            | NodeKind::MethodDefinition { .. } => {}
            NodeKind::ClassDeclaration { id, .. } => {
                if let (Some(id), Some(name)) = (id, id.as_ref().and_then(|n| n.identifier_name()))
                {
                    self.declare(scope, name, id.span);
                }
            }
            NodeKind::VariableDeclarator { id, init } => {
                self.bind_pattern(scope, id);
                if let Some(init) = init {
                    self.hoist(init, scope);
                }
            }
            NodeKind::ImportDeclaration { specifiers, .. } => {
                for specifier in specifiers {
                    if let Some(name) = specifier.local.identifier_name() {
                        self.declare(scope, name, specifier.local.span);
                    }
                }
            }
            _ => {
                for child in node.children() {
                    self.hoist(child, scope);
                }
            }
        }
    }

    fn enter_function(
        &mut self,
        parent: usize,
        own_id: Option<&Node>,
        params: &[Node],
        body: &Node,
    ) {
        let scope = self.push_scope(parent);
        if let Some(id) = own_id {
            if let Some(name) = id.identifier_name() {
                self.declare(scope, name, id.span);
            }
        }
        for param in params {
            self.bind_pattern(scope, param);
        }
        for param in params {
            self.resolve_pattern_defaults(param, scope);
        }
        self.hoist(body, scope);
        self.resolve(body, scope);
    }

    /// Resolves default-value expressions nested inside a pattern
    /// without treating the bound identifiers as references.
    fn resolve_pattern_defaults(&mut self, pattern: &Node, scope: usize) {
        match &pattern.kind {
            NodeKind::AssignmentPattern { left, right } => {
                self.resolve_pattern_defaults(left, scope);
                self.resolve(right, scope);
            }
            NodeKind::ObjectPattern { properties } => {
                for prop in properties {
                    match &prop.kind {
                        NodeKind::Property {
                            key,
                            value,
                            computed,
                            ..
                        } => {
                            if *computed {
                                self.resolve(key, scope);
                            }
                            self.resolve_pattern_defaults(value, scope);
                        }
                        NodeKind::RestElement { argument } => {
                            self.resolve_pattern_defaults(argument, scope);
                        }
                        _ => {}
                    }
                }
            }
            NodeKind::ArrayPattern { elements } => {
                for element in elements {
                    self.resolve_pattern_defaults(element, scope);
                }
            }
            NodeKind::RestElement { argument } => self.resolve_pattern_defaults(argument, scope),
            NodeKind::Identifier { .. } => {}
            _ => {}
        }
    }

    fn resolve(&mut self, node: &Node, scope: usize) {
        match &node.kind {
            NodeKind::Identifier { name } => {
                if let Some(binding) = self.lookup(scope, name) {
                    self.index.refs.push(RefSite {
                        binding,
                        span: node.span,
                    });
                }
            }
            NodeKind::MemberExpression {
                object,
                property,
                computed,
            } => {
                self.resolve(object, scope);
                if *computed {
                    self.resolve(property, scope);
                }
            }
            NodeKind::Property {
                key,
                value,
                computed,
                ..
            } => {
                if *computed {
                    self.resolve(key, scope);
                }
                self.resolve(value, scope);
            }
            NodeKind::VariableDeclarator { id, init } => {
                self.resolve_pattern_defaults(id, scope);
                if let Some(init) = init {
                    self.resolve(init, scope);
                }
            }
            NodeKind::FunctionDeclaration { params, body, .. } => {
                self.enter_function(scope, None, params, body);
            }
            NodeKind::FunctionExpression {
                id, params, body, ..
            } => {
                self.enter_function(scope, id.as_deref(), params, body);
            }
            NodeKind::ArrowFunctionExpression { params, body, .. } => {
                self.enter_function(scope, None, params, body);
            }
            NodeKind::MethodDefinition {
                key,
                params,
                body,
                computed,
            } => {
                if *computed {
                    self.resolve(key, scope);
                }
                self.enter_function(scope, None, params, body);
            }
            NodeKind::ClassDeclaration {
                superclass, body, ..
            } => {
                if let Some(superclass) = superclass {
                    self.resolve(superclass, scope);
                }
                for member in body {
                    self.resolve(member, scope);
                }
            }
            NodeKind::ImportDeclaration { .. } => {}
            _ => {
                for child in node.children() {
                    self.resolve(child, scope);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn index(source: &str) -> ScopeResolver {
        let resolver = ScopeResolver::new();
        resolver.add_file("test.js", source).await.unwrap();
        resolver
    }

    fn query(position: u32) -> PositionQuery {
        PositionQuery {
            file: "test.js".to_string(),
            end: position,
        }
    }

    #[tokio::test]
    async fn test_definition_of_variable_use() {
        let source = "const foo = 1;\nfoo;";
        let resolver = index(source).await;
        let use_pos = source.rfind("foo").unwrap() as u32;
        let definition = resolver.definition(&query(use_pos)).await.unwrap().unwrap();
        assert_eq!(definition.start, Some(6));
        assert_eq!(definition.origin, "test.js");
    }

    #[tokio::test]
    async fn test_definition_of_hoisted_function() {
        let source = "helper(2);\nfunction helper(x) {}";
        let resolver = index(source).await;
        let definition = resolver.definition(&query(0)).await.unwrap().unwrap();
        assert_eq!(definition.start, Some(source.find("helper(x)").unwrap() as u32));
    }

    #[tokio::test]
    async fn test_ambient_global_has_no_position() {
        let source = "require('x');";
        let resolver = index(source).await;
        let definition = resolver.definition(&query(0)).await.unwrap().unwrap();
        assert_eq!(definition.start, None);
        assert_eq!(definition.origin, "node");
    }

    #[tokio::test]
    async fn test_unknown_identifier_resolves_to_nothing() {
        let source = "mystery(1);";
        let resolver = index(source).await;
        assert!(resolver.definition(&query(0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_references_include_declaration() {
        let source = "const a = 1;\nconst b = a;";
        let resolver = index(source).await;
        let use_pos = source.rfind('a').unwrap() as u32;
        let references = resolver.references(&query(use_pos)).await.unwrap().unwrap();
        let starts: Vec<u32> = references.refs.iter().map(|s| s.start).collect();
        assert!(starts.contains(&6));
        assert!(starts.contains(&use_pos));
        assert_eq!(references.refs.len(), 2);
    }

    #[tokio::test]
    async fn test_shadowed_names_are_distinct_bindings() {
        let source = "const foo = 1;\nfunction f(foo) { return foo; }\nfoo;";
        let resolver = index(source).await;
        let outer_use = source.rfind("foo").unwrap() as u32;
        let inner_use = source.find("return foo").unwrap() as u32 + 7;
        let outer_refs = resolver.references(&query(outer_use)).await.unwrap().unwrap();
        let inner_refs = resolver.references(&query(inner_use)).await.unwrap().unwrap();
        assert_eq!(outer_refs.refs.len(), 2);
        assert_eq!(inner_refs.refs.len(), 2);
        assert!(outer_refs
            .refs
            .iter()
            .all(|span| !inner_refs.refs.iter().any(|other| other == span)));
    }

    #[tokio::test]
    async fn test_member_property_is_not_a_reference() {
        let source = "const log = 1;\nconsole.log;";
        let resolver = index(source).await;
        let prop_pos = source.rfind("log").unwrap() as u32;
        let refs = resolver.references(&query(prop_pos)).await.unwrap();
        assert!(refs.is_none());
    }

    #[tokio::test]
    async fn test_import_locals_are_bound() {
        let source = "import * as _ from 'underscore';\n_.map(x);";
        let resolver = index(source).await;
        let use_pos = source.rfind("_.map").unwrap() as u32;
        let definition = resolver.definition(&query(use_pos)).await.unwrap().unwrap();
        assert_eq!(definition.start, Some(source.find("* as _").unwrap() as u32 + 5));
    }

    #[tokio::test]
    async fn test_eviction_forgets_file() {
        let resolver = index("const a = 1;\na;").await;
        resolver.remove_file("test.js").await.unwrap();
        assert!(resolver.definition(&query(13)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unparsable_file_is_indexed_empty() {
        let resolver = ScopeResolver::new();
        resolver.add_file("bad.js", "function ( {").await.unwrap();
        let q = PositionQuery {
            file: "bad.js".to_string(),
            end: 0,
        };
        assert!(resolver.definition(&q).await.unwrap().is_none());
    }
}
