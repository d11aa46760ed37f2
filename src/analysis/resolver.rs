//! Call resolution
//!
//! Combines one call-site fact with the file's symbol tables and the
//! external symbol resolver to produce the final graph edges. An
//! unresolved definition drops the call site: an unresolved call must
//! not contribute a false edge.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::analysis::context::AnalysisContext;
use crate::analysis::model::{CallKind, CallSiteFact, ResolvedCall};
use crate::analysis::printer::method_signature;
use crate::error::Result;
use crate::symbols::{PositionQuery, SymbolResolver};

/// Methods every object carries from `Object.prototype` (plus the
/// constructor). Enumerating them for each constructed instance would
/// only add noise edges.
static STANDARD_OBJECT_METHODS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "constructor",
        "toString",
        "toLocaleString",
        "valueOf",
        "hasOwnProperty",
        "isPrototypeOf",
        "propertyIsEnumerable",
    ])
});

pub struct CallResolver<'a> {
    symbols: &'a dyn SymbolResolver,
    ctx: &'a AnalysisContext,
}

impl<'a> CallResolver<'a> {
    pub fn new(symbols: &'a dyn SymbolResolver, ctx: &'a AnalysisContext) -> Self {
        Self { symbols, ctx }
    }

    /// Resolves one call site into zero or more edges. `new` expressions
    /// on locally declared classes additionally enumerate the instance's
    /// methods, inherited ones included.
    pub async fn resolve(&self, fact: &CallSiteFact) -> Result<Vec<ResolvedCall>> {
        let definition = self
            .symbols
            .definition(&PositionQuery {
                file: fact.file.clone(),
                end: fact.start_offset,
            })
            .await?;
        let Some(definition) = definition else {
            debug!(
                file = %fact.file,
                callee = %fact.callee_name,
                "definition unresolved, dropping call site"
            );
            return Ok(Vec::new());
        };

        let mut modules = BTreeSet::new();
        let references = self
            .symbols
            .references(&PositionQuery {
                file: fact.file.clone(),
                end: fact.end_offset,
            })
            .await?;
        if let Some(references) = references {
            for reference in &references.refs {
                if let Some(module) = self.ctx.required_modules.at_position(reference.start) {
                    modules.insert(module.to_string());
                }
            }
        }
        if let Some(position) = definition.start {
            if let Some(module) = self.ctx.required_modules.at_position(position) {
                modules.insert(module.to_string());
            }
        }
        if let Some(module) = self.ctx.required_modules.named(&fact.receiver) {
            modules.insert(module.to_string());
        }
        if let Some(module) = self.ctx.required_modules.named(&fact.callee_name) {
            modules.insert(module.to_string());
        }
        if let Some(receiver) = self.ctx.class_receivers.get(&fact.receiver) {
            if let Some(module) = self.ctx.required_modules.at_position(receiver.position) {
                modules.insert(module.to_string());
            }
        }

        let mut to_function = self
            .ctx
            .imported_methods
            .get(&fact.callee_name)
            .cloned()
            .unwrap_or_else(|| fact.callee_name.clone());

        let is_local = modules.is_empty()
            && (fact.receiver.is_empty() || fact.receiver == "this")
            && self.ctx.has_declared_function(&fact.callee_name);

        // `require('x')(...)`: a moduleful callee with no receiver and no
        // import alias is the module's default export.
        if fact.kind == CallKind::Call
            && fact.receiver.is_empty()
            && !modules.is_empty()
            && !self.ctx.imported_methods.contains_key(&fact.callee_name)
        {
            to_function = "default".to_string();
        }

        let call = ResolvedCall {
            path: fact.file.clone(),
            loc: fact.location,
            from_module: fact.file.clone(),
            from_function: fact.enclosing_function.clone(),
            receiver: fact.receiver.clone(),
            class_name: fact.class_name.clone(),
            modules,
            to_function: match fact.kind {
                CallKind::Call => to_function,
                CallKind::New => format!("new {to_function}"),
            },
            arguments: fact.arguments.clone(),
            is_local,
        };

        let mut calls = vec![call];
        if fact.kind == CallKind::New {
            self.enumerate_instance_methods(fact, &mut calls);
        }
        Ok(calls)
    }

    /// Emits one edge per method reachable on an instance of a locally
    /// declared class, walking the superclass chain. Overridden methods
    /// appear once; a visited set stops malformed cyclic hierarchies.
    fn enumerate_instance_methods(&self, fact: &CallSiteFact, calls: &mut Vec<ResolvedCall>) {
        let base = calls[0].clone();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut seen_methods: HashSet<&str> = HashSet::new();
        let mut current = self.ctx.declared_classes.get(&fact.callee_name);

        while let Some(class) = current {
            if !visited.insert(class.name.as_str()) {
                debug!(class = %class.name, "superclass cycle detected, stopping walk");
                break;
            }
            for method in &class.methods {
                if STANDARD_OBJECT_METHODS.contains(method.name.as_str()) {
                    continue;
                }
                if !seen_methods.insert(method.name.as_str()) {
                    continue;
                }
                calls.push(ResolvedCall {
                    class_name: class.name.clone(),
                    to_function: format!(
                        "{}.{}",
                        class.name,
                        method_signature(&method.name, &method.params)
                    ),
                    is_local: true,
                    ..base.clone()
                });
            }
            current = class
                .superclass
                .as_ref()
                .and_then(|name| self.ctx.declared_classes.get(name));
        }
    }
}
