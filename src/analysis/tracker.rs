//! Alias/module tracking half of the traversal pass
//!
//! Observes declarations, assignments and imports in document order and
//! keeps the per-file symbol tables current before the call sites of the
//! same file resolve. Alias propagation that needs a references query is
//! queued on the context and flushed once the whole file has been
//! visited.

use tracing::debug;

use crate::analysis::context::{AliasCheck, AnalysisContext, ClassReceiver};
use crate::analysis::model::{DeclaredClass, DeclaredFunction, MethodSignature};
use crate::analysis::printer::{expression_to_string, pattern_to_string};
use crate::ast::{ImportKind, Literal, Node, NodeKind};

/// Strips the CommonJS export prefix from a bound name.
pub fn strip_commonjs_prefix(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix("module.exports.") {
        return rest;
    }
    if let Some(rest) = name.strip_prefix("exports.") {
        return rest;
    }
    name
}

/// Finds a `require(...)` call reachable from an initializer through a
/// chain of member expressions (`require('x')`, `require('x').y`,
/// `require('x').y.z()`, ...).
fn require_call(init: &Node) -> Option<&Node> {
    match &init.kind {
        NodeKind::CallExpression { callee, .. } => {
            if callee.identifier_name() == Some("require") {
                Some(init)
            } else if matches!(callee.kind, NodeKind::MemberExpression { .. }) {
                require_call(callee)
            } else {
                None
            }
        }
        NodeKind::MemberExpression { object, .. } => require_call(object),
        _ => None,
    }
}

fn module_name_of(call: &Node) -> String {
    let NodeKind::CallExpression { arguments, .. } = &call.kind else {
        return String::new();
    };
    match arguments.first().map(|a| &a.kind) {
        Some(NodeKind::Literal {
            value: Literal::String(s),
        }) => s.clone(),
        _ => String::new(),
    }
}

/// Property path between the require call and the initializer, e.g.
/// `"y"` for `require('x').y` — the original exported name hidden
/// behind the local alias.
fn imported_path(init: &Node) -> Option<String> {
    fn collect(node: &Node, out: &mut Vec<String>) -> bool {
        match &node.kind {
            NodeKind::CallExpression { .. } => true,
            NodeKind::MemberExpression {
                object, property, ..
            } => {
                if !collect(object, out) {
                    return false;
                }
                out.push(expression_to_string(property));
                true
            }
            _ => false,
        }
    }
    if !matches!(init.kind, NodeKind::MemberExpression { .. }) {
        return None;
    }
    let mut parts = Vec::new();
    if collect(init, &mut parts) && !parts.is_empty() {
        Some(parts.join("."))
    } else {
        None
    }
}

/// Shared handling for `target = init` bindings from declarators and
/// assignment expressions.
fn track_binding(ctx: &mut AnalysisContext, target: &Node, init: &Node) {
    let target_name = pattern_to_string(target);
    let position = target.span.start;

    match &init.kind {
        NodeKind::FunctionExpression { params, .. }
        | NodeKind::ArrowFunctionExpression { params, .. } => {
            ctx.declared_functions.push(DeclaredFunction {
                name: strip_commonjs_prefix(&target_name).to_string(),
                position,
                params: params.iter().map(pattern_to_string).collect(),
            });
        }
        NodeKind::ObjectExpression { properties } => {
            collect_object_methods(ctx, properties);
        }
        NodeKind::ClassDeclaration { .. } => {
            track_class(ctx, init, Some(&target_name));
        }
        NodeKind::Literal {
            value: Literal::Regex { .. },
        } => {
            ctx.class_receivers.insert(
                target_name.clone(),
                ClassReceiver {
                    position,
                    class_name: "RegExp".to_string(),
                },
            );
        }
        _ => {}
    }

    if let Some(call) = require_call(init) {
        let module = module_name_of(call);
        debug!(variable = %target_name, module = %module, "module declaration");
        ctx.required_modules.bind_position(position, module);
        ctx.cross_references.insert(target_name.clone(), position);
        if let Some(imported) = imported_path(init) {
            ctx.imported_methods.insert(target_name, imported);
        }
        return;
    }

    // The initializer may itself be a require-bound alias; queue a
    // references check so the module binding propagates to this
    // declaration once the whole file has been seen.
    let source_text = match &init.kind {
        NodeKind::CallExpression { callee, .. } => expression_to_string(callee),
        _ => expression_to_string(init),
    };
    ctx.alias_checks.push(AliasCheck {
        query_end: init.span.start,
        source_text,
        target_name,
        target_position: position,
    });
}

fn collect_object_methods(ctx: &mut AnalysisContext, properties: &[Node]) {
    for prop in properties {
        let NodeKind::Property { key, value, .. } = &prop.kind else {
            continue;
        };
        let (NodeKind::FunctionExpression { params, .. }
        | NodeKind::ArrowFunctionExpression { params, .. }) = &value.kind
        else {
            continue;
        };
        ctx.declared_functions.push(DeclaredFunction {
            name: expression_to_string(key),
            position: key.span.start,
            params: params.iter().map(pattern_to_string).collect(),
        });
    }
}

fn track_class(ctx: &mut AnalysisContext, node: &Node, fallback_name: Option<&str>) {
    let NodeKind::ClassDeclaration {
        id,
        superclass,
        body,
    } = &node.kind
    else {
        return;
    };
    let name = id
        .as_ref()
        .and_then(|n| n.identifier_name())
        .or(fallback_name);
    let Some(name) = name else {
        return;
    };

    let methods = body
        .iter()
        .filter_map(|member| match &member.kind {
            NodeKind::MethodDefinition {
                key,
                params,
                computed: false,
                ..
            } => key.identifier_name().map(|method| MethodSignature {
                name: method.to_string(),
                params: params.iter().map(pattern_to_string).collect(),
            }),
            _ => None,
        })
        .collect();

    ctx.declared_classes.insert(
        name.to_string(),
        DeclaredClass {
            name: name.to_string(),
            methods,
            superclass: superclass
                .as_ref()
                .and_then(|s| s.identifier_name())
                .map(str::to_string),
        },
    );
}

pub fn variable_declaration(ctx: &mut AnalysisContext, node: &Node) {
    let NodeKind::VariableDeclaration { declarations } = &node.kind else {
        return;
    };
    for decl in declarations {
        let NodeKind::VariableDeclarator { id, init } = &decl.kind else {
            continue;
        };
        if let Some(init) = init {
            track_binding(ctx, id, init);
        }
    }
}

pub fn assignment_expression(ctx: &mut AnalysisContext, node: &Node) {
    let NodeKind::AssignmentExpression { left, right, .. } = &node.kind else {
        return;
    };
    track_binding(ctx, left, right);
}

pub fn import_declaration(ctx: &mut AnalysisContext, node: &Node) {
    let NodeKind::ImportDeclaration { specifiers, source } = &node.kind else {
        return;
    };
    let NodeKind::Literal {
        value: Literal::String(module),
    } = &source.kind
    else {
        return;
    };
    for specifier in specifiers {
        let Some(local) = specifier.local.identifier_name() else {
            continue;
        };
        ctx.required_modules.bind_name(local, module.clone());
        if specifier.kind == ImportKind::Named {
            if let Some(imported) = &specifier.imported {
                if imported != local {
                    ctx.imported_methods
                        .insert(local.to_string(), imported.clone());
                }
            }
        }
    }
}

pub fn function_declaration(ctx: &mut AnalysisContext, node: &Node) {
    let NodeKind::FunctionDeclaration { id, params, .. } = &node.kind else {
        return;
    };
    let (name, position) = match id {
        Some(id) => (
            id.identifier_name().unwrap_or("default").to_string(),
            id.span.start,
        ),
        None => ("default".to_string(), node.span.start),
    };
    ctx.declared_functions.push(DeclaredFunction {
        name,
        position,
        params: params.iter().map(pattern_to_string).collect(),
    });
}

pub fn class_declaration(ctx: &mut AnalysisContext, node: &Node) {
    track_class(ctx, node, None);
}
