//! Lowering from the tree-sitter CST to the ESTree-shaped tree
//!
//! The lowering is total: any construct without a dedicated kind becomes
//! [`NodeKind::Other`] with its named children lowered, so call sites
//! inside loops, switches or try blocks are still reached.

use tree_sitter::Node as TsNode;

use crate::ast::{ImportKind, ImportSpecifier, Literal, Node, NodeKind, SourceFile, Span};
use crate::error::{AnalysisError, Result};

/// Parses a JavaScript source into a [`SourceFile`] and its program node.
pub fn parse_module(name: &str, source: &str) -> Result<(SourceFile, Node)> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|e| AnalysisError::Parse(e.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AnalysisError::Parse(format!("failed to parse {name}")))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(AnalysisError::Parse(format!("syntax error in {name}")));
    }

    let body = named_children(&root)
        .into_iter()
        .filter(|c| c.kind() != "comment")
        .map(|c| lower(&c, source))
        .collect();

    let program = Node {
        kind: NodeKind::Program { body },
        span: span_of(&root),
    };
    Ok((SourceFile::new(name, source), program))
}

fn span_of(node: &TsNode) -> Span {
    Span {
        start: node.start_byte() as u32,
        end: node.end_byte() as u32,
    }
}

fn text<'a>(node: &TsNode, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

fn named_children<'t>(node: &TsNode<'t>) -> Vec<TsNode<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn field<'t>(node: &TsNode<'t>, name: &str) -> Option<TsNode<'t>> {
    node.child_by_field_name(name)
}

fn has_async_keyword(node: &TsNode) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|c| c.kind() == "async");
    result
}

fn lower_opt(node: Option<TsNode>, source: &str) -> Option<Box<Node>> {
    node.map(|n| Box::new(lower(&n, source)))
}

fn lower_params(node: Option<TsNode>, source: &str) -> Vec<Node> {
    match node {
        Some(params) if params.kind() == "formal_parameters" => named_children(&params)
            .into_iter()
            .filter(|c| c.kind() != "comment")
            .map(|c| lower(&c, source))
            .collect(),
        // single-identifier arrow parameter
        Some(param) => vec![lower(&param, source)],
        None => Vec::new(),
    }
}

fn lower_arguments(node: Option<TsNode>, source: &str) -> Vec<Node> {
    match node {
        Some(args) if args.kind() == "arguments" => named_children(&args)
            .into_iter()
            .filter(|c| c.kind() != "comment")
            .map(|c| lower(&c, source))
            .collect(),
        // tagged template: the template string is the single argument
        Some(arg) => vec![lower(&arg, source)],
        None => Vec::new(),
    }
}

fn string_value(node: &TsNode, source: &str) -> String {
    named_children(node)
        .iter()
        .filter(|c| matches!(c.kind(), "string_fragment" | "escape_sequence"))
        .map(|c| text(c, source))
        .collect()
}

fn lower_class(node: &TsNode, source: &str) -> NodeKind {
    let id = lower_opt(field(node, "name"), source);
    let superclass = node
        .children(&mut node.walk())
        .find(|c| c.kind() == "class_heritage")
        .and_then(|heritage| named_children(&heritage).into_iter().next())
        .map(|expr| Box::new(lower(&expr, source)));
    let body = field(node, "body")
        .map(|b| {
            named_children(&b)
                .into_iter()
                .filter(|c| c.kind() != "comment")
                .map(|c| lower(&c, source))
                .collect()
        })
        .unwrap_or_default();
    NodeKind::ClassDeclaration {
        id,
        superclass,
        body,
    }
}

fn lower_import_specifiers(node: &TsNode, source: &str) -> Vec<ImportSpecifier> {
    let mut specifiers = Vec::new();
    let Some(clause) = node
        .children(&mut node.walk())
        .find(|c| c.kind() == "import_clause")
    else {
        return specifiers;
    };
    for child in named_children(&clause) {
        match child.kind() {
            "identifier" => specifiers.push(ImportSpecifier {
                local: lower(&child, source),
                imported: None,
                kind: ImportKind::Default,
            }),
            "namespace_import" => {
                if let Some(local) = named_children(&child).into_iter().next() {
                    specifiers.push(ImportSpecifier {
                        local: lower(&local, source),
                        imported: None,
                        kind: ImportKind::Namespace,
                    });
                }
            }
            "named_imports" => {
                for specifier in named_children(&child) {
                    if specifier.kind() != "import_specifier" {
                        continue;
                    }
                    let Some(name) = field(&specifier, "name") else {
                        continue;
                    };
                    let imported = text(&name, source).to_string();
                    let local = field(&specifier, "alias").unwrap_or(name);
                    specifiers.push(ImportSpecifier {
                        local: lower(&local, source),
                        imported: Some(imported),
                        kind: ImportKind::Named,
                    });
                }
            }
            _ => {}
        }
    }
    specifiers
}

/// Lowers one CST node. Unknown kinds become `Other` with lowered children.
pub fn lower(node: &TsNode, source: &str) -> Node {
    let span = span_of(node);
    let kind = match node.kind() {
        "identifier"
        | "property_identifier"
        | "shorthand_property_identifier"
        | "shorthand_property_identifier_pattern"
        | "statement_identifier"
        | "private_property_identifier"
        | "undefined" => NodeKind::Identifier {
            name: text(node, source).to_string(),
        },
        "this" => NodeKind::ThisExpression,
        "super" => NodeKind::Super,
        "string" => NodeKind::Literal {
            value: Literal::String(string_value(node, source)),
        },
        "number" => NodeKind::Literal {
            value: Literal::Number(text(node, source).to_string()),
        },
        "true" => NodeKind::Literal {
            value: Literal::Boolean(true),
        },
        "false" => NodeKind::Literal {
            value: Literal::Boolean(false),
        },
        "null" => NodeKind::Literal {
            value: Literal::Null,
        },
        "regex" => NodeKind::Literal {
            value: Literal::Regex {
                pattern: field(node, "pattern")
                    .map(|p| text(&p, source).to_string())
                    .unwrap_or_default(),
                flags: field(node, "flags")
                    .map(|f| text(&f, source).to_string())
                    .unwrap_or_default(),
            },
        },
        "template_string" => {
            let mut quasis = Vec::new();
            let mut expressions = Vec::new();
            let mut current = String::new();
            for child in named_children(node) {
                match child.kind() {
                    "string_fragment" | "escape_sequence" => current.push_str(text(&child, source)),
                    "template_substitution" => {
                        quasis.push(std::mem::take(&mut current));
                        if let Some(expr) = named_children(&child).into_iter().next() {
                            expressions.push(lower(&expr, source));
                        }
                    }
                    _ => {}
                }
            }
            quasis.push(current);
            NodeKind::TemplateLiteral {
                quasis,
                expressions,
            }
        }

        "variable_declaration" | "lexical_declaration" => NodeKind::VariableDeclaration {
            declarations: named_children(node)
                .into_iter()
                .filter(|c| c.kind() == "variable_declarator")
                .map(|c| lower(&c, source))
                .collect(),
        },
        "variable_declarator" => NodeKind::VariableDeclarator {
            id: lower_opt(field(node, "name"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            init: lower_opt(field(node, "value"), source),
        },
        "function_declaration" | "generator_function_declaration" => {
            NodeKind::FunctionDeclaration {
                id: lower_opt(field(node, "name"), source),
                params: lower_params(field(node, "parameters"), source),
                body: lower_opt(field(node, "body"), source)
                    .unwrap_or_else(|| Box::new(empty_block(span))),
                is_async: has_async_keyword(node),
            }
        }
        "function_expression" | "function" | "generator_function" => NodeKind::FunctionExpression {
            id: lower_opt(field(node, "name"), source),
            params: lower_params(field(node, "parameters"), source),
            body: lower_opt(field(node, "body"), source)
                .unwrap_or_else(|| Box::new(empty_block(span))),
            is_async: has_async_keyword(node),
        },
        "arrow_function" => NodeKind::ArrowFunctionExpression {
            params: lower_params(field(node, "parameter").or_else(|| field(node, "parameters")), source),
            body: lower_opt(field(node, "body"), source)
                .unwrap_or_else(|| Box::new(empty_block(span))),
            is_async: has_async_keyword(node),
        },
        "class_declaration" | "class" => lower_class(node, source),
        "method_definition" => {
            let key = field(node, "name");
            let computed = key.as_ref().is_some_and(|k| k.kind() == "computed_property_name");
            NodeKind::MethodDefinition {
                key: lower_opt(key, source).unwrap_or_else(|| Box::new(other(node, source))),
                params: lower_params(field(node, "parameters"), source),
                body: lower_opt(field(node, "body"), source)
                    .unwrap_or_else(|| Box::new(empty_block(span))),
                computed,
            }
        }
        "import_statement" => NodeKind::ImportDeclaration {
            specifiers: lower_import_specifiers(node, source),
            source: lower_opt(field(node, "source"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
        },

        "expression_statement" => match named_children(node).into_iter().next() {
            Some(expr) => NodeKind::ExpressionStatement {
                expression: Box::new(lower(&expr, source)),
            },
            None => NodeKind::Other {
                children: Vec::new(),
            },
        },
        "statement_block" => NodeKind::BlockStatement {
            body: named_children(node)
                .into_iter()
                .filter(|c| c.kind() != "comment")
                .map(|c| lower(&c, source))
                .collect(),
        },
        "return_statement" => NodeKind::ReturnStatement {
            argument: named_children(node)
                .into_iter()
                .next()
                .map(|c| Box::new(lower(&c, source))),
        },

        "call_expression" => NodeKind::CallExpression {
            callee: lower_opt(field(node, "function"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            arguments: lower_arguments(field(node, "arguments"), source),
        },
        "new_expression" => NodeKind::NewExpression {
            callee: lower_opt(field(node, "constructor"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            arguments: lower_arguments(field(node, "arguments"), source),
        },
        "member_expression" => NodeKind::MemberExpression {
            object: lower_opt(field(node, "object"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            property: lower_opt(field(node, "property"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            computed: false,
        },
        "subscript_expression" => NodeKind::MemberExpression {
            object: lower_opt(field(node, "object"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            property: lower_opt(field(node, "index"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            computed: true,
        },
        "assignment_expression" => NodeKind::AssignmentExpression {
            operator: "=".to_string(),
            left: lower_opt(field(node, "left"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            right: lower_opt(field(node, "right"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "augmented_assignment_expression" => NodeKind::AssignmentExpression {
            operator: field(node, "operator")
                .map(|o| text(&o, source).to_string())
                .unwrap_or_else(|| "=".to_string()),
            left: lower_opt(field(node, "left"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            right: lower_opt(field(node, "right"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "binary_expression" => NodeKind::BinaryExpression {
            operator: field(node, "operator")
                .map(|o| text(&o, source).to_string())
                .unwrap_or_default(),
            left: lower_opt(field(node, "left"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            right: lower_opt(field(node, "right"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "unary_expression" => NodeKind::UnaryExpression {
            operator: field(node, "operator")
                .map(|o| text(&o, source).to_string())
                .unwrap_or_default(),
            argument: lower_opt(field(node, "argument"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "update_expression" => {
            let operator = field(node, "operator");
            let argument = field(node, "argument");
            let prefix = match (&operator, &argument) {
                (Some(op), Some(arg)) => op.start_byte() < arg.start_byte(),
                _ => false,
            };
            NodeKind::UpdateExpression {
                operator: operator
                    .map(|o| text(&o, source).to_string())
                    .unwrap_or_default(),
                argument: lower_opt(argument, source)
                    .unwrap_or_else(|| Box::new(other(node, source))),
                prefix,
            }
        }
        "ternary_expression" => NodeKind::ConditionalExpression {
            test: lower_opt(field(node, "condition"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            consequent: lower_opt(field(node, "consequence"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            alternate: lower_opt(field(node, "alternative"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "sequence_expression" => NodeKind::SequenceExpression {
            expressions: named_children(node)
                .into_iter()
                .map(|c| lower(&c, source))
                .collect(),
        },
        // transparent: keep the inner node, incl. its span
        "parenthesized_expression" => {
            return named_children(node)
                .into_iter()
                .next()
                .map(|c| lower(&c, source))
                .unwrap_or_else(|| other(node, source));
        }
        "object" => NodeKind::ObjectExpression {
            properties: named_children(node)
                .into_iter()
                .filter(|c| c.kind() != "comment")
                .map(|c| lower_object_member(&c, source))
                .collect(),
        },
        "array" => NodeKind::ArrayExpression {
            elements: named_children(node)
                .into_iter()
                .filter(|c| c.kind() != "comment")
                .map(|c| lower(&c, source))
                .collect(),
        },
        "spread_element" => NodeKind::SpreadElement {
            argument: named_children(node)
                .into_iter()
                .next()
                .map(|c| Box::new(lower(&c, source)))
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "await_expression" => NodeKind::AwaitExpression {
            argument: named_children(node)
                .into_iter()
                .next()
                .map(|c| Box::new(lower(&c, source)))
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "yield_expression" => NodeKind::YieldExpression {
            argument: named_children(node)
                .into_iter()
                .next()
                .map(|c| Box::new(lower(&c, source))),
        },

        "object_pattern" => NodeKind::ObjectPattern {
            properties: named_children(node)
                .into_iter()
                .filter(|c| c.kind() != "comment")
                .map(|c| lower_object_member(&c, source))
                .collect(),
        },
        "array_pattern" => NodeKind::ArrayPattern {
            elements: named_children(node)
                .into_iter()
                .map(|c| lower(&c, source))
                .collect(),
        },
        "assignment_pattern" => NodeKind::AssignmentPattern {
            left: lower_opt(field(node, "left"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
            right: lower_opt(field(node, "right"), source)
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "rest_pattern" => NodeKind::RestElement {
            argument: named_children(node)
                .into_iter()
                .next()
                .map(|c| Box::new(lower(&c, source)))
                .unwrap_or_else(|| Box::new(other(node, source))),
        },
        "computed_property_name" => {
            return named_children(node)
                .into_iter()
                .next()
                .map(|c| lower(&c, source))
                .unwrap_or_else(|| other(node, source));
        }

        _ => return other(node, source),
    };
    Node { kind, span }
}

fn lower_object_member(node: &TsNode, source: &str) -> Node {
    let span = span_of(node);
    let kind = match node.kind() {
        "pair" | "pair_pattern" => {
            let key = field(node, "key");
            let computed = key.as_ref().is_some_and(|k| k.kind() == "computed_property_name");
            NodeKind::Property {
                key: lower_opt(key, source).unwrap_or_else(|| Box::new(other(node, source))),
                value: lower_opt(field(node, "value"), source)
                    .unwrap_or_else(|| Box::new(other(node, source))),
                computed,
                is_method: false,
            }
        }
        "shorthand_property_identifier" | "shorthand_property_identifier_pattern" => {
            let ident = lower(node, source);
            NodeKind::Property {
                key: Box::new(ident.clone()),
                value: Box::new(ident),
                computed: false,
                is_method: false,
            }
        }
        "method_definition" => {
            let key = field(node, "name");
            let computed = key.as_ref().is_some_and(|k| k.kind() == "computed_property_name");
            let function = Node {
                kind: NodeKind::FunctionExpression {
                    id: None,
                    params: lower_params(field(node, "parameters"), source),
                    body: lower_opt(field(node, "body"), source)
                        .unwrap_or_else(|| Box::new(empty_block(span))),
                    is_async: has_async_keyword(node),
                },
                span,
            };
            NodeKind::Property {
                key: lower_opt(key, source).unwrap_or_else(|| Box::new(other(node, source))),
                value: Box::new(function),
                computed,
                is_method: true,
            }
        }
        "object_assignment_pattern" => {
            let left = field(node, "left");
            let key = lower_opt(left, source).unwrap_or_else(|| Box::new(other(node, source)));
            NodeKind::Property {
                key: key.clone(),
                value: Box::new(Node {
                    kind: NodeKind::AssignmentPattern {
                        left: key,
                        right: lower_opt(field(node, "right"), source)
                            .unwrap_or_else(|| Box::new(other(node, source))),
                    },
                    span,
                }),
                computed: false,
                is_method: false,
            }
        }
        "spread_element" | "rest_pattern" => return lower(node, source),
        _ => return other(node, source),
    };
    Node { kind, span }
}

fn other(node: &TsNode, source: &str) -> Node {
    Node {
        kind: NodeKind::Other {
            children: named_children(node)
                .into_iter()
                .filter(|c| c.kind() != "comment")
                .map(|c| lower(&c, source))
                .collect(),
        },
        span: span_of(node),
    }
}

fn empty_block(span: Span) -> Node {
    Node {
        kind: NodeKind::BlockStatement { body: Vec::new() },
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Node {
        parse_module("test.js", source).unwrap().1
    }

    fn first_statement(program: &Node) -> &Node {
        match &program.kind {
            NodeKind::Program { body } => &body[0],
            _ => panic!("not a program"),
        }
    }

    #[test]
    fn test_lower_variable_declaration() {
        let program = parse("const foo = require('bar');");
        let stmt = first_statement(&program);
        let NodeKind::VariableDeclaration { declarations } = &stmt.kind else {
            panic!("expected variable declaration, got {:?}", stmt.kind);
        };
        let NodeKind::VariableDeclarator { id, init } = &declarations[0].kind else {
            panic!("expected declarator");
        };
        assert_eq!(id.identifier_name(), Some("foo"));
        let NodeKind::CallExpression { callee, arguments } = &init.as_ref().unwrap().kind else {
            panic!("expected call expression");
        };
        assert_eq!(callee.identifier_name(), Some("require"));
        assert!(matches!(
            &arguments[0].kind,
            NodeKind::Literal {
                value: Literal::String(s)
            } if s == "bar"
        ));
    }

    #[test]
    fn test_lower_member_call() {
        let program = parse("foo.bar(1, x);");
        let NodeKind::ExpressionStatement { expression } = &first_statement(&program).kind else {
            panic!("expected expression statement");
        };
        let NodeKind::CallExpression { callee, arguments } = &expression.kind else {
            panic!("expected call");
        };
        let NodeKind::MemberExpression {
            object,
            property,
            computed,
        } = &callee.kind
        else {
            panic!("expected member expression");
        };
        assert!(!computed);
        assert_eq!(object.identifier_name(), Some("foo"));
        assert_eq!(property.identifier_name(), Some("bar"));
        assert_eq!(arguments.len(), 2);
    }

    #[test]
    fn test_lower_computed_member_is_flagged() {
        let program = parse("obj[key]();");
        let NodeKind::ExpressionStatement { expression } = &first_statement(&program).kind else {
            panic!("expected expression statement");
        };
        let NodeKind::CallExpression { callee, .. } = &expression.kind else {
            panic!("expected call");
        };
        assert!(matches!(
            &callee.kind,
            NodeKind::MemberExpression { computed: true, .. }
        ));
    }

    #[test]
    fn test_lower_regex_literal() {
        let program = parse("const re = /ab+c/gi;");
        let NodeKind::VariableDeclaration { declarations } = &first_statement(&program).kind else {
            panic!("expected declaration");
        };
        let NodeKind::VariableDeclarator { init, .. } = &declarations[0].kind else {
            panic!("expected declarator");
        };
        assert!(matches!(
            &init.as_ref().unwrap().kind,
            NodeKind::Literal {
                value: Literal::Regex { pattern, flags }
            } if pattern == "ab+c" && flags == "gi"
        ));
    }

    #[test]
    fn test_lower_class_with_heritage() {
        let program = parse("class Calculator extends Base { add(a, b) { return a + b; } }");
        let NodeKind::ClassDeclaration {
            id,
            superclass,
            body,
        } = &first_statement(&program).kind
        else {
            panic!("expected class declaration");
        };
        assert_eq!(id.as_ref().unwrap().identifier_name(), Some("Calculator"));
        assert_eq!(
            superclass.as_ref().unwrap().identifier_name(),
            Some("Base")
        );
        let NodeKind::MethodDefinition { key, params, .. } = &body[0].kind else {
            panic!("expected method definition");
        };
        assert_eq!(key.identifier_name(), Some("add"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_lower_import_declaration() {
        let program = parse("import { map as collect, filter } from 'underscore';");
        let NodeKind::ImportDeclaration { specifiers, source } = &first_statement(&program).kind
        else {
            panic!("expected import declaration");
        };
        assert_eq!(specifiers.len(), 2);
        assert_eq!(specifiers[0].local.identifier_name(), Some("collect"));
        assert_eq!(specifiers[0].imported.as_deref(), Some("map"));
        assert_eq!(specifiers[1].local.identifier_name(), Some("filter"));
        assert!(matches!(
            &source.kind,
            NodeKind::Literal {
                value: Literal::String(s)
            } if s == "underscore"
        ));
    }

    #[test]
    fn test_lower_namespace_import() {
        let program = parse("import * as _ from 'underscore';");
        let NodeKind::ImportDeclaration { specifiers, .. } = &first_statement(&program).kind else {
            panic!("expected import declaration");
        };
        assert_eq!(specifiers[0].local.identifier_name(), Some("_"));
        assert_eq!(specifiers[0].kind, ImportKind::Namespace);
    }

    #[test]
    fn test_lower_unmodeled_statement_keeps_calls() {
        let program = parse("for (let i = 0; i < 3; i++) { tick(i); }");
        // the for statement becomes Other but the call must stay reachable
        fn find_call(node: &Node) -> bool {
            if matches!(node.kind, NodeKind::CallExpression { .. }) {
                return true;
            }
            node.children().iter().any(|c| find_call(c))
        }
        assert!(find_call(&program));
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(parse_module("bad.js", "function ( {").is_err());
    }

    #[test]
    fn test_parenthesized_expression_is_transparent() {
        let program = parse("(foo)();");
        let NodeKind::ExpressionStatement { expression } = &first_statement(&program).kind else {
            panic!("expected expression statement");
        };
        let NodeKind::CallExpression { callee, .. } = &expression.kind else {
            panic!("expected call");
        };
        assert_eq!(callee.identifier_name(), Some("foo"));
    }
}
