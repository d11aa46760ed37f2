//! Deterministic expression-to-text rendering
//!
//! Pure and total over the node grammar: unhandled kinds render as
//! `"null"`. Used for receiver texts, argument lists and the normalized
//! initializer forms the cross-reference table is keyed by.

use crate::ast::{Literal, Node, NodeKind};

pub fn expression_to_string(expr: &Node) -> String {
    match &expr.kind {
        NodeKind::Identifier { name } => name.clone(),
        NodeKind::ThisExpression => "this".to_string(),
        NodeKind::Super => "super".to_string(),
        NodeKind::Literal { value } => literal_to_string(value),
        NodeKind::TemplateLiteral {
            quasis,
            expressions,
        } => {
            let mut out = String::new();
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(quasi);
                if let Some(expr) = expressions.get(i) {
                    out.push_str(&expression_to_string(expr));
                }
            }
            out
        }
        NodeKind::ArrayExpression { elements } => {
            let parts: Vec<String> = elements.iter().map(element_to_string).collect();
            format!("[{}]", parts.join(","))
        }
        NodeKind::ObjectExpression { properties } => {
            let parts: Vec<String> = properties
                .iter()
                .map(|prop| match &prop.kind {
                    NodeKind::Property { key, value, .. } => format!(
                        "{}:{}",
                        expression_to_string(key),
                        expression_to_string(value)
                    ),
                    _ => expression_to_string(prop),
                })
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        NodeKind::FunctionExpression {
            params, is_async, ..
        } => {
            let prefix = if *is_async { "async " } else { "" };
            format!("{prefix}function({}) {{...}}", params_to_string(params))
        }
        NodeKind::ArrowFunctionExpression {
            params, is_async, ..
        } => {
            let prefix = if *is_async { "async " } else { "" };
            format!("{prefix}({}) => {{...}}", params_to_string(params))
        }
        NodeKind::YieldExpression { argument } => match argument {
            Some(arg) => format!("yield {}", expression_to_string(arg)),
            None => "yield ".to_string(),
        },
        NodeKind::AwaitExpression { argument } => {
            format!("await {}", expression_to_string(argument))
        }
        NodeKind::UnaryExpression { operator, argument } => {
            format!("{operator}{}", expression_to_string(argument))
        }
        NodeKind::UpdateExpression {
            operator,
            argument,
            prefix,
        } => {
            if *prefix {
                format!("{operator}{}", expression_to_string(argument))
            } else {
                format!("{}{operator}", expression_to_string(argument))
            }
        }
        NodeKind::BinaryExpression {
            operator,
            left,
            right,
        } => format!(
            "{} {operator} {}",
            expression_to_string(left),
            expression_to_string(right)
        ),
        NodeKind::AssignmentExpression {
            operator,
            left,
            right,
        } => format!(
            "{} {operator} {}",
            pattern_to_string(left),
            expression_to_string(right)
        ),
        NodeKind::ConditionalExpression {
            test,
            consequent,
            alternate,
        } => format!(
            "{} ? {} : {}",
            expression_to_string(test),
            expression_to_string(consequent),
            expression_to_string(alternate)
        ),
        NodeKind::CallExpression { callee, arguments } => {
            call_to_string(callee, arguments, false)
        }
        NodeKind::NewExpression { callee, arguments } => call_to_string(callee, arguments, true),
        NodeKind::SequenceExpression { expressions } => {
            let parts: Vec<String> = expressions.iter().map(expression_to_string).collect();
            parts.join(",")
        }
        NodeKind::MemberExpression {
            object,
            property,
            computed,
        } => {
            if *computed {
                format!(
                    "{}[{}]",
                    expression_to_string(object),
                    expression_to_string(property)
                )
            } else {
                format!(
                    "{}.{}",
                    expression_to_string(object),
                    expression_to_string(property)
                )
            }
        }
        NodeKind::ClassDeclaration { id, .. } => {
            let name = id
                .as_ref()
                .and_then(|n| n.identifier_name())
                .unwrap_or_default();
            format!("class {name}")
        }
        NodeKind::SpreadElement { argument } => {
            format!("...{}", expression_to_string(argument))
        }
        NodeKind::ObjectPattern { .. }
        | NodeKind::ArrayPattern { .. }
        | NodeKind::AssignmentPattern { .. }
        | NodeKind::RestElement { .. } => pattern_to_string(expr),
        _ => "null".to_string(),
    }
}

pub fn pattern_to_string(pattern: &Node) -> String {
    match &pattern.kind {
        NodeKind::Identifier { name } => name.clone(),
        NodeKind::MemberExpression { .. } => expression_to_string(pattern),
        NodeKind::ArrayPattern { elements } => {
            let parts: Vec<String> = elements.iter().map(pattern_to_string).collect();
            parts.join(",")
        }
        NodeKind::ObjectPattern { properties } => {
            let parts: Vec<String> = properties
                .iter()
                .map(|prop| match &prop.kind {
                    NodeKind::Property { value, .. } => pattern_to_string(value),
                    _ => pattern_to_string(prop),
                })
                .collect();
            parts.join(",")
        }
        NodeKind::AssignmentPattern { left, right } => format!(
            "{}={}",
            pattern_to_string(left),
            expression_to_string(right)
        ),
        NodeKind::RestElement { argument } => format!("...{}", pattern_to_string(argument)),
        _ => "null".to_string(),
    }
}

/// Renders one call argument; spread arguments keep a literal `...`.
pub fn argument_to_string(arg: &Node) -> String {
    match &arg.kind {
        NodeKind::SpreadElement { argument } => format!("...{}", expression_to_string(argument)),
        _ => expression_to_string(arg),
    }
}

/// `name(p1,p2)` signature form used for class methods.
pub fn method_signature(name: &str, params: &[String]) -> String {
    format!("{name}({})", params.join(","))
}

fn element_to_string(element: &Node) -> String {
    match &element.kind {
        NodeKind::SpreadElement { argument } => format!("...{}", expression_to_string(argument)),
        _ => expression_to_string(element),
    }
}

fn call_to_string(callee: &Node, arguments: &[Node], is_new: bool) -> String {
    let callee_text = match &callee.kind {
        NodeKind::Super => "super".to_string(),
        _ => expression_to_string(callee),
    };
    let args: Vec<String> = arguments.iter().map(argument_to_string).collect();
    let rendered = format!("{callee_text}({})", args.join(","));
    if is_new {
        format!("new {rendered}")
    } else {
        rendered
    }
}

fn params_to_string(params: &[Node]) -> String {
    let parts: Vec<String> = params.iter().map(pattern_to_string).collect();
    parts.join(",")
}

fn literal_to_string(value: &Literal) -> String {
    match value {
        Literal::String(s) => s.clone(),
        Literal::Number(raw) => raw.clone(),
        Literal::Boolean(b) => b.to_string(),
        Literal::Null => "null".to_string(),
        Literal::Regex { pattern, flags } => format!("/{pattern}/{flags}"),
    }
}
