//! Call-site extraction half of the traversal pass
//!
//! Produces one `CallSiteFact` per call or constructor invocation in
//! document order. Receivers that match a tracked class binding queue a
//! references check so the hint only lands when the call site names the
//! same binding.

use crate::analysis::context::{AnalysisContext, ClassReceiver, HintCheck};
use crate::analysis::model::{CallKind, CallSiteFact, Position, SourceLocation};
use crate::analysis::printer::{argument_to_string, expression_to_string, pattern_to_string};
use crate::analysis::tracker::strip_commonjs_prefix;
use crate::ast::{Node, NodeKind, SourceFile};

/// Closed classification of callee shapes. Computed members and
/// anything not listed are out of resolution scope and dropped.
enum Callee<'a> {
    Bare(&'a str),
    Member { object: &'a Node, method: String },
    RegexLiteralMethod(String),
    SuperCall,
    Dropped,
}

fn classify(callee: &Node) -> Callee<'_> {
    match &callee.kind {
        NodeKind::Identifier { name } => Callee::Bare(name),
        NodeKind::MemberExpression {
            object,
            property,
            computed,
        } => {
            if *computed {
                return Callee::Dropped;
            }
            let method = expression_to_string(property);
            if object.is_regex_literal() {
                return Callee::RegexLiteralMethod(method);
            }
            match &object.kind {
                NodeKind::Identifier { .. } | NodeKind::MemberExpression { .. } | NodeKind::Super => {
                    Callee::Member { object, method }
                }
                _ => Callee::Dropped,
            }
        }
        NodeKind::Super => Callee::SuperCall,
        _ => Callee::Dropped,
    }
}

/// The offset a references query is keyed by: the receiver's end for
/// member calls, except that `this`/`self` receivers use the whole
/// callee span; the callee's end otherwise.
fn query_end(node: &Node) -> u32 {
    let (NodeKind::CallExpression { callee, .. } | NodeKind::NewExpression { callee, .. }) =
        &node.kind
    else {
        return node.span.end;
    };
    if let NodeKind::MemberExpression { object, .. } = &callee.kind {
        if matches!(object.identifier_name(), Some("this") | Some("self")) {
            return callee.span.end;
        }
        return object.span.end;
    }
    callee.span.end
}

/// Name of the function a call site is lexically inside.
///
/// The innermost named function declaration wins; else the nearest class
/// method key; else the outermost function/arrow/call expression named
/// through its surrounding declarator or assignment target (CommonJS
/// export prefixes stripped). Falls back to the `".root"` marker.
fn enclosing_function(ancestors: &[&Node]) -> String {
    let outer_declaration = ancestors.iter().rev().find_map(|n| match &n.kind {
        NodeKind::FunctionDeclaration { id, .. } => Some(id),
        _ => None,
    });
    if let Some(id) = outer_declaration {
        return id
            .as_ref()
            .and_then(|n| n.identifier_name())
            .unwrap_or("default")
            .to_string();
    }

    let mut name = ".root".to_string();

    let outer_class_method = ancestors.iter().rev().find_map(|n| match &n.kind {
        NodeKind::MethodDefinition { key, .. } => key.identifier_name(),
        _ => None,
    });
    if let Some(method_name) = outer_class_method {
        name = method_name.to_string();
    }

    let outer_expression = ancestors.iter().find(|n| {
        matches!(
            n.kind,
            NodeKind::FunctionExpression { .. }
                | NodeKind::ArrowFunctionExpression { .. }
                | NodeKind::CallExpression { .. }
        )
    });
    if let Some(expression) = outer_expression {
        let is_call = matches!(expression.kind, NodeKind::CallExpression { .. });
        for ancestor in ancestors {
            match &ancestor.kind {
                NodeKind::VariableDeclarator { id, init } => {
                    let left = pattern_to_string(id);
                    if is_call && !left.contains("exports.") {
                        break;
                    }
                    if init
                        .as_deref()
                        .is_some_and(|i| std::ptr::eq(i, *expression))
                    {
                        name = strip_commonjs_prefix(&left).to_string();
                        break;
                    }
                }
                NodeKind::AssignmentExpression { left, right, .. } => {
                    let left = pattern_to_string(left);
                    if is_call && !left.contains("exports.") {
                        break;
                    }
                    if std::ptr::eq(right.as_ref(), *expression) {
                        name = strip_commonjs_prefix(&left).to_string();
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    if name == "module.exports" || name == "exports" {
        name = "default".to_string();
    }
    name
}

fn location(file: &SourceFile, start: u32, end: u32) -> SourceLocation {
    let (start_line, start_ch) = file.line_col(start);
    let (end_line, end_ch) = file.line_col(end);
    SourceLocation {
        start: Position {
            line: start_line,
            ch: start_ch,
        },
        end: Position {
            line: end_line,
            ch: end_ch,
        },
    }
}

fn queue_hint_check(
    ctx: &mut AnalysisContext,
    fact_index: usize,
    receiver: &str,
    query_end: u32,
) {
    let Some(entry) = ctx.class_receivers.get(receiver) else {
        return;
    };
    let check = HintCheck {
        fact_index,
        query_end,
        expected_position: entry.position,
        class_name: entry.class_name.clone(),
    };
    ctx.hint_checks.push(check);
}

pub fn call_expression(
    ctx: &mut AnalysisContext,
    facts: &mut Vec<CallSiteFact>,
    file: &SourceFile,
    node: &Node,
    ancestors: &[&Node],
) {
    let NodeKind::CallExpression { callee, arguments } = &node.kind else {
        return;
    };

    let (callee_name, receiver, class_name) = match classify(callee) {
        Callee::Bare(name) => (name.to_string(), "this".to_string(), String::new()),
        Callee::RegexLiteralMethod(method) => (method, String::new(), "RegExp".to_string()),
        Callee::Member { object, method } => (method, expression_to_string(object), String::new()),
        Callee::SuperCall => ("super".to_string(), String::new(), String::new()),
        Callee::Dropped => return,
    };

    let start = node.span.start;
    let end = query_end(node);

    if !receiver.is_empty() {
        queue_hint_check(ctx, facts.len(), &receiver, end);
    }

    facts.push(CallSiteFact {
        file: file.name.clone(),
        start_offset: start,
        end_offset: end,
        location: location(file, start, end),
        kind: CallKind::Call,
        callee_name,
        enclosing_function: enclosing_function(ancestors),
        receiver,
        class_name,
        arguments: arguments.iter().map(argument_to_string).collect(),
    });
}

pub fn new_expression(
    ctx: &mut AnalysisContext,
    facts: &mut Vec<CallSiteFact>,
    file: &SourceFile,
    node: &Node,
    ancestors: &[&Node],
) {
    let NodeKind::NewExpression { callee, arguments } = &node.kind else {
        return;
    };

    let callee_name = match classify(callee) {
        Callee::Bare(name) => name.to_string(),
        Callee::Member { method, .. } | Callee::RegexLiteralMethod(method) => method,
        Callee::SuperCall => "super".to_string(),
        Callee::Dropped => return,
    };

    // A constructed value only becomes a tracked receiver when the new
    // expression is itself the bound initializer or assignment value;
    // anonymous `new` expressions passed inline never register.
    let mut receiver = String::new();
    let mut receiver_position = None;
    if let Some(declarator) = ancestors
        .iter()
        .rev()
        .find(|n| matches!(n.kind, NodeKind::VariableDeclarator { .. }))
    {
        if let NodeKind::VariableDeclarator { id, init } = &declarator.kind {
            if init.as_deref().is_some_and(|i| std::ptr::eq(i, node)) {
                receiver = pattern_to_string(id);
                receiver_position = Some(id.span.start);
            }
        }
    }
    if let Some(assignment) = ancestors
        .iter()
        .rev()
        .find(|n| matches!(n.kind, NodeKind::AssignmentExpression { .. }))
    {
        if let NodeKind::AssignmentExpression { left, right, .. } = &assignment.kind {
            if std::ptr::eq(right.as_ref(), node) {
                receiver = pattern_to_string(left);
                receiver_position = Some(left.span.start);
            }
        }
    }

    if let Some(position) = receiver_position {
        if let Some(module) = ctx
            .cross_references
            .get(&callee_name)
            .and_then(|cr| ctx.required_modules.at_position(*cr))
            .map(str::to_string)
        {
            ctx.required_modules.bind_position(position, module);
        }
        ctx.class_receivers.insert(
            receiver.clone(),
            ClassReceiver {
                position,
                class_name: callee_name.clone(),
            },
        );
    }

    let start = callee.span.start;
    let end = query_end(node);

    facts.push(CallSiteFact {
        file: file.name.clone(),
        start_offset: start,
        end_offset: end,
        location: location(file, start, end),
        kind: CallKind::New,
        class_name: callee_name.clone(),
        callee_name,
        enclosing_function: enclosing_function(ancestors),
        receiver,
        arguments: arguments.iter().map(argument_to_string).collect(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::traverse;
    use crate::ast::parse_module;

    fn extract(source: &str) -> (AnalysisContext, Vec<CallSiteFact>) {
        let (file, program) = parse_module("test.js", source).unwrap();
        let mut ctx = AnalysisContext::new("test.js");
        let facts = traverse(&program, &file, &mut ctx);
        (ctx, facts)
    }

    #[test]
    fn test_bare_call_has_implicit_this_receiver() {
        let (_, facts) = extract("helper(2);");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].callee_name, "helper");
        assert_eq!(facts[0].receiver, "this");
        assert_eq!(facts[0].arguments, vec!["2".to_string()]);
        assert_eq!(facts[0].enclosing_function, ".root");
    }

    #[test]
    fn test_member_call_receiver_text() {
        let (_, facts) = extract("foo.bar.baz(x);");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].callee_name, "baz");
        assert_eq!(facts[0].receiver, "foo.bar");
    }

    #[test]
    fn test_computed_member_call_is_dropped() {
        let (_, facts) = extract("obj[key]();\nplain();");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].callee_name, "plain");
    }

    #[test]
    fn test_call_on_call_result_is_dropped() {
        let (_, facts) = extract("factory()();");
        // only the inner factory() call survives classification
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].callee_name, "factory");
    }

    #[test]
    fn test_regex_literal_receiver() {
        let (_, facts) = extract("/ab/.test(x);");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].callee_name, "test");
        assert_eq!(facts[0].receiver, "");
        assert_eq!(facts[0].class_name, "RegExp");
    }

    #[test]
    fn test_enclosing_function_declaration() {
        let (_, facts) = extract("function myfun(x) { otherfun(x); }");
        assert_eq!(facts[0].enclosing_function, "myfun");
    }

    #[test]
    fn test_enclosing_arrow_bound_to_variable() {
        let (_, facts) = extract("const save = option => { foo.apiB(); };");
        assert_eq!(facts[0].enclosing_function, "save");
    }

    #[test]
    fn test_enclosing_exported_assignment() {
        let (_, facts) = extract("module.exports.sync = () => { foo.apiA(); };");
        assert_eq!(facts[0].enclosing_function, "sync");
    }

    #[test]
    fn test_enclosing_direct_module_exports_is_default() {
        let (_, facts) = extract("module.exports = function() { foo.apiB(); };");
        assert_eq!(facts[0].enclosing_function, "default");
    }

    #[test]
    fn test_enclosing_wrapped_export_uses_export_name() {
        let (_, facts) = extract("module.exports.save = mem(() => { foo.apiC(); });");
        let inner = facts.iter().find(|f| f.callee_name == "apiC").unwrap();
        assert_eq!(inner.enclosing_function, "save");
    }

    #[test]
    fn test_enclosing_non_export_wrapper_stays_root() {
        let (_, facts) = extract("const push = mem(exec());");
        let exec = facts.iter().find(|f| f.callee_name == "exec").unwrap();
        assert_eq!(exec.enclosing_function, ".root");
    }

    #[test]
    fn test_enclosing_class_method() {
        let (_, facts) = extract("class A { run() { helper(); } }");
        assert_eq!(facts[0].enclosing_function, "run");
    }

    #[test]
    fn test_explicit_this_receiver_is_dropped() {
        let (_, facts) = extract("this.load(1);");
        assert!(facts.is_empty());
    }

    #[test]
    fn test_self_receiver_query_end_covers_callee() {
        let src = "self.load(1);";
        let (_, facts) = extract(src);
        assert_eq!(facts[0].receiver, "self");
        assert_eq!(facts[0].end_offset, "self.load".len() as u32);
    }

    #[test]
    fn test_member_query_end_is_object_end() {
        let src = "foo.bar();";
        let (_, facts) = extract(src);
        assert_eq!(facts[0].end_offset, "foo".len() as u32);
    }

    #[test]
    fn test_new_bound_to_declarator_registers_receiver() {
        let (ctx, facts) = extract("const oauth = new OAuth(a);");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].kind, CallKind::New);
        assert_eq!(facts[0].callee_name, "OAuth");
        assert_eq!(facts[0].receiver, "oauth");
        assert_eq!(facts[0].class_name, "OAuth");
        let receiver = ctx.class_receivers.get("oauth").unwrap();
        assert_eq!(receiver.class_name, "OAuth");
        assert_eq!(receiver.position, "const ".len() as u32);
    }

    #[test]
    fn test_inline_new_never_registers_receiver() {
        let (ctx, facts) = extract("run(new Widget());");
        assert!(ctx.class_receivers.is_empty());
        let widget = facts.iter().find(|f| f.kind == CallKind::New).unwrap();
        assert_eq!(widget.receiver, "");
    }

    #[test]
    fn test_new_propagates_module_of_required_class() {
        let (ctx, _) = extract("const OAuth = require('oauth');\nconst client = new OAuth(a);");
        let position = "const OAuth = require('oauth');\nconst ".len() as u32;
        assert_eq!(ctx.required_modules.at_position(position), Some("oauth"));
    }

    #[test]
    fn test_member_call_on_tracked_receiver_queues_hint_check() {
        let (ctx, facts) = extract("const re = /ab/;\nre.test(x);");
        let call = facts.iter().position(|f| f.callee_name == "test").unwrap();
        let check = ctx.hint_checks.iter().find(|c| c.fact_index == call).unwrap();
        assert_eq!(check.class_name, "RegExp");
        assert_eq!(check.expected_position, "const ".len() as u32);
    }

    #[test]
    fn test_new_fact_start_is_callee_start() {
        let src = "const a = new Foo();";
        let (_, facts) = extract(src);
        assert_eq!(facts[0].start_offset, src.find("Foo").unwrap() as u32);
    }
}
