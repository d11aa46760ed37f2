//! Call-site and call-graph record types
//!
//! Wire field names follow the original npm-analysis call format so the
//! output stays ingestible by downstream tooling (`fromModule`,
//! `className`, `toFunction`, `args`, `isLocal`).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// 0-based line/column position (CodeMirror-style `ch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub ch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    New,
}

/// Raw call-site fact collected during traversal, before resolution.
#[derive(Debug, Clone)]
pub struct CallSiteFact {
    pub file: String,
    pub start_offset: u32,
    pub end_offset: u32,
    pub location: SourceLocation,
    pub kind: CallKind,
    pub callee_name: String,
    pub enclosing_function: String,
    pub receiver: String,
    /// Class the receiver was constructed from; empty when unknown.
    pub class_name: String,
    pub arguments: Vec<String>,
}

/// One edge of the extracted call graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCall {
    pub path: String,
    pub loc: SourceLocation,
    pub from_module: String,
    pub from_function: String,
    pub receiver: String,
    pub class_name: String,
    /// A receiver reachable through several aliasing paths may disagree
    /// on its module, so edges carry a set.
    pub modules: BTreeSet<String>,
    pub to_function: String,
    #[serde(rename = "args")]
    pub arguments: Vec<String>,
    pub is_local: bool,
}

/// A function declared in the analyzed file: named declarations,
/// object-literal method shorthand, and function or arrow expressions
/// bound to a variable or assignment target.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredFunction {
    pub name: String,
    pub position: u32,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<String>,
}

/// A class declared in the analyzed file, with enough structure to
/// enumerate inherited methods through the superclass chain.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredClass {
    pub name: String,
    pub methods: Vec<MethodSignature>,
    pub superclass: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_call_wire_format() {
        let call = ResolvedCall {
            path: "index.js".to_string(),
            loc: SourceLocation {
                start: Position { line: 0, ch: 0 },
                end: Position { line: 0, ch: 3 },
            },
            from_module: "index.js".to_string(),
            from_function: ".root".to_string(),
            receiver: "this".to_string(),
            class_name: String::new(),
            modules: BTreeSet::from(["foo".to_string()]),
            to_function: "bar".to_string(),
            arguments: vec!["1".to_string()],
            is_local: false,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["fromModule"], "index.js");
        assert_eq!(json["fromFunction"], ".root");
        assert_eq!(json["className"], "");
        assert_eq!(json["modules"][0], "foo");
        assert_eq!(json["toFunction"], "bar");
        assert_eq!(json["args"][0], "1");
        assert_eq!(json["isLocal"], false);
        assert_eq!(json["loc"]["start"]["line"], 0);
    }
}
