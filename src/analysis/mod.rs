//! Call-graph construction engine
//!
//! The alias/module tracker and the call-site extractor run as one
//! traversal over a file's tree, sharing the per-file
//! [`AnalysisContext`]; the [`CallResolver`] then turns the collected
//! facts into graph edges with the help of the symbol resolver.

pub mod context;
pub mod extractor;
pub mod model;
pub mod printer;
pub mod resolver;
pub mod tracker;

pub use context::AnalysisContext;
pub use model::{
    CallKind, CallSiteFact, DeclaredClass, DeclaredFunction, MethodSignature, Position,
    ResolvedCall, SourceLocation,
};
pub use resolver::CallResolver;

use crate::ast::visit::{self, Visit};
use crate::ast::{Node, SourceFile};

/// Runs the tracker and the call-site extractor as a single pass and
/// returns the raw call-site facts. The traversal itself never
/// suspends; queries it would need are queued on the context.
pub fn traverse(program: &Node, file: &SourceFile, ctx: &mut AnalysisContext) -> Vec<CallSiteFact> {
    let mut pass = FilePass {
        ctx,
        file,
        facts: Vec::new(),
    };
    visit::walk(program, &mut pass);
    pass.facts
}

struct FilePass<'a> {
    ctx: &'a mut AnalysisContext,
    file: &'a SourceFile,
    facts: Vec<CallSiteFact>,
}

impl Visit for FilePass<'_> {
    fn variable_declaration(&mut self, node: &Node, _ancestors: &[&Node]) {
        tracker::variable_declaration(self.ctx, node);
    }

    fn assignment_expression(&mut self, node: &Node, _ancestors: &[&Node]) {
        tracker::assignment_expression(self.ctx, node);
    }

    fn import_declaration(&mut self, node: &Node, _ancestors: &[&Node]) {
        tracker::import_declaration(self.ctx, node);
    }

    fn function_declaration(&mut self, node: &Node, _ancestors: &[&Node]) {
        tracker::function_declaration(self.ctx, node);
    }

    fn class_declaration(&mut self, node: &Node, _ancestors: &[&Node]) {
        tracker::class_declaration(self.ctx, node);
    }

    fn call_expression(&mut self, node: &Node, ancestors: &[&Node]) {
        extractor::call_expression(self.ctx, &mut self.facts, self.file, node, ancestors);
    }

    fn new_expression(&mut self, node: &Node, ancestors: &[&Node]) {
        extractor::new_expression(self.ctx, &mut self.facts, self.file, node, ancestors);
    }
}
