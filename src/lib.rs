pub mod analysis;
pub mod ast;
pub mod engine;
pub mod error;
pub mod report;
pub mod symbols;
pub mod walker;

pub use analysis::{
    AnalysisContext, CallKind, CallResolver, CallSiteFact, DeclaredClass, DeclaredFunction,
    MethodSignature, Position, ResolvedCall, SourceLocation,
};
pub use engine::CallGraphEngine;
pub use error::{AnalysisError, Result};
pub use report::{render, OutputFormat};
pub use symbols::{Definition, PositionQuery, ReferenceSet, ScopeResolver, SymbolResolver};
pub use walker::{FileWalker, WalkedFile};
