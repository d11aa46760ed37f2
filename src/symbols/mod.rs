//! Incremental symbol-resolution service
//!
//! The engine consults an external resolver for position-based
//! definition and references lookups. Files are added before analysis
//! and evicted once their call sites have resolved, bounding resident
//! index memory to roughly one file at a time.

pub mod scope;

use async_trait::async_trait;

pub use scope::ScopeResolver;

use crate::ast::Span;
use crate::error::Result;

/// A position-keyed query against one indexed file.
#[derive(Debug, Clone)]
pub struct PositionQuery {
    pub file: String,
    pub end: u32,
}

/// Where the symbol at the queried position is declared. Ambient
/// (environment-provided) symbols carry no position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub start: Option<u32>,
    pub origin: String,
}

/// Every syntactic occurrence of the symbol at the queried position.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    pub refs: Vec<Span>,
}

#[async_trait]
pub trait SymbolResolver: Send + Sync {
    async fn add_file(&self, name: &str, source: &str) -> Result<()>;

    async fn remove_file(&self, name: &str) -> Result<()>;

    /// `None` when the symbol at the position cannot be resolved; the
    /// caller drops the affected call edge.
    async fn definition(&self, query: &PositionQuery) -> Result<Option<Definition>>;

    /// `None` when no symbol occupies the position.
    async fn references(&self, query: &PositionQuery) -> Result<Option<ReferenceSet>>;
}
