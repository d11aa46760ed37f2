//! Per-file analysis lifecycle
//!
//! For each source file: add it to the symbol resolver's index, run the
//! single traversal pass, flush the deferred alias and class-hint
//! queries, resolve every call-site fact, and only then evict the file
//! so the resident index never holds more than one file of a large
//! tree. Per-file failures are contained; only filesystem errors on the
//! root propagate.

use std::path::Path;

use tracing::debug;

use crate::analysis::model::ResolvedCall;
use crate::analysis::{self, AnalysisContext, CallResolver, CallSiteFact};
use crate::ast;
use crate::error::Result;
use crate::symbols::{PositionQuery, SymbolResolver};
use crate::walker::FileWalker;

pub struct CallGraphEngine<R: SymbolResolver> {
    symbols: R,
}

impl<R: SymbolResolver> CallGraphEngine<R> {
    pub fn new(symbols: R) -> Self {
        Self { symbols }
    }

    /// Analyzes a file or a directory tree and returns the accumulated
    /// call graph. Edge order follows query completion, not source
    /// position; consumers must treat the list as a multiset.
    pub async fn analyze_root(&self, root: &Path, size_limit: u64) -> Result<Vec<ResolvedCall>> {
        let metadata = std::fs::metadata(root)?;
        let mut calls = Vec::new();

        if metadata.is_dir() {
            let walker = FileWalker::new(size_limit);
            for entry in walker.walk(root)? {
                let source = std::fs::read_to_string(&entry.path)?;
                self.analyze_file(&entry.name, &source, &mut calls).await?;
            }
        } else {
            let source = std::fs::read_to_string(root)?;
            let name = root.to_string_lossy().to_string();
            self.analyze_file(&name, &source, &mut calls).await?;
        }

        Ok(calls)
    }

    /// Analyzes one file, appending its edges to `calls`. The file is
    /// evicted from the resolver index even when analysis fails.
    pub async fn analyze_file(
        &self,
        name: &str,
        source: &str,
        calls: &mut Vec<ResolvedCall>,
    ) -> Result<()> {
        self.symbols.add_file(name, source).await?;
        if let Err(e) = self.process_file(name, source, calls).await {
            debug!(file = name, error = %e, "skipping file");
        }
        self.symbols.remove_file(name).await?;
        Ok(())
    }

    async fn process_file(
        &self,
        name: &str,
        source: &str,
        calls: &mut Vec<ResolvedCall>,
    ) -> Result<()> {
        let (file, program) = ast::parse_module(name, source)?;

        let mut ctx = AnalysisContext::new(name);
        let mut facts = analysis::traverse(&program, &file, &mut ctx);

        self.flush_alias_checks(&mut ctx).await;
        self.confirm_class_hints(&mut ctx, &mut facts).await;

        let resolver = CallResolver::new(&self.symbols, &ctx);
        for fact in &facts {
            match resolver.resolve(fact).await {
                Ok(resolved) => calls.extend(resolved),
                Err(e) => debug!(file = name, callee = %fact.callee_name, error = %e, "query failed, dropping edge"),
            }
        }
        Ok(())
    }

    /// Completes the deferred alias propagations queued by the tracker:
    /// a binding whose initializer references a require-bound alias
    /// copies that alias's module to its own declaration position.
    /// Checks run in declaration order so chains propagate.
    async fn flush_alias_checks(&self, ctx: &mut AnalysisContext) {
        let checks = std::mem::take(&mut ctx.alias_checks);
        for check in checks {
            let Some(&position) = ctx.cross_references.get(&check.source_text) else {
                continue;
            };
            let Some(module) = ctx
                .required_modules
                .at_position(position)
                .map(str::to_string)
            else {
                continue;
            };
            let references = self
                .symbols
                .references(&PositionQuery {
                    file: ctx.file.clone(),
                    end: check.query_end,
                })
                .await;
            let Ok(Some(references)) = references else {
                continue;
            };
            if references.refs.iter().any(|r| r.start == position) {
                ctx.required_modules
                    .bind_position(check.target_position, module);
                ctx.cross_references
                    .insert(check.target_name, check.target_position);
            }
        }
    }

    /// Confirms queued class-receiver hints: the hint only lands when
    /// the receiver at the call site references the same binding the
    /// class was assigned to. RegExp receivers also clear the receiver
    /// text, matching the literal-receiver case.
    async fn confirm_class_hints(&self, ctx: &mut AnalysisContext, facts: &mut [CallSiteFact]) {
        let checks = std::mem::take(&mut ctx.hint_checks);
        for check in checks {
            let references = self
                .symbols
                .references(&PositionQuery {
                    file: ctx.file.clone(),
                    end: check.query_end,
                })
                .await;
            let Ok(Some(references)) = references else {
                continue;
            };
            if !references
                .refs
                .iter()
                .any(|r| r.start == check.expected_position)
            {
                continue;
            }
            if let Some(fact) = facts.get_mut(check.fact_index) {
                fact.class_name = check.class_name.clone();
                if check.class_name == "RegExp" {
                    fact.receiver.clear();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::ScopeResolver;

    async fn analyze(source: &str) -> Vec<ResolvedCall> {
        let engine = CallGraphEngine::new(ScopeResolver::new());
        let mut calls = Vec::new();
        engine.analyze_file("test.js", source, &mut calls).await.unwrap();
        calls
    }

    #[tokio::test]
    async fn test_alias_chain_round_trip() {
        let calls = analyze("const a = require('m');\nconst b = a;\nb.f();").await;
        let edge = calls.iter().find(|c| c.to_function == "f").unwrap();
        assert!(edge.modules.contains("m"));
        assert_eq!(edge.receiver, "b");
        assert!(!edge.is_local);
    }

    #[tokio::test]
    async fn test_regexp_receiver_tagging() {
        let calls = analyze("const re = /ab/;\nre.test(x);").await;
        let edge = calls.iter().find(|c| c.to_function == "test").unwrap();
        assert_eq!(edge.class_name, "RegExp");
        assert_eq!(edge.receiver, "");
    }

    #[tokio::test]
    async fn test_shadowed_receiver_keeps_no_hint() {
        let source = "const re = /ab/;\nfunction f(re) { re.test(x); }";
        let calls = analyze(source).await;
        let edge = calls.iter().find(|c| c.to_function == "test").unwrap();
        assert_eq!(edge.class_name, "");
        assert_eq!(edge.receiver, "re");
    }

    #[tokio::test]
    async fn test_parse_failure_skips_file_without_error() {
        let engine = CallGraphEngine::new(ScopeResolver::new());
        let mut calls = Vec::new();
        engine
            .analyze_file("bad.js", "function ( {", &mut calls)
            .await
            .unwrap();
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_callee_emits_no_edge() {
        let calls = analyze("mystery(1);").await;
        assert!(calls.is_empty());
    }
}
