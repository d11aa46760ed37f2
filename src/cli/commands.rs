use std::path::PathBuf;

use clap::Parser;

use js_callgraph::engine::CallGraphEngine;
use js_callgraph::report::{self, OutputFormat};
use js_callgraph::symbols::ScopeResolver;

use crate::error::Result;

/// Skip `.js` files above this size; oversized files are usually
/// generated bundles that swamp the analysis.
const DEFAULT_SIZE_LIMIT: u64 = 500_000;

#[derive(Parser)]
#[command(name = "js-callgraph")]
#[command(about = "Static call graph extraction for JavaScript packages")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Analyze an unpacked npm package
    js-callgraph ./package

    # Analyze a single file
    js-callgraph ./index.js

    # Raise the per-file size limit to 1 MB
    js-callgraph ./package --size-limit 1000000

    # Emit the wrapped report format
    js-callgraph ./package --format report
"#)]
pub struct Cli {
    /// File or directory to analyze
    pub path: PathBuf,

    /// Skip .js files larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_SIZE_LIMIT)]
    pub size_limit: u64,

    /// Log analysis details to stderr
    #[arg(long)]
    pub debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

/// Runs the analysis and returns the rendered output for stdout.
pub async fn run(cli: &Cli) -> Result<String> {
    let engine = CallGraphEngine::new(ScopeResolver::new());
    let calls = engine.analyze_root(&cli.path, cli.size_limit).await?;
    report::render(&calls, cli.format)
}
