mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

// Re-export from lib for internal use
use js_callgraph::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "js_callgraph=debug"
    } else {
        "js_callgraph=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli::run(&cli).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            // stdout stays machine-readable even on failure
            tracing::error!("{e}");
            println!("[]");
            std::process::exit(1);
        }
    }
}
