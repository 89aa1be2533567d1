//! Ranks a sample catalog against a query and optionally invokes a tool.
//!
//! ```text
//! cargo run -p select-tools -- "what is 12 times 7"
//! cargo run -p select-tools -- "add numbers" --invoke calc --args '{"a": 3, "b": 4, "op": "add"}'
//! ```

mod tools;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Value, json};
use toolbelt::prelude::{CatalogSource, RegistryConfig, ToolId, ToolRegistry};
use toolbelt::telemetry::{TelemetryConfig, try_init};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "select-tools", about = "Select and invoke tools for a query")]
struct Cli {
    /// Registry configuration file (`.toml` or `.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tool catalog file (`.toml` or `.json`).
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Maximum number of ranked tools.
    #[arg(long)]
    limit: Option<usize>,

    /// Tool to invoke once the turn is ready.
    #[arg(long)]
    invoke: Option<String>,

    /// JSON arguments for `--invoke`.
    #[arg(long, default_value = "{}")]
    args: String,

    /// Natural-language request to select tools for.
    query: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    try_init(&TelemetryConfig::default())?;

    let config = match &cli.config {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RegistryConfig::default(),
    };
    let catalog_path = cli
        .catalog
        .clone()
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/catalog.toml")));
    let catalog = CatalogSource::load(&catalog_path)
        .with_context(|| format!("loading catalog {}", catalog_path.display()))?;

    let registry = ToolRegistry::builder()
        .config(config)
        .catalog(catalog)
        .bind_tool(ToolId::new("calc")?, tools::calc()?)
        .bind_tool(ToolId::new("echo")?, tools::echo)
        .bind_tool(ToolId::new("clock")?, tools::clock)
        .build()?;

    let report = registry.preload_core().await;
    info!(loaded = report.loaded.len(), failed = report.failed.len(), "core tools ready");

    let limit = cli.limit.unwrap_or_else(|| registry.default_limit());
    let scores: Vec<Value> = registry
        .rank_scored(&cli.query, limit)?
        .into_iter()
        .map(|scored| json!({ "id": scored.id, "score": scored.score }))
        .collect();

    let mut turn = registry.begin_turn();
    let loaded = turn.prepare(&cli.query, limit).await?;

    let invocation = match &cli.invoke {
        Some(raw) => {
            let id = ToolId::new(raw.as_str())?;
            let args: Value = serde_json::from_str(&cli.args).context("parsing --args")?;
            Some(match turn.invoke(&id, args).await? {
                Ok(output) => json!({ "tool": id, "output": output }),
                Err(err) => json!({ "tool": id, "error": err.to_value() }),
            })
        }
        None => None,
    };

    let summary = turn.finish()?;
    let output = json!({
        "query": cli.query,
        "scores": scores,
        "selected": summary.selected,
        "loaded": loaded,
        "unavailable": summary
            .selected
            .iter()
            .filter(|id| !summary.loaded.contains(id))
            .collect::<Vec<_>>(),
        "invocation": invocation,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
