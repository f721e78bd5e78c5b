//! Recollect CLI - Find and consolidate duplicate memories in a JSON export

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recollect_core::prelude::*;

#[derive(Parser)]
#[command(name = "recollect")]
#[command(about = "Recollect memory consolidation CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file to use instead of recollect.toml, RECOLLECT_CONFIG_PATH and RECOLLECT_ env vars
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List duplicate groups without changing anything
    Analyze {
        /// JSON array of memory records
        #[arg(short, long)]
        input: PathBuf,

        /// Minimum pair similarity
        #[arg(short, long, default_value_t = 0.85)]
        threshold: f64,
    },
    /// Consolidate qualifying duplicate groups
    Consolidate {
        /// JSON array of memory records
        #[arg(short, long)]
        input: PathBuf,

        /// Minimum pair similarity
        #[arg(short, long, default_value_t = 0.85)]
        threshold: f64,

        /// Also merge non-exact groups above the auto-merge threshold
        #[arg(long)]
        auto_merge: bool,

        /// Compute results without modifying the store
        #[arg(long)]
        dry_run: bool,

        /// Write the remaining records here as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Version information
    Version,
}

fn load_config(path: Option<&Path>) -> Result<RecollectConfig> {
    let config = match path {
        Some(path) => RecollectConfig::from_file(path)?,
        None => RecollectConfig::load()?,
    };
    Ok(config)
}

fn load_store(input: &Path) -> Result<Arc<InMemoryStore>> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let records: Vec<MemoryRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of memory records", input.display()))?;

    tracing::info!("Loaded {} memories from {}", records.len(), input.display());
    Ok(Arc::new(InMemoryStore::with_records(records)))
}

fn build_engine(config: &RecollectConfig, store: Arc<InMemoryStore>) -> Result<ConsolidationEngine> {
    let llm = LLMProviderFactory::from_config(config.llm.as_ref())?;
    let info = llm.model_info();
    tracing::debug!("Using {} model {}", info.provider, info.model_name);

    Ok(ConsolidationEngine::try_new(
        store,
        llm,
        config.consolidation.clone(),
    )?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("recollect {}", env!("CARGO_PKG_VERSION"));
            println!("recollect-core {}", recollect_core::VERSION);
        }
        Commands::Analyze { input, threshold } => {
            let config = load_config(cli.config.as_deref())?;
            let store = load_store(&input)?;
            let engine = build_engine(&config, store)?;

            let groups = engine
                .analyze_duplicates(&ConsolidationRequest::new().with_threshold(threshold))
                .await?;
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
        Commands::Consolidate {
            input,
            threshold,
            auto_merge,
            dry_run,
            output,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if dry_run {
                config.consolidation.dry_run = true;
            }
            let store = load_store(&input)?;
            let engine = build_engine(&config, store.clone())?;

            let request = ConsolidationRequest::new()
                .with_threshold(threshold)
                .with_auto_merge(auto_merge);
            let summary = engine.bulk_consolidate(&request).await?;

            // Summaries are new records; the originals stay in place.
            if !config.consolidation.dry_run {
                for outcome in &summary.details {
                    let GroupAction::Consolidated { result } = &outcome.action else {
                        continue;
                    };
                    if let (true, Some(content)) = (result.is_summary(), result.content.as_ref()) {
                        let tags = ["consolidated-summary".to_string()].into_iter().collect();
                        let id = store.store(content.clone(), tags)?;
                        tracing::info!("Stored summary of {} memories as {}", outcome.group.len(), id);
                    }
                }
            }

            println!("{}", serde_json::to_string_pretty(&summary)?);

            if let Some(output) = output {
                let remaining = store.records()?;
                std::fs::write(&output, serde_json::to_string_pretty(&remaining)?)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                tracing::info!("Wrote {} memories to {}", remaining.len(), output.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flag_ignores_config_path_env() {
        // Only this test touches the variable in this crate.
        unsafe { std::env::set_var("RECOLLECT_CONFIG_PATH", "from-env.toml") };

        let cli = Cli::try_parse_from(["recollect", "analyze", "--input", "memories.json"]).unwrap();
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["recollect", "--config", "custom.toml", "version"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));

        unsafe { std::env::remove_var("RECOLLECT_CONFIG_PATH") };
    }
}
