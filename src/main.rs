//! Family News Pipeline: binary entrypoint.
//! Loads config, opens the store and runs one pipeline command.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use family_news_pipeline::config::{load_config_default, load_config_from, PipelineConfig, ENV_CONFIG_PATH};
use family_news_pipeline::metrics::Metrics;
use family_news_pipeline::{categorize, ArticleStore, Collector, RelevanceLevel};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the sources config (TOML or JSON)
    #[arg(short, long, env = ENV_CONFIG_PATH, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Fetch every source once, score and store relevant articles
    Collect {
        /// Print the Prometheus exposition after the run
        #[arg(long)]
        print_metrics: bool,
    },
    /// Show store statistics and recent runs
    Stats,
    /// Print newsletter candidates grouped by section, as JSON
    Sections {
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 5)]
        max_per_section: usize,
        /// Lowest relevance tier to include
        #[arg(long, default_value = "medium")]
        min_relevance: RelevanceLevel,
    },
    /// Delete sent articles older than the retention window
    Sweep {
        /// Override `retention_days` from the config
        #[arg(long)]
        days: Option<u32>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("family_news_pipeline=info,family_news=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let cfg = match &cli.config {
        Some(p) => load_config_from(p)?,
        None => load_config_default()?,
    };
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    let store = ArticleStore::open(&cfg.database_path)
        .await
        .with_context(|| format!("opening {}", cfg.database_path.display()))?;

    match cli.command {
        Command::Collect { print_metrics } => {
            let metrics = if print_metrics { Some(Metrics::init()?) } else { None };
            let collector = Collector::from_config(&cfg, store)?;
            let report = collector.run_once().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(m) = metrics {
                println!("{}", m.render());
            }
        }
        Command::Stats => {
            let stats = store.stats().await?;
            let runs = store.runs(5).await?;
            let out = serde_json::json!({ "stats": stats, "recent_runs": runs });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Sections {
            limit,
            max_per_section,
            min_relevance,
        } => {
            let candidates = store.newsletter_candidates(limit, min_relevance).await?;
            let mut sections = categorize(&candidates);
            sections.truncate(max_per_section);
            let out = serde_json::json!({
                "issue_number": store.run_count().await?,
                "sections": sections,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Sweep { days } => {
            let max_age = match days {
                Some(d) => chrono::Duration::days(i64::from(d)),
                None => cfg.retention(),
            };
            let deleted = store.retention_sweep(max_age).await?;
            println!("{deleted}");
        }
    }
    Ok(())
}
