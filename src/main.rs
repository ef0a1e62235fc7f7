//! TTP Intel Pipeline — Binary Entrypoint
//! Loads fetched content, classifies and extracts each item through the
//! configured LLM backend, and writes validated records for the report
//! renderer. Per-item failures degrade records; only a batch where nothing
//! succeeded aborts the run.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ttp_intel_pipeline::{
    build_backend, load_items, run_batch, report, PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "ttp-intel-pipeline",
    about = "Classify fetched security content and extract structured threat-intel records."
)]
struct Cli {
    /// Fetched-content JSON file (array of {source, url, content, timestamp}).
    input: PathBuf,

    /// Where to write the record array.
    #[arg(short, long, default_value = "reports/records.json")]
    output: PathBuf,

    /// Pipeline config TOML; falls back to $TTP_PIPELINE_CONFIG, then
    /// config/pipeline.toml, then defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ttp_intel_pipeline=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::load_from_file(path)?,
        None => PipelineConfig::load_default()?,
    };
    tracing::info!(
        backend = %config.backend,
        timeout_s = config.timeout_seconds,
        "pipeline config loaded"
    );

    let backend = build_backend(&config)?;
    let items = load_items(&cli.input)?;
    if items.is_empty() {
        bail!("no analyzable items in {}", cli.input.display());
    }

    let outcome = run_batch(backend.as_ref(), &items, &config).await;

    if let Some(dir) = cli.output.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating output dir {}", dir.display()))?;
        }
    }
    report::write_records(&cli.output, &outcome.records)?;
    let summary_path = report::write_summary(&cli.output, &outcome.summary)?;

    println!(
        "{} records written to {} (ok {}, partial {}, failed {}, skipped {}); summary at {}",
        outcome.records.len(),
        cli.output.display(),
        outcome.summary.ok,
        outcome.summary.partial,
        outcome.summary.failed,
        outcome.summary.invalid_skipped,
        summary_path.display(),
    );

    // Catastrophic condition: every attempted item failed. Attempt the whole
    // batch first, persist what there is, then abort loudly.
    if outcome.summary.all_failed() {
        bail!(
            "backend '{}' produced no usable records: all {} items failed",
            backend.name(),
            outcome.summary.failed
        );
    }
    Ok(())
}
