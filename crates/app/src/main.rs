//! pcnmap - build PCN error maps from readout-board error dumps

use anyhow::{Context, Result};
use clap::Parser;
use pcnmap_app::config::{Cli, Config, Source};
use pcnmap_app::ingest::{self, MalformedPolicy, Row};
use pcnmap_app::report::ReportFormat;
use pcnmap_app::{input_gen, report};
use pcnmap_core::{ErrorAggregator, IngestMetrics};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::from_cli(cli).context("invalid configuration")?;
    if config.print_config {
        config.print();
    }

    let policy = if config.strict {
        MalformedPolicy::Abort
    } else {
        MalformedPolicy::Skip
    };
    let mut aggregator = ErrorAggregator::new(config.board_capacity);
    let mut metrics = IngestMetrics::new();

    match &config.source {
        Source::File(path) => {
            ingest::ingest_file(path, &mut aggregator, policy, &mut metrics)
                .with_context(|| format!("failed to ingest {}", path.display()))?;
        }
        Source::Synthetic {
            records,
            error_rate,
            sample_out,
        } => {
            tracing::info!(seed = config.seed, records, error_rate, "generating synthetic stream");
            let generated =
                input_gen::generate_records(config.seed, *records, *error_rate, config.board_capacity);
            if let Some(path) = sample_out {
                input_gen::write_sample_table(path, &generated)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            let rows = generated
                .into_iter()
                .enumerate()
                .map(|(i, record)| Ok(Row { line: i + 1, record }));
            ingest::ingest(rows, &mut aggregator, policy, &mut metrics)?;
        }
    }
    metrics.complete();

    let rendered = report::render(&aggregator, &config.render).context("failed to render report")?;
    match &config.output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{rendered}"),
    }

    // Keep stdout parseable when it carries JSON
    let json_on_stdout = config.render.format == ReportFormat::Json && config.output.is_none();
    if config.print_metrics && !json_on_stdout {
        metrics.print_summary();
    }
    Ok(())
}
