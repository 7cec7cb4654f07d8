//! Configuration for the pcnmap tool.
//!
//! Command-line arguments are parsed with clap into [`Cli`] and then
//! resolved into a [`Config`], filling in defaults (including randomized
//! defaults that are reproducible with a seed).
//!
//! # Philosophy
//!
//! The tool should work with ZERO arguments: without `--in` it generates a
//! synthetic error stream. The seed is always printed with the resolved
//! configuration so any run can be repeated.

use crate::report::{RenderConfig, ReportFormat};
use clap::Parser;
use pcnmap_core::channel::MAX_BOARD;
use pcnmap_core::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

/// pcnmap - build PCN error maps from readout-board error dumps
#[derive(Parser, Debug, Clone)]
#[command(name = "pcnmap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Org-table error dump to read (default: generate a synthetic stream)
    #[arg(long = "in")]
    pub input: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(long = "out")]
    pub output: Option<PathBuf>,

    /// Random seed for the synthetic stream
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of synthetic records to generate
    #[arg(long, default_value_t = 10_000)]
    pub records: usize,

    /// Fraction of synthetic records that carry an error (default: random 0.05-0.30)
    #[arg(long)]
    pub error_rate: Option<f64>,

    /// Also write the synthetic stream as an org table to this path
    #[arg(long)]
    pub write_sample: Option<PathBuf>,

    /// Number of readout boards shown in the channel map
    #[arg(long, default_value_t = 128)]
    pub boards: u32,

    /// Abort on the first malformed record instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Show at most this many per-channel bit maps
    #[arg(long)]
    pub max_channels: Option<usize>,

    /// Leave the board x chip map out of the report
    #[arg(long)]
    pub no_grid: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Print resolved configuration
    #[arg(long)]
    pub print_config: bool,

    /// Don't print the ingestion summary
    #[arg(long)]
    pub no_metrics: bool,
}

/// Where observations come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Read an org-table dump
    File(PathBuf),
    /// Generate a seeded synthetic stream
    Synthetic {
        records: usize,
        error_rate: f64,
        sample_out: Option<PathBuf>,
    },
}

/// Complete configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: Source,

    /// Report destination (None = stdout)
    pub output: Option<PathBuf>,

    /// Seed for every random choice in the run
    pub seed: u64,

    /// Capacity hint for the aggregator
    pub board_capacity: u32,

    /// Abort on malformed records
    pub strict: bool,

    pub render: RenderConfig,

    pub log_level: String,

    pub print_config: bool,

    pub print_metrics: bool,
}

impl Config {
    /// Resolve parsed arguments into a configuration.
    ///
    /// # Errors
    /// Returns `Error::Config` for a board count beyond the channel key's
    /// board field or an error rate outside `0.0..=1.0`.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.boards == 0 || cli.boards > MAX_BOARD + 1 {
            return Err(Error::Config(format!(
                "--boards must be between 1 and {}, got {}",
                MAX_BOARD + 1,
                cli.boards
            )));
        }
        if let Some(rate) = cli.error_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::Config(format!(
                    "--error-rate must be between 0.0 and 1.0, got {rate}"
                )));
            }
        }

        // Determine seed (explicit or time-based)
        let seed = cli.seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |t| t.as_millis() as u64)
        });
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let source = match cli.input {
            Some(path) => Source::File(path),
            None => Source::Synthetic {
                records: cli.records,
                error_rate: cli
                    .error_rate
                    .unwrap_or_else(|| rng.gen_range(0.05..=0.30)),
                sample_out: cli.write_sample,
            },
        };

        Ok(Config {
            source,
            output: cli.output,
            seed,
            board_capacity: cli.boards,
            strict: cli.strict,
            render: RenderConfig {
                format: cli.format,
                max_channels: cli.max_channels,
                show_grid: !cli.no_grid,
                ..RenderConfig::default()
            },
            log_level: cli.log_level,
            print_config: cli.print_config,
            print_metrics: !cli.no_metrics,
        })
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        match &self.source {
            Source::File(path) => println!("Input file: {}", path.display()),
            Source::Synthetic {
                records,
                error_rate,
                sample_out,
            } => {
                println!("Input: synthetic ({records} records)");
                println!("Error rate: {:.2}%", error_rate * 100.0);
                if let Some(path) = sample_out {
                    println!("Sample table: {}", path.display());
                }
            }
        }
        println!(
            "Output: {}",
            self.output
                .as_ref()
                .map_or_else(|| "(stdout)".to_string(), |p| p.display().to_string())
        );
        println!("Seed: {}", self.seed);
        println!("Boards: {}", self.board_capacity);
        println!(
            "Malformed records: {}",
            if self.strict { "abort" } else { "skip" }
        );
        println!("Report format: {:?}", self.render.format);
        println!();
    }
}
