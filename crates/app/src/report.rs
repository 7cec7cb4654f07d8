//! Report rendering for an aggregated run.
//!
//! The renderer only reads the aggregator through its public accessors.
//! All presentation choices live in [`RenderConfig`], which the caller
//! passes in explicitly.
//!
//! # Text layout
//!
//! ```text
//! === PCN error map: 2 channels, 3 errors ===
//!
//! Board x chip map (boards 0-127, '.' = 0, '*' = more than 9)
//! chip  2 |...1....
//!
//! Errors per channel
//!   board  chip  errors  bit errors
//!       3     2       1           1
//!
//! Per Beetle PCN error map (3,2): 1 errors
//!   bit        7   6   5   4   3   2   1   0
//!   expect 0   0   0   0   0   0   0   0   1
//!   expect 1   0   0   0   0   0   0   0   0
//! ```

use clap::ValueEnum;
use pcnmap_core::{ChannelKey, ErrorAggregator};
use serde::Serialize;
use std::fmt::Write;

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Presentation settings for [`render`].
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub format: ReportFormat,
    /// Limit on per-channel bit maps (None = all)
    pub max_channels: Option<usize>,
    /// Include the board x chip map
    pub show_grid: bool,
    /// Heading of the text report
    pub title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::Text,
            max_channels: None,
            show_grid: true,
            title: "PCN error map".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportDoc {
    title: String,
    board_capacity: u32,
    total_errors: u64,
    channels: Vec<ChannelDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid: Option<Vec<Vec<u64>>>,
}

#[derive(Debug, Serialize)]
struct ChannelDoc {
    key: ChannelKey,
    board: u32,
    chip: u32,
    errors: u64,
    /// Paper order, bit 7 first
    bits: Vec<BitDoc>,
}

#[derive(Debug, Serialize)]
struct BitDoc {
    bit: usize,
    expected_0: u64,
    expected_1: u64,
}

/// Render the aggregate in the configured format.
pub fn render(aggregator: &ErrorAggregator, config: &RenderConfig) -> serde_json::Result<String> {
    match config.format {
        ReportFormat::Text => Ok(render_text(aggregator, config)),
        ReportFormat::Json => render_json(aggregator, config),
    }
}

fn shown_channels(aggregator: &ErrorAggregator, config: &RenderConfig) -> Vec<ChannelKey> {
    let limit = config.max_channels.unwrap_or(usize::MAX);
    aggregator.all_channels_with_errors().take(limit).collect()
}

/// Render a plain-text report.
pub fn render_text(aggregator: &ErrorAggregator, config: &RenderConfig) -> String {
    let mut out = String::new();
    // Writing to a String never fails
    let _ = write_text(&mut out, aggregator, config);
    out
}

fn write_text(
    out: &mut String,
    aggregator: &ErrorAggregator,
    config: &RenderConfig,
) -> std::fmt::Result {
    writeln!(
        out,
        "=== {}: {} channels, {} errors ===",
        config.title,
        aggregator.channel_count(),
        aggregator.total_errors()
    )?;

    if aggregator.is_empty() {
        writeln!(out, "\nNo PCN errors recorded.")?;
        return Ok(());
    }

    if config.show_grid {
        writeln!(
            out,
            "\nBoard x chip map (boards 0-{}, '.' = 0, '*' = more than 9)",
            aggregator.board_capacity().saturating_sub(1)
        )?;
        for (chip, row) in aggregator.channel_grid().iter().enumerate() {
            if row.iter().all(|&n| n == 0) {
                continue;
            }
            let cells: String = row.iter().map(|&n| grid_cell(n)).collect();
            writeln!(out, "chip {chip:>2} |{cells}")?;
        }
    }

    writeln!(out, "\nErrors per channel")?;
    writeln!(out, "  board  chip  errors  bit errors")?;
    for key in aggregator.all_channels_with_errors() {
        let bit_errors = aggregator.distribution_for(key).map_or(0, |d| d.total());
        writeln!(
            out,
            "  {:>5}  {:>4}  {:>6}  {:>10}",
            key.board(),
            key.chip(),
            aggregator.error_count(key),
            bit_errors
        )?;
    }

    let shown = shown_channels(aggregator, config);
    for &key in &shown {
        let Some(dist) = aggregator.distribution_for(key) else {
            continue;
        };
        writeln!(
            out,
            "\nPer Beetle PCN error map {key}: {} errors",
            aggregator.error_count(key)
        )?;
        write!(out, "  bit     ")?;
        for (_, bit, _) in dist.rows() {
            write!(out, "{bit:>4}")?;
        }
        writeln!(out)?;
        for value in [false, true] {
            write!(out, "  expect {}", value as u8)?;
            for position in 0..8 {
                write!(out, "{:>4}", dist.count(position, value))?;
            }
            writeln!(out)?;
        }
    }

    let hidden = aggregator.channel_count() - shown.len();
    if hidden > 0 {
        writeln!(out, "\n... {hidden} more channels not shown")?;
    }
    Ok(())
}

fn grid_cell(count: u64) -> char {
    match count {
        0 => '.',
        1..=9 => char::from(b'0' + count as u8),
        _ => '*',
    }
}

/// Render a JSON report.
pub fn render_json(aggregator: &ErrorAggregator, config: &RenderConfig) -> serde_json::Result<String> {
    let channels = shown_channels(aggregator, config)
        .into_iter()
        .map(|key| ChannelDoc {
            key,
            board: key.board(),
            chip: key.chip(),
            errors: aggregator.error_count(key),
            bits: aggregator
                .distribution_for(key)
                .map(|dist| {
                    dist.rows()
                        .map(|(_, bit, [zeros, ones])| BitDoc {
                            bit,
                            expected_0: zeros,
                            expected_1: ones,
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();

    let doc = ReportDoc {
        title: config.title.clone(),
        board_capacity: aggregator.board_capacity(),
        total_errors: aggregator.total_errors(),
        channels,
        grid: config.show_grid.then(|| aggregator.channel_grid()),
    };
    serde_json::to_string_pretty(&doc)
}
