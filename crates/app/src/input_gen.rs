//! Synthetic PCN error streams.
//!
//! When no dump is given, we generate a stream that looks like a real one:
//! the expected PCN walks a counter, most records agree, and errors cluster
//! on a few noisy chips.
//!
//! # Design
//!
//! Generated records have:
//! - Mostly agreeing records (zero diff), filtered out by the aggregator
//! - Errors concentrated on a handful of noisy channels, each with its own
//!   weak bits
//! - A thin background of single-bit errors anywhere on the detector
//!
//! The same seed always yields the same stream.

use pcnmap_core::channel::CHIPS_PER_BOARD;
use pcnmap_core::{BitPattern, ErrorRecord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt::Write as _;
use std::io::Write;

/// Beetle PCN counters wrap after this many values.
const PCN_PERIOD: u32 = 187;

/// Share of errors that come from the noisy channels.
const NOISY_SHARE: f64 = 0.9;

/// A channel that produces most of the errors.
#[derive(Debug, Clone, Copy)]
struct NoisyChannel {
    board: u32,
    chip: u32,
    /// Bits this channel tends to get wrong
    weak_bits: u8,
}

/// Generate `count` records over boards `0..boards`.
///
/// # Arguments
/// - `seed`: random seed for determinism
/// - `count`: number of records
/// - `error_rate`: probability that a record carries an error
/// - `boards`: number of readout boards to draw channels from
pub fn generate_records(seed: u64, count: usize, error_rate: f64, boards: u32) -> Vec<ErrorRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let boards = boards.max(1);
    let noisy = noisy_channels(&mut rng, boards);
    let run = rng.gen_range(100_000..200_000u64);

    (0..count)
        .map(|i| {
            let expected = (i as u32 % PCN_PERIOD) as u8;
            let (board, chip, diff) = if rng.gen_bool(error_rate.clamp(0.0, 1.0)) {
                error_on(&mut rng, &noisy, boards)
            } else {
                (rng.gen_range(0..boards), rng.gen_range(0..CHIPS_PER_BOARD as u32), 0)
            };

            ErrorRecord {
                run: Some(run),
                event: Some(i as u64),
                board,
                chip,
                expected_bits: BitPattern::new(expected).to_string(),
                diff_bits: BitPattern::new(diff).to_string(),
            }
        })
        .collect()
}

fn noisy_channels(rng: &mut ChaCha8Rng, boards: u32) -> Vec<NoisyChannel> {
    let n = rng.gen_range(1..=8usize);
    (0..n)
        .map(|_| {
            // One or two weak bits per channel
            let mut weak_bits = 1u8 << rng.gen_range(0..8u32);
            if rng.gen_bool(0.5) {
                weak_bits |= 1u8 << rng.gen_range(0..8u32);
            }
            NoisyChannel {
                board: rng.gen_range(0..boards),
                chip: rng.gen_range(0..CHIPS_PER_BOARD as u32),
                weak_bits,
            }
        })
        .collect()
}

fn error_on(rng: &mut ChaCha8Rng, noisy: &[NoisyChannel], boards: u32) -> (u32, u32, u8) {
    if rng.gen_bool(NOISY_SHARE) {
        let channel = noisy[rng.gen_range(0..noisy.len())];
        // Flip a non-empty subset of the weak bits
        let mut diff = channel.weak_bits & rng.gen::<u8>();
        if diff == 0 {
            diff = channel.weak_bits;
        }
        (channel.board, channel.chip, diff)
    } else {
        (
            rng.gen_range(0..boards),
            rng.gen_range(0..CHIPS_PER_BOARD as u32),
            1u8 << rng.gen_range(0..8u32),
        )
    }
}

/// Format records as an org table in the dump layout.
pub fn to_org_table(records: &[ErrorRecord]) -> String {
    let mut out = String::new();
    out.push_str("| runNo | eventID | tell1 | ExpPCN | Beetle | expbits  | badbits  |\n");
    out.push_str("|-------+---------+-------+--------+--------+----------+----------|\n");
    for r in records {
        let exp_pcn = r
            .expected_bits
            .parse::<BitPattern>()
            .map_or(0, |p| p.value());
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            r.run.unwrap_or(0),
            r.event.unwrap_or(0),
            r.board,
            exp_pcn,
            r.chip,
            r.expected_bits,
            r.diff_bits
        );
    }
    out
}

/// Write a generated stream to a file as an org table.
pub fn write_sample_table(path: &std::path::Path, records: &[ErrorRecord]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(to_org_table(records).as_bytes())?;
    Ok(())
}
