//! Per-channel accumulation of PCN errors.
//!
//! The aggregator consumes a stream of `(board, chip, BitDiagnostic)`
//! observations and keeps, for every channel that ever reported an error:
//! - the number of error observations
//! - a distribution over (bit position, expected bit value) of the
//!   disagreeing bits
//!
//! # Design
//!
//! - **Sparse**: observations with an all-zero diff are dropped, so only
//!   channels with errors ever appear in either map
//! - **Ordered**: both maps are `BTreeMap`s keyed by [`ChannelKey`], so
//!   iteration order is ascending key order and reproducible
//! - **Atomic fill**: the channel key is validated before anything is
//!   mutated, so a rejected observation leaves no trace
//!
//! # Positions
//!
//! Distribution positions are in paper order: position 0 is bit 7 (MSB),
//! position 7 is bit 0 (LSB). [`BitDistribution::rows`] yields the bit
//! index alongside each position for labelling.
//!
//! # Thread Safety
//!
//! `ErrorAggregator` is `Send` but takes `&mut self` to fill. For parallel
//! ingestion use one aggregator per worker and combine them with
//! [`ErrorAggregator::merge`].

use crate::bitdiag::{BitDiagnostic, BitKind, PATTERN_BITS};
use crate::channel::{ChannelKey, CHIPS_PER_BOARD, MAX_BOARD};
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts of (position, expected bit value) over one channel's errors.
///
/// `cells[position][expected_bit]`, position 0 = MSB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BitDistribution {
    cells: [[u64; 2]; PATTERN_BITS],
}

impl BitDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, position: usize, expected_bit: bool) {
        self.cells[position][expected_bit as usize] += 1;
    }

    /// Count for one cell. Positions past the last bit read as zero.
    pub fn count(&self, position: usize, expected_bit: bool) -> u64 {
        self.cells
            .get(position)
            .map_or(0, |cell| cell[expected_bit as usize])
    }

    /// Total recorded bit errors.
    pub fn total(&self) -> u64 {
        self.cells.iter().flatten().sum()
    }

    /// Bit errors per position regardless of expected value.
    pub fn per_position(&self) -> [u64; PATTERN_BITS] {
        let mut out = [0; PATTERN_BITS];
        for (slot, cell) in out.iter_mut().zip(&self.cells) {
            *slot = cell[0] + cell[1];
        }
        out
    }

    /// Iterate `(position, bit_index, [expected 0, expected 1])` in paper order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, usize, [u64; 2])> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(position, cell)| (position, PATTERN_BITS - 1 - position, *cell))
    }

    /// Add another distribution cell by cell.
    pub fn merge(&mut self, other: &BitDistribution) {
        for (mine, theirs) in self.cells.iter_mut().zip(&other.cells) {
            mine[0] += theirs[0];
            mine[1] += theirs[1];
        }
    }
}

/// Per-channel PCN error accumulator.
#[derive(Debug, Clone)]
pub struct ErrorAggregator {
    /// Board range for presentation (grid width)
    board_capacity: u32,

    /// Error observations per channel
    error_counts: BTreeMap<ChannelKey, u64>,

    /// Bit distributions per channel, created on first error
    bit_distributions: BTreeMap<ChannelKey, BitDistribution>,
}

impl ErrorAggregator {
    /// Create an empty aggregator.
    ///
    /// `board_capacity_hint` only sizes [`channel_grid`](Self::channel_grid);
    /// the maps accept any encodable channel. The hint is clamped to
    /// `MAX_BOARD + 1`, the number of encodable boards.
    pub fn new(board_capacity_hint: u32) -> Self {
        Self {
            board_capacity: board_capacity_hint.min(MAX_BOARD + 1),
            error_counts: BTreeMap::new(),
            bit_distributions: BTreeMap::new(),
        }
    }

    /// Record one observation.
    ///
    /// Returns `Ok(false)` without touching any state when the diff is all
    /// zero, `Ok(true)` when the error was recorded.
    ///
    /// # Errors
    /// Propagates the `RangeError` from [`ChannelKey::encode`]; the
    /// aggregator is unchanged in that case.
    pub fn fill(&mut self, board: u32, chip: u32, diag: BitDiagnostic) -> Result<bool> {
        let diff = diag.bits(BitKind::Diff);
        if !diff.any() {
            return Ok(false);
        }

        let key = ChannelKey::encode(board, chip)?;
        let expected = diag.bits(BitKind::Expected);

        *self.error_counts.entry(key).or_insert(0) += 1;
        let dist = self.bit_distributions.entry(key).or_default();
        for (bit, set) in diff.paper_order() {
            if set {
                dist.record(PATTERN_BITS - 1 - bit, expected.test(bit));
            }
        }

        tracing::trace!(channel = %key, diff = %diff, expected = %expected, "pcn error recorded");
        Ok(true)
    }

    /// Error observations for a channel (0 if none).
    pub fn error_count(&self, key: ChannelKey) -> u64 {
        self.error_counts.get(&key).copied().unwrap_or(0)
    }

    /// Distribution for a channel, absent if it never had an error.
    pub fn distribution_for(&self, key: ChannelKey) -> Option<&BitDistribution> {
        self.bit_distributions.get(&key)
    }

    /// Channels with at least one error, in ascending key order.
    pub fn all_channels_with_errors(&self) -> impl Iterator<Item = ChannelKey> + '_ {
        self.error_counts.keys().copied()
    }

    /// Number of channels with errors.
    pub fn channel_count(&self) -> usize {
        self.error_counts.len()
    }

    /// Error observations across all channels.
    pub fn total_errors(&self) -> u64 {
        self.error_counts.values().sum()
    }

    pub fn board_capacity(&self) -> u32 {
        self.board_capacity
    }

    pub fn is_empty(&self) -> bool {
        self.error_counts.is_empty()
    }

    /// Board × chip error map: `grid[chip][board]` for boards below the
    /// capacity hint.
    ///
    /// Channels on boards at or above the capacity are still counted in the
    /// per-channel maps but do not appear here.
    pub fn channel_grid(&self) -> Vec<Vec<u64>> {
        let mut grid = vec![vec![0u64; self.board_capacity as usize]; CHIPS_PER_BOARD];
        for (key, &count) in &self.error_counts {
            if let Some(cell) = grid
                .get_mut(key.chip() as usize)
                .and_then(|row| row.get_mut(key.board() as usize))
            {
                *cell += count;
            }
        }
        grid
    }

    /// Fold another aggregator into this one.
    ///
    /// Keys are unioned and counts added; the larger capacity hint wins.
    pub fn merge(&mut self, other: ErrorAggregator) {
        self.board_capacity = self.board_capacity.max(other.board_capacity);
        for (key, count) in other.error_counts {
            *self.error_counts.entry(key).or_insert(0) += count;
        }
        for (key, dist) in other.bit_distributions {
            self.bit_distributions.entry(key).or_default().merge(&dist);
        }
    }
}

impl Default for ErrorAggregator {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, RangeError};

    fn key(board: u32, chip: u32) -> ChannelKey {
        ChannelKey::encode(board, chip).unwrap()
    }

    fn diag(expected: u8, diff: u8) -> BitDiagnostic {
        BitDiagnostic::new(expected, diff)
    }

    #[test]
    fn test_zero_diff_is_dropped() {
        let mut agg = ErrorAggregator::new(128);
        for expected in [0x00, 0x5A, 0xFF] {
            assert!(!agg.fill(3, 2, diag(expected, 0)).unwrap());
        }
        assert_eq!(agg.error_count(key(3, 2)), 0);
        assert!(agg.distribution_for(key(3, 2)).is_none());
        assert!(agg.is_empty());
    }

    #[test]
    fn test_single_lsb_error() {
        let mut agg = ErrorAggregator::new(128);
        assert!(agg.fill(3, 2, diag(0b1011_0000, 0b0000_0001)).unwrap());

        assert_eq!(agg.error_count(key(3, 2)), 1);
        let dist = agg.distribution_for(key(3, 2)).unwrap();
        assert_eq!(dist.total(), 1);
        // bit 0 sits at paper position 7; expected bit 0 of 0b10110000 is 0
        assert_eq!(dist.count(7, false), 1);
        assert_eq!(dist.count(7, true), 0);
    }

    #[test]
    fn test_msb_error_records_expected_value() {
        let mut agg = ErrorAggregator::new(128);
        agg.fill(0, 0, diag(0b1000_0000, 0b1000_0000)).unwrap();

        let dist = agg.distribution_for(key(0, 0)).unwrap();
        assert_eq!(dist.count(0, true), 1);
        assert_eq!(dist.per_position(), [1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_two_bit_diff_twice() {
        let mut agg = ErrorAggregator::new(128);
        agg.fill(10, 4, diag(0b0100_0001, 0b0100_0010)).unwrap();
        agg.fill(10, 4, diag(0b0100_0001, 0b0100_0010)).unwrap();

        assert_eq!(agg.error_count(key(10, 4)), 2);
        let dist = agg.distribution_for(key(10, 4)).unwrap();
        assert_eq!(dist.total(), 4);
        // bit 6 (position 1) expected 1, bit 1 (position 6) expected 0
        assert_eq!(dist.count(1, true), 2);
        assert_eq!(dist.count(6, false), 2);
    }

    #[test]
    fn test_channels_with_errors_are_exact_and_stable() {
        let mut agg = ErrorAggregator::new(128);
        agg.fill(7, 1, diag(0, 1)).unwrap();
        agg.fill(2, 3, diag(0, 2)).unwrap();
        agg.fill(7, 1, diag(0, 4)).unwrap();
        agg.fill(5, 0, diag(0, 0)).unwrap();
        agg.fill(131, 15, diag(0xFF, 0x80)).unwrap();

        let first: Vec<_> = agg.all_channels_with_errors().collect();
        let second: Vec<_> = agg.all_channels_with_errors().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![key(7, 1), key(2, 3), key(131, 15)]);
        for k in &first {
            assert!(agg.error_count(*k) > 0);
            assert!(agg.distribution_for(*k).is_some());
        }
        assert_eq!(agg.channel_count(), 3);
        assert_eq!(agg.total_errors(), 4);
    }

    #[test]
    fn test_out_of_range_fill_changes_nothing() {
        let mut agg = ErrorAggregator::new(128);
        agg.fill(1, 1, diag(0, 1)).unwrap();

        let err = agg.fill(1, 16, diag(0, 1)).unwrap_err();
        assert!(matches!(err, Error::Range(RangeError::ChipOutOfRange { .. })));
        let err = agg.fill(300, 0, diag(0, 1)).unwrap_err();
        assert!(matches!(err, Error::Range(RangeError::BoardOutOfRange { .. })));

        assert_eq!(agg.channel_count(), 1);
        assert_eq!(agg.total_errors(), 1);
    }

    #[test]
    fn test_out_of_range_zero_diff_is_still_a_no_op() {
        let mut agg = ErrorAggregator::new(128);
        assert!(!agg.fill(1, 99, diag(0, 0)).unwrap());
    }

    #[test]
    fn test_channel_grid() {
        let mut agg = ErrorAggregator::new(4);
        agg.fill(1, 2, diag(0, 1)).unwrap();
        agg.fill(1, 2, diag(0, 3)).unwrap();
        agg.fill(3, 15, diag(0, 1)).unwrap();
        agg.fill(9, 0, diag(0, 1)).unwrap();

        let grid = agg.channel_grid();
        assert_eq!(grid.len(), 16);
        assert!(grid.iter().all(|row| row.len() == 4));
        assert_eq!(grid[2][1], 2);
        assert_eq!(grid[15][3], 1);
        assert_eq!(grid.iter().flatten().sum::<u64>(), 3);
        assert_eq!(agg.error_count(key(9, 0)), 1);
    }

    #[test]
    fn test_capacity_clamped_to_encodable_boards() {
        let mut agg = ErrorAggregator::new(u32::MAX);
        assert_eq!(agg.board_capacity(), MAX_BOARD + 1);
        agg.fill(MAX_BOARD, 0, diag(0, 1)).unwrap();

        let grid = agg.channel_grid();
        assert!(grid.iter().all(|row| row.len() == 256));
        assert_eq!(grid[0][255], 1);

        let mut merged = ErrorAggregator::new(8);
        merged.merge(agg);
        assert_eq!(merged.board_capacity(), 256);
    }

    #[test]
    fn test_merge_matches_sequential_fill() {
        let stream = [
            (3, 2, diag(0xB0, 0x01)),
            (3, 2, diag(0x0F, 0x18)),
            (40, 7, diag(0xFF, 0x80)),
            (12, 0, diag(0x00, 0x00)),
            (40, 7, diag(0x00, 0x42)),
        ];

        let mut sequential = ErrorAggregator::new(64);
        for &(b, c, d) in &stream {
            sequential.fill(b, c, d).unwrap();
        }

        let mut left = ErrorAggregator::new(64);
        let mut right = ErrorAggregator::new(64);
        for (i, &(b, c, d)) in stream.iter().enumerate() {
            if i % 2 == 0 {
                left.fill(b, c, d).unwrap();
            } else {
                right.fill(b, c, d).unwrap();
            }
        }
        left.merge(right);

        assert_eq!(
            left.all_channels_with_errors().collect::<Vec<_>>(),
            sequential.all_channels_with_errors().collect::<Vec<_>>()
        );
        for k in sequential.all_channels_with_errors() {
            assert_eq!(left.error_count(k), sequential.error_count(k));
            assert_eq!(left.distribution_for(k), sequential.distribution_for(k));
        }
    }

    #[test]
    fn test_rows_label_bits() {
        let mut dist = BitDistribution::new();
        dist.record(0, true);
        let rows: Vec<_> = dist.rows().collect();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0], (0, 7, [0, 1]));
        assert_eq!(rows[7], (7, 0, [0, 0]));
    }
}
