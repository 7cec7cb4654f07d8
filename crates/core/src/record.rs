//! One row of a PCN error dump, before diagnosis.

use crate::aggregator::ErrorAggregator;
use crate::bitdiag::BitDiagnostic;
use crate::error::Result;
use serde::Serialize;

/// A raw error record as handed over by an ingestion source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Run number, when the source carries one
    pub run: Option<u64>,
    /// Event id within the run, when the source carries one
    pub event: Option<u64>,
    /// Readout board (TELL1) id
    pub board: u32,
    /// Chip (Beetle) index on the board
    pub chip: u32,
    /// Expected PCN, MSB first
    pub expected_bits: String,
    /// Diff pattern, MSB first
    pub diff_bits: String,
}

impl ErrorRecord {
    pub fn new(board: u32, chip: u32, expected_bits: &str, diff_bits: &str) -> Self {
        Self {
            run: None,
            event: None,
            board,
            chip,
            expected_bits: expected_bits.to_string(),
            diff_bits: diff_bits.to_string(),
        }
    }

    /// Parse the two bit strings.
    pub fn diagnostic(&self) -> Result<BitDiagnostic> {
        BitDiagnostic::from_bit_strings(&self.expected_bits, &self.diff_bits)
    }

    /// Diagnose the record and fill it into `aggregator`.
    ///
    /// Returns the diagnostic and whether it was recorded as an error.
    pub fn fill_into(&self, aggregator: &mut ErrorAggregator) -> Result<(BitDiagnostic, bool)> {
        let diag = self.diagnostic()?;
        let recorded = aggregator.fill(self.board, self.chip, diag)?;
        Ok((diag, recorded))
    }
}
