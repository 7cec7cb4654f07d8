//! Bit-level diagnosis of a single PCN error observation.
//!
//! A readout chip reports the PCN value it expected and an XOR pattern
//! ("diff") against what it actually received. A set diff bit marks a
//! position where the two disagreed; the expected bit at that position is
//! the correct value.
//!
//! # Bit order
//! - Bit 0 is the least significant bit, bit 7 the most significant.
//! - Bit strings are written MSB-first: the leftmost character is bit 7,
//!   matching how a byte is written on paper.
//!
//! # Example
//! ```
//! use pcnmap_core::bitdiag::{BitDiagnostic, BitKind};
//!
//! let diag = BitDiagnostic::from_bit_strings("10110000", "00000001").unwrap();
//! assert_eq!(diag.bits(BitKind::Observed).to_string(), "10110001");
//! assert!(diag.bits(BitKind::Diff).test(0));
//! ```

use crate::error::{FormatError, RangeError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Width of every pattern handled here.
pub const PATTERN_BITS: usize = 8;

/// Which pattern of a diagnostic to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitKind {
    /// The PCN value the chip should have received
    Expected,
    /// XOR of expected and observed; set bits are errors
    Diff,
    /// What was actually received (`expected ^ diff`)
    Observed,
}

/// An 8-bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct BitPattern(u8);

impl BitPattern {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Test bit `bit` (0 = LSB).
    ///
    /// Bits at or above [`PATTERN_BITS`] read as unset.
    pub fn test(self, bit: usize) -> bool {
        bit < PATTERN_BITS && (self.0 >> bit) & 1 == 1
    }

    /// True if any bit is set.
    pub fn any(self) -> bool {
        self.0 != 0
    }

    pub fn count_ones(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate `(bit, is_set)` from bit 7 down to bit 0.
    pub fn paper_order(self) -> impl Iterator<Item = (usize, bool)> {
        (0..PATTERN_BITS).rev().map(move |bit| (bit, self.test(bit)))
    }
}

impl fmt::Display for BitPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08b}", self.0)
    }
}

impl FromStr for BitPattern {
    type Err = FormatError;

    /// Parse exactly eight `0`/`1` characters, leftmost = bit 7.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let length = s.chars().count();
        if length != PATTERN_BITS {
            return Err(FormatError::WrongLength {
                input: s.to_string(),
                length,
            });
        }

        let mut value = 0u8;
        for (index, c) in s.chars().enumerate() {
            let bit = match c {
                '0' => 0,
                '1' => 1,
                found => {
                    return Err(FormatError::InvalidCharacter {
                        input: s.to_string(),
                        index,
                        found,
                    })
                }
            };
            value = (value << 1) | bit;
        }
        Ok(Self(value))
    }
}

impl From<u8> for BitPattern {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// One PCN error observation: expected value and diff pattern.
///
/// The observed value is always derived, never stored, so the three
/// patterns can not drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitDiagnostic {
    expected: u8,
    diff: u8,
}

impl BitDiagnostic {
    /// Create a diagnostic from values already known to be bytes.
    pub const fn new(expected: u8, diff: u8) -> Self {
        Self { expected, diff }
    }

    /// Create a diagnostic from two integers.
    ///
    /// # Errors
    /// Returns `RangeError::ValueTooWide` if either value exceeds 255. Wider
    /// values are rejected rather than masked.
    pub fn from_values(expected: u32, diff: u32) -> Result<Self> {
        Ok(Self::new(
            narrow("expected", expected)?,
            narrow("diff", diff)?,
        ))
    }

    /// Create a diagnostic from two 8-character bit strings (MSB first).
    ///
    /// # Errors
    /// Returns a `FormatError` if either string has the wrong length or a
    /// character other than `0`/`1`.
    pub fn from_bit_strings(expected: &str, diff: &str) -> Result<Self> {
        let expected: BitPattern = expected.parse()?;
        let diff: BitPattern = diff.parse()?;
        Ok(Self::new(expected.value(), diff.value()))
    }

    /// Read one of the three patterns.
    pub fn bits(&self, kind: BitKind) -> BitPattern {
        match kind {
            BitKind::Expected => BitPattern(self.expected),
            BitKind::Diff => BitPattern(self.diff),
            BitKind::Observed => BitPattern(self.expected ^ self.diff),
        }
    }

    /// True if at least one bit disagreed.
    pub fn is_error(&self) -> bool {
        self.diff != 0
    }

    /// Overwrite both fields.
    ///
    /// Both inputs are validated before either field changes.
    pub fn replace(&mut self, expected: u32, diff: u32) -> Result<()> {
        *self = Self::from_values(expected, diff)?;
        Ok(())
    }

    /// Overwrite both fields from bit strings.
    pub fn replace_bit_strings(&mut self, expected: &str, diff: &str) -> Result<()> {
        *self = Self::from_bit_strings(expected, diff)?;
        Ok(())
    }
}

fn narrow(field: &'static str, value: u32) -> Result<u8> {
    u8::try_from(value).map_err(|_| RangeError::ValueTooWide { field, value }.into())
}
