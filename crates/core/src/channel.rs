//! Dense channel keys for (board, chip) pairs.
//!
//! A channel is one chip (Beetle) on one readout board (TELL1). The key
//! packs both into a single integer:
//!
//! ```text
//!  bit 11    8 7            0
//!     +------+--------------+
//!     | chip |    board     |
//!     +------+--------------+
//! ```
//!
//! Both masks are derived from the field widths, so `encode` and `decode`
//! are exact inverses for every board in `0..=255` and chip in `0..=15`.

use crate::error::{RangeError, Result};
use serde::Serialize;
use std::fmt;

/// Width of the board field (low bits).
pub const BOARD_FIELD_BITS: u32 = 8;

/// Width of the chip field (above the board field).
pub const CHIP_FIELD_BITS: u32 = 4;

const BOARD_MASK: u32 = (1 << BOARD_FIELD_BITS) - 1;
const CHIP_MASK: u32 = (1 << CHIP_FIELD_BITS) - 1;
const KEY_MASK: u32 = (CHIP_MASK << BOARD_FIELD_BITS) | BOARD_MASK;

/// Largest encodable board id.
pub const MAX_BOARD: u32 = BOARD_MASK;

/// Largest encodable chip index.
pub const MAX_CHIP: u32 = CHIP_MASK;

/// Number of chips per board addressable by a key.
pub const CHIPS_PER_BOARD: usize = 1 << CHIP_FIELD_BITS;

/// Field selector for [`ChannelKey::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Board,
    Chip,
}

/// Packed (board, chip) identity.
///
/// Ordering follows the packed integer, so keys sort by chip first and by
/// board within a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelKey(u32);

impl ChannelKey {
    /// Pack a board id and chip index.
    ///
    /// # Errors
    /// - `RangeError::ChipOutOfRange` if `chip > MAX_CHIP`
    /// - `RangeError::BoardOutOfRange` if `board > MAX_BOARD`
    pub fn encode(board: u32, chip: u32) -> Result<Self> {
        if chip > MAX_CHIP {
            return Err(RangeError::ChipOutOfRange {
                chip,
                max: MAX_CHIP,
            }
            .into());
        }
        if board > MAX_BOARD {
            return Err(RangeError::BoardOutOfRange {
                board,
                max: MAX_BOARD,
            }
            .into());
        }
        Ok(Self(board | (chip << BOARD_FIELD_BITS)))
    }

    /// Extract one field.
    pub fn decode(self, field: Field) -> u32 {
        match field {
            Field::Board => self.0 & BOARD_MASK,
            Field::Chip => (self.0 >> BOARD_FIELD_BITS) & CHIP_MASK,
        }
    }

    pub fn board(self) -> u32 {
        self.decode(Field::Board)
    }

    pub fn chip(self) -> u32 {
        self.decode(Field::Chip)
    }

    /// The packed integer.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Rebuild a key from its packed integer.
    ///
    /// # Errors
    /// Returns `RangeError::StrayKeyBits` if bits outside both fields are set.
    pub fn from_raw(raw: u32) -> Result<Self> {
        if raw & !KEY_MASK != 0 {
            return Err(RangeError::StrayKeyBits {
                raw,
                mask: KEY_MASK,
            }
            .into());
        }
        Ok(Self(raw))
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.board(), self.chip())
    }
}
