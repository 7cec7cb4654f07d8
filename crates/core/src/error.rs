//! Error types for the PCN error map.
//!
//! All operations return structured errors rather than panicking. The
//! core never recovers from these itself: a malformed record is an input
//! problem, so the caller decides whether to skip it or abort the run.

use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Format: bit strings that are not exactly eight `0`/`1` characters
/// - Range: numeric input wider than the field it is stored in
/// - Record: a row of an error dump that cannot be turned into an observation
/// - I/O: file system operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed bit-string input
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Numeric input outside its declared width
    #[error("range error: {0}")]
    Range(#[from] RangeError),

    /// Unusable row in an error dump
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Bit-string parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Bit string is not exactly eight characters long
    #[error("bit string {input:?} has length {length}, expected 8")]
    WrongLength { input: String, length: usize },

    /// Bit string contains something other than '0' or '1'
    #[error("bit string {input:?} has invalid character {found:?} at index {index}")]
    InvalidCharacter {
        input: String,
        index: usize,
        found: char,
    },
}

/// Out-of-range numeric input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Value does not fit in an 8-bit register
    #[error("{field} value {value} does not fit in 8 bits")]
    ValueTooWide { field: &'static str, value: u32 },

    /// Chip index exceeds the chip field of a channel key
    #[error("chip index {chip} exceeds maximum {max}")]
    ChipOutOfRange { chip: u32, max: u32 },

    /// Board id exceeds the board field of a channel key
    #[error("board id {board} exceeds maximum {max}")]
    BoardOutOfRange { board: u32, max: u32 },

    /// Raw channel key has bits set outside the board and chip fields
    #[error("raw channel key {raw:#x} has bits outside {mask:#x}")]
    StrayKeyBits { raw: u32, mask: u32 },
}

/// Errors turning one row of an error dump into an observation.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Table header lacks a column the ingestion needs
    #[error("line {line}: header has no {column:?} column")]
    MissingColumn { line: usize, column: &'static str },

    /// Table row is not valid UTF-8
    #[error("line {line}: table row is not valid UTF-8")]
    InvalidUtf8 { line: usize },

    /// Data row appeared before any header row
    #[error("line {line}: data row before table header")]
    RowBeforeHeader { line: usize },

    /// Row has fewer cells than the header
    #[error("line {line}: expected at least {expected} cells, got {actual}")]
    ShortRow {
        line: usize,
        expected: usize,
        actual: usize,
    },

    /// Cell that should hold an integer does not
    #[error("line {line}: column {column:?} holds {value:?}, not an unsigned integer")]
    InvalidInteger {
        line: usize,
        column: &'static str,
        value: String,
    },

    /// Row parsed but its contents are invalid
    #[error("line {line}: {source}")]
    Invalid {
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

impl RecordError {
    /// 1-based line of the offending row.
    pub fn line(&self) -> usize {
        match self {
            RecordError::MissingColumn { line, .. }
            | RecordError::InvalidUtf8 { line }
            | RecordError::RowBeforeHeader { line }
            | RecordError::ShortRow { line, .. }
            | RecordError::InvalidInteger { line, .. }
            | RecordError::Invalid { line, .. } => *line,
        }
    }

    /// True when the row was a table header rather than a record.
    pub fn is_header(&self) -> bool {
        matches!(self, RecordError::MissingColumn { .. })
    }
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
