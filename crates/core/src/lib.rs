//! pcnmap-core: diagnosis and aggregation of PCN bit errors
//!
//! Readout chips (Beetles) on readout boards (TELL1s) report the PCN value
//! they expected together with an XOR pattern against what they received.
//! This library turns each report into a bit-level diagnosis and
//! accumulates the diagnoses per channel across an event stream.
//!
//! # Architecture
//!
//! - `bitdiag`: one observation as expected/diff/observed bit patterns
//! - `channel`: bijective packing of (board, chip) into a dense key
//! - `aggregator`: per-channel error counts and bit distributions
//! - `record`: the raw row an ingestion source hands over
//! - `metrics`: counters for one ingestion run
//!
//! # Design Principles
//!
//! - **No panics**: malformed input comes back as a structured error
//! - **Sparse**: agreement observations are dropped, only errors are kept
//! - **Deterministic**: iteration order is fixed by the channel key order
//!
//! # Example
//! ```
//! use pcnmap_core::{BitDiagnostic, ChannelKey, ErrorAggregator};
//!
//! let mut agg = ErrorAggregator::new(128);
//! let diag = BitDiagnostic::from_bit_strings("10110000", "00000001").unwrap();
//! agg.fill(3, 2, diag).unwrap();
//!
//! let key = ChannelKey::encode(3, 2).unwrap();
//! assert_eq!(agg.error_count(key), 1);
//! assert_eq!(agg.distribution_for(key).unwrap().count(7, false), 1);
//! ```

pub mod aggregator;
pub mod bitdiag;
pub mod channel;
pub mod error;
pub mod metrics;
pub mod record;

// Re-export commonly used types
pub use aggregator::{BitDistribution, ErrorAggregator};
pub use bitdiag::{BitDiagnostic, BitKind, BitPattern};
pub use channel::{ChannelKey, Field};
pub use error::{Error, FormatError, RangeError, RecordError, Result};
pub use metrics::IngestMetrics;
pub use record::ErrorRecord;
