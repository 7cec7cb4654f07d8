//! Ingestion of PCN error dumps.
//!
//! Error dumps are org-mode tables, one row per error report:
//!
//! ```text
//! | runNo | eventID | tell1 | ExpPCN | Beetle | expbits  | badbits  |
//! |-------+---------+-------+--------+--------+----------+----------|
//! |  1234 |   56789 |     3 |    176 |      2 | 10110000 | 00000001 |
//! ```
//!
//! # Parsing rules
//!
//! - Lines not starting with `|` are ignored, as are separator rules
//! - A row naming the board and chip columns is a header; it fixes the
//!   column layout for the rows that follow (a new header may appear later)
//! - Header names are matched case-insensitively with whitespace removed
//! - Whitespace inside data cells is removed before parsing
//!
//! # Malformed records
//!
//! The reader yields one `Result` per data row. [`ingest`] applies a
//! [`MalformedPolicy`]: skip and count, or abort the run. A table row that
//! is not valid UTF-8 is a malformed record like any other; only a failing
//! read ends the run regardless of policy.

use pcnmap_core::bitdiag::BitKind;
use pcnmap_core::{Error, ErrorAggregator, ErrorRecord, IngestMetrics, RecordError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// What to do with a row that can not be turned into an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Log, count, continue
    Skip,
    /// Stop at the first malformed row
    Abort,
}

/// A record with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: usize,
    pub record: ErrorRecord,
}

/// Column positions taken from a header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    board: usize,
    chip: usize,
    expected: usize,
    diff: usize,
    run: Option<usize>,
    event: Option<usize>,
}

impl Columns {
    const BOARD: &'static [&'static str] = &["tell1", "tell1id", "board"];
    const CHIP: &'static [&'static str] = &["beetle", "beetleno", "chip"];
    const EXPECTED: &'static [&'static str] = &["expbits", "expectedbits"];
    const DIFF: &'static [&'static str] = &["badbits", "diffbits", "xorbits"];
    const RUN: &'static [&'static str] = &["runno", "run"];
    const EVENT: &'static [&'static str] = &["eventid", "event"];

    fn is_header(cells: &[String]) -> bool {
        let names: Vec<_> = cells.iter().map(|c| normalize(c).to_lowercase()).collect();
        find(&names, Self::BOARD).is_some() && find(&names, Self::CHIP).is_some()
    }

    fn from_header(cells: &[String], line: usize) -> std::result::Result<Self, RecordError> {
        let names: Vec<_> = cells.iter().map(|c| normalize(c).to_lowercase()).collect();
        let required = |aliases: &'static [&'static str], column: &'static str| {
            find(&names, aliases).ok_or(RecordError::MissingColumn { line, column })
        };
        Ok(Self {
            board: required(Self::BOARD, "tell1")?,
            chip: required(Self::CHIP, "Beetle")?,
            expected: required(Self::EXPECTED, "expbits")?,
            diff: required(Self::DIFF, "badbits")?,
            run: find(&names, Self::RUN),
            event: find(&names, Self::EVENT),
        })
    }

    fn width(&self) -> usize {
        [self.board, self.chip, self.expected, self.diff]
            .into_iter()
            .chain(self.run)
            .chain(self.event)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn record(&self, cells: &[String], line: usize) -> std::result::Result<ErrorRecord, RecordError> {
        if cells.len() < self.width() {
            return Err(RecordError::ShortRow {
                line,
                expected: self.width(),
                actual: cells.len(),
            });
        }
        let optional = |index: Option<usize>, column| {
            index
                .map(|i| parse_uint::<u64>(&cells[i], column, line))
                .transpose()
        };
        Ok(ErrorRecord {
            run: optional(self.run, "runNo")?,
            event: optional(self.event, "eventID")?,
            board: parse_uint(&cells[self.board], "tell1", line)?,
            chip: parse_uint(&cells[self.chip], "Beetle", line)?,
            expected_bits: normalize(&cells[self.expected]),
            diff_bits: normalize(&cells[self.diff]),
        })
    }
}

fn find(names: &[String], aliases: &[&str]) -> Option<usize> {
    names.iter().position(|n| aliases.contains(&n.as_str()))
}

fn normalize(cell: &str) -> String {
    cell.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_uint<T: std::str::FromStr>(
    cell: &str,
    column: &'static str,
    line: usize,
) -> std::result::Result<T, RecordError> {
    let value = normalize(cell);
    value
        .parse()
        .map_err(|_| RecordError::InvalidInteger { line, column, value })
}

/// Split a table line into trimmed cells, or None for non-table lines and
/// separator rules.
fn split_row(line: &str) -> Option<Vec<String>> {
    let body = line.trim().strip_prefix('|')?;
    if body.chars().all(|c| matches!(c, '-' | '+' | '|' | ' ')) {
        return None;
    }
    let body = body.strip_suffix('|').unwrap_or(body);
    Some(body.split('|').map(|c| c.trim().to_string()).collect())
}

/// Iterator over the data rows of an org-table dump.
pub struct TableReader<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
    columns: Option<Columns>,
}

impl<R: BufRead> TableReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
            columns: None,
        }
    }

    /// Read the next raw line into `buf`, returning its length without the
    /// line terminator. `Ok(None)` at EOF.
    fn next_line(&mut self) -> std::io::Result<Option<usize>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        let mut len = self.buf.len();
        if self.buf[..len].ends_with(b"\n") {
            len -= 1;
        }
        if self.buf[..len].ends_with(b"\r") {
            len -= 1;
        }
        Ok(Some(len))
    }
}

impl TableReader<BufReader<File>> {
    /// Open a dump on disk.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Iterator for TableReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let len = match self.next_line() {
                Ok(Some(len)) => len,
                Ok(None) => return None,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            let line = self.line;
            let bytes = &self.buf[..len];

            let text = match std::str::from_utf8(bytes) {
                Ok(text) => text,
                // Undecodable bytes outside the table are ignored like any
                // other prose
                Err(_) => match split_row(&String::from_utf8_lossy(bytes)) {
                    Some(_) => return Some(Err(RecordError::InvalidUtf8 { line }.into())),
                    None => continue,
                },
            };

            let Some(cells) = split_row(text) else {
                continue;
            };

            if Columns::is_header(&cells) {
                match Columns::from_header(&cells, line) {
                    Ok(columns) => {
                        tracing::debug!(line, ?columns, "table header");
                        self.columns = Some(columns);
                        continue;
                    }
                    Err(e) => {
                        self.columns = None;
                        return Some(Err(e.into()));
                    }
                }
            }

            let result = match &self.columns {
                Some(columns) => columns.record(&cells, line),
                None => Err(RecordError::RowBeforeHeader { line }),
            };
            return Some(
                result
                    .map(|record| Row { line, record })
                    .map_err(Error::from),
            );
        }
    }
}

/// Feed rows into `aggregator`, updating `metrics`.
///
/// Record-level problems (bad rows, bad bit strings, out-of-range channels)
/// follow `policy`; I/O errors always abort. A rejected header is counted
/// in `headers_rejected`, not as a record.
pub fn ingest<I>(
    rows: I,
    aggregator: &mut ErrorAggregator,
    policy: MalformedPolicy,
    metrics: &mut IngestMetrics,
) -> Result<()>
where
    I: IntoIterator<Item = Result<Row>>,
{
    for item in rows {
        let row = match item {
            Ok(row) => row,
            Err(Error::Record(e)) => {
                reject(e, policy, metrics)?;
                continue;
            }
            Err(other) => return Err(other),
        };

        match row.record.fill_into(aggregator) {
            Ok((diag, recorded)) => {
                metrics.records_read += 1;
                if recorded {
                    metrics.errors_aggregated += 1;
                    metrics.bit_errors += u64::from(diag.bits(BitKind::Diff).count_ones());
                } else {
                    metrics.records_agreeing += 1;
                }
                tracing::debug!(
                    line = row.line,
                    board = row.record.board,
                    chip = row.record.chip,
                    recorded,
                    "PCN record"
                );
            }
            Err(e @ (Error::Format(_) | Error::Range(_))) => {
                let e = RecordError::Invalid {
                    line: row.line,
                    source: Box::new(e),
                };
                reject(e, policy, metrics)?;
            }
            Err(other) => return Err(other),
        }
    }

    tracing::info!(
        read = metrics.records_read,
        malformed = metrics.records_malformed,
        errors = metrics.errors_aggregated,
        channels = aggregator.channel_count(),
        "ingestion finished"
    );
    Ok(())
}

/// Count a rejected row and apply `policy` to it.
fn reject(e: RecordError, policy: MalformedPolicy, metrics: &mut IngestMetrics) -> Result<()> {
    if e.is_header() {
        metrics.headers_rejected += 1;
    } else {
        metrics.records_read += 1;
        metrics.records_malformed += 1;
    }
    match policy {
        MalformedPolicy::Skip => {
            tracing::warn!(line = e.line(), error = %e, "skipping malformed PCN record");
            Ok(())
        }
        MalformedPolicy::Abort => Err(e.into()),
    }
}

/// Read and aggregate a dump on disk.
pub fn ingest_file(
    path: &Path,
    aggregator: &mut ErrorAggregator,
    policy: MalformedPolicy,
    metrics: &mut IngestMetrics,
) -> Result<()> {
    tracing::info!(path = %path.display(), "reading PCN error dump");
    ingest(TableReader::open(path)?, aggregator, policy, metrics)
}
