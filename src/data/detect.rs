use std::io::Read;

use csv::ByteRecord;
use regex::Regex;

use crate::error::{QevrError, Result};

/// Dotted-quad IPv4 address.
pub const IP_ADDRESS: &str = r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)(\.|$)){4}$";
/// MITRE CVE identifier.
pub const CVE_ID: &str = r"^CVE-\d{4}-\d{4,7}$";
/// Records read from the top of the file when detecting columns (header included).
pub const SAMPLE_LINES: usize = 10;

// ---------------------------------------------------------------------------
// ColumnClassification – result of detection
// ---------------------------------------------------------------------------

/// Which columns carry the address and the vulnerability id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnClassification {
    pub address: usize,
    pub identifier: usize,
    /// First record of the source is a header and carries no data.
    pub has_header: bool,
}

impl ColumnClassification {
    /// Minimum number of fields a record needs to yield a value for both columns.
    pub fn min_fields(&self) -> usize {
        self.address.max(self.identifier) + 1
    }
}

// ---------------------------------------------------------------------------
// ColumnPatterns – the two cell shapes detection looks for
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ColumnPatterns {
    pub address: Regex,
    pub identifier: Regex,
}

impl ColumnPatterns {
    pub fn new(address: &str, identifier: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            address: Regex::new(address)?,
            identifier: Regex::new(identifier)?,
        })
    }
}

impl Default for ColumnPatterns {
    fn default() -> Self {
        Self::new(IP_ADDRESS, CVE_ID).expect("built-in patterns are valid")
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Read up to `sample_lines` records from `reader`, dropping the first one
/// when `has_header` is set. Records are kept as raw bytes, so a column in
/// some other encoding does not stop detection.
///
/// Fails when nothing is left after the header skip.
pub fn sample_records<R: Read>(
    reader: R,
    sample_lines: usize,
    has_header: bool,
    source_name: &str,
) -> Result<Vec<ByteRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::with_capacity(sample_lines);
    let mut record = ByteRecord::new();
    for i in 0..sample_lines {
        let more = csv_reader
            .read_byte_record(&mut record)
            .map_err(|source| QevrError::Parse {
                source_name: source_name.to_string(),
                source,
            })?;
        if !more {
            break;
        }
        if i == 0 && has_header {
            continue;
        }
        records.push(record.clone());
    }

    if records.is_empty() {
        return Err(QevrError::NoData {
            source_name: source_name.to_string(),
        });
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Pick the address column and the identifier column of `records`.
///
/// Every cell matching a pattern scores one hit for its column; the column
/// with the most hits wins, and on equal counts the lowest index wins.
/// Cells that are not valid UTF-8 are matched on their lossy decoding.
pub fn detect_columns(
    records: &[ByteRecord],
    patterns: &ColumnPatterns,
    source_name: &str,
) -> Result<(usize, usize)> {
    let mut address_hits: Vec<usize> = Vec::new();
    let mut identifier_hits: Vec<usize> = Vec::new();

    for record in records {
        if record.len() > address_hits.len() {
            address_hits.resize(record.len(), 0);
            identifier_hits.resize(record.len(), 0);
        }
        for (col, cell) in record.iter().enumerate() {
            let cell = String::from_utf8_lossy(cell);
            if patterns.address.is_match(&cell) {
                address_hits[col] += 1;
            }
            if patterns.identifier.is_match(&cell) {
                identifier_hits[col] += 1;
            }
        }
    }

    let not_found = |pattern: &Regex| QevrError::PatternNotFound {
        source_name: source_name.to_string(),
        pattern: pattern.as_str().to_string(),
    };
    let address = best_column(&address_hits).ok_or_else(|| not_found(&patterns.address))?;
    let identifier =
        best_column(&identifier_hits).ok_or_else(|| not_found(&patterns.identifier))?;
    Ok((address, identifier))
}

/// Index of the highest non-zero count, lowest index first on ties.
fn best_column(hits: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (col, &count) in hits.iter().enumerate() {
        if count == 0 {
            continue;
        }
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((col, count)),
        }
    }
    best.map(|(col, _)| col)
}
