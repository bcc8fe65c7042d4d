use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::ByteRecord;

use super::detect::{
    detect_columns, sample_records, ColumnClassification, ColumnPatterns, SAMPLE_LINES,
};
use super::progress::ProgressReader;
use crate::error::{QevrError, Result};

// ---------------------------------------------------------------------------
// CsvSource – one scan export on disk
// ---------------------------------------------------------------------------

/// A scan export file. Columns must be detected with [`CsvSource::detect`]
/// before the file can be loaded.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    has_header: bool,
    columns: Option<ColumnClassification>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            has_header: true,
            columns: None,
        }
    }

    /// Whether the first record is a header row (default: yes).
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self.columns = None;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detected columns, `None` until [`CsvSource::detect`] succeeds.
    pub fn columns(&self) -> Option<ColumnClassification> {
        self.columns
    }

    /// Sample the top of the file and work out which columns hold the
    /// address and the vulnerability id. A failed detection clears any
    /// earlier result.
    pub fn detect(&mut self, patterns: &ColumnPatterns) -> Result<ColumnClassification> {
        self.columns = None;
        let file = self.open()?;
        let name = self.source_name();
        let records = sample_records(file, SAMPLE_LINES, self.has_header, &name)?;
        let (address, identifier) = detect_columns(&records, patterns, &name)?;
        let columns = ColumnClassification {
            address,
            identifier,
            has_header: self.has_header,
        };
        log::info!("{name}: address column {address}, CVE column {identifier}");
        self.columns = Some(columns);
        Ok(columns)
    }

    /// Stream the whole file, calling `progress` with the byte count of every
    /// read and `callback` with `(address, identifier)` for every data row.
    pub fn load<P, C>(&self, progress: P, callback: C) -> Result<()>
    where
        P: FnMut(usize),
        C: FnMut(&str, &str),
    {
        let name = self.source_name();
        let columns = self.columns.ok_or_else(|| QevrError::DetectionNotRun {
            source_name: name.clone(),
        })?;
        let file = self.open()?;
        read_records(ProgressReader::new(file, progress), columns, &name, callback)
    }

    fn open(&self) -> Result<File> {
        File::open(&self.path).map_err(|source| QevrError::Open {
            path: self.path.clone(),
            source,
        })
    }

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Record streaming
// ---------------------------------------------------------------------------

/// Feed `(address, identifier)` of every data row in `reader` to `callback`.
///
/// Rows too short to reach both columns are skipped, as are rows whose
/// address or identifier cell is not valid UTF-8. Other columns are never
/// decoded. A read failure aborts the pass.
pub fn read_records<R, C>(
    reader: R,
    columns: ColumnClassification,
    source_name: &str,
    mut callback: C,
) -> Result<()>
where
    R: Read,
    C: FnMut(&str, &str),
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let min_fields = columns.min_fields();
    let mut record = ByteRecord::new();
    let mut first = true;
    let mut skipped = 0usize;
    let mut undecodable = 0usize;

    loop {
        let more = csv_reader
            .read_byte_record(&mut record)
            .map_err(|source| QevrError::Parse {
                source_name: source_name.to_string(),
                source,
            })?;
        if !more {
            break;
        }
        if first {
            first = false;
            if columns.has_header {
                continue;
            }
        }
        if record.len() < min_fields {
            skipped += 1;
            continue;
        }
        let address = std::str::from_utf8(&record[columns.address]);
        let identifier = std::str::from_utf8(&record[columns.identifier]);
        match (address, identifier) {
            (Ok(address), Ok(identifier)) => callback(address, identifier),
            _ => undecodable += 1,
        }
    }

    if skipped > 0 {
        log::debug!("{source_name}: skipped {skipped} short rows");
    }
    if undecodable > 0 {
        log::warn!("{source_name}: skipped {undecodable} rows with non UTF-8 address or CVE id");
    }
    Ok(())
}

/// Size of the file at `path` in bytes, used to turn read progress into a fraction.
pub fn file_size(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| QevrError::Open {
            path: path.to_path_buf(),
            source,
        })
}
