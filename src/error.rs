//! Errors raised by the scan-processing core.

use std::io;
use std::path::PathBuf;

pub type Result<T, E = QevrError> = std::result::Result<T, E>;

/// Broad failure classes, used by front ends to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Column detection could not classify the source.
    Detection,
    /// Ingestion was attempted before detection succeeded.
    Precheck,
    /// The source could not be opened or contains a malformed row.
    Parse,
    /// A network range in the filter list is malformed.
    FilterConfig,
    /// The output destination could not be created or rejected a write.
    Sink,
}

#[derive(Debug, thiserror::Error)]
pub enum QevrError {
    #[error("{source_name}: \"{pattern}\" not found")]
    PatternNotFound { source_name: String, pattern: String },

    #[error("{source_name}: no data found in the file")]
    NoData { source_name: String },

    #[error("{source_name}: columns are not detected yet")]
    DetectionNotRun { source_name: String },

    #[error("{}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{source_name}: error reading CSV: {source}")]
    Parse {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: \"{text}\" is not a valid network")]
    MalformedRange {
        line: usize,
        text: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("{}: cannot create report: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error writing report: {0}")]
    Sink(#[source] io::Error),
}

impl QevrError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QevrError::PatternNotFound { .. } | QevrError::NoData { .. } => ErrorKind::Detection,
            QevrError::DetectionNotRun { .. } => ErrorKind::Precheck,
            QevrError::Open { .. } | QevrError::Parse { .. } => ErrorKind::Parse,
            QevrError::MalformedRange { .. } => ErrorKind::FilterConfig,
            QevrError::Create { .. } | QevrError::Sink(_) => ErrorKind::Sink,
        }
    }
}
