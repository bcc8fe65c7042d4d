use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator};

use super::model::ScanModel;
use crate::error::{QevrError, Result};

pub const HEADER: &str = "IP_ADDRESS,CVE_IDS,SEVERITY\n";
/// Severity reported for every record.
pub const SEVERITY: &str = "MEDIUM";

// ---------------------------------------------------------------------------
// eVR report writer
// ---------------------------------------------------------------------------

/// Write `model` as an eVR CSV report to `sink`.
///
/// Each address produces one record per batch of at most
/// `model.max_per_record()` identifiers. A failed write leaves whatever was
/// already written in place; the destination should be discarded.
pub fn write_report<W: Write>(model: &ScanModel, mut sink: W) -> Result<()> {
    sink.write_all(HEADER.as_bytes()).map_err(QevrError::Sink)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(sink);

    let max = model.max_per_record();
    for (address, identifiers) in model.iter() {
        let mut batch: Vec<&str> = Vec::with_capacity(max.min(identifiers.len()));
        for id in identifiers {
            batch.push(id);
            if batch.len() == max {
                write_record(&mut writer, address, &batch)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            write_record(&mut writer, address, &batch)?;
        }
    }

    writer.flush().map_err(QevrError::Sink)
}

fn write_record<W: Write>(
    writer: &mut csv::Writer<W>,
    address: &str,
    batch: &[&str],
) -> Result<()> {
    let ids = batch.join(",");
    writer
        .write_record([address, ids.as_str(), SEVERITY])
        .map_err(|e| QevrError::Sink(io::Error::from(e)))
}

/// Write the report to a new file at `path`, replacing any existing file.
pub fn save_to_file(model: &ScanModel, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|source| QevrError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    write_report(model, BufWriter::new(file))?;
    log::info!("Saved {} to {}", model.final_status(), path.display());
    Ok(())
}

/// `qevr_<YYYYMMDD>[_<suffix>].csv`
pub fn report_file_name(date: NaiveDate, suffix: &str) -> String {
    let suffix = suffix.trim();
    if suffix.is_empty() {
        format!("qevr_{}.csv", date.format("%Y%m%d"))
    } else {
        format!("qevr_{}_{suffix}.csv", date.format("%Y%m%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn render(model: &ScanModel) -> String {
        let mut out = Vec::new();
        write_report(model, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn single_pair() {
        let mut m = ScanModel::new();
        m.add("1.1.1.1", "CVE-1-1");
        assert_eq!(
            render(&m),
            "IP_ADDRESS,CVE_IDS,SEVERITY\n\"1.1.1.1\",\"CVE-1-1\",\"MEDIUM\"\n"
        );
    }

    #[test]
    fn repeated_pair_gives_one_line() {
        let mut m = ScanModel::new();
        m.add("1.1.1.1", "CVE-1-1");
        m.add("1.1.1.1", "CVE-1-1");
        assert_eq!(
            render(&m),
            "IP_ADDRESS,CVE_IDS,SEVERITY\n\"1.1.1.1\",\"CVE-1-1\",\"MEDIUM\"\n"
        );
    }

    #[test]
    fn identifiers_for_one_address_are_combined() {
        let mut m = ScanModel::new();
        m.add("1.1.1.1", "CVE-1-1");
        m.add("1.1.1.1", "CVE-1-2");
        let out = render(&m);
        let one = "IP_ADDRESS,CVE_IDS,SEVERITY\n\"1.1.1.1\",\"CVE-1-1,CVE-1-2\",\"MEDIUM\"\n";
        let two = "IP_ADDRESS,CVE_IDS,SEVERITY\n\"1.1.1.1\",\"CVE-1-2,CVE-1-1\",\"MEDIUM\"\n";
        assert!(out == one || out == two, "{out}");
    }

    #[test]
    fn identifiers_split_at_max_per_record() {
        let mut m = ScanModel::new().with_max_per_record(1);
        m.add("1.1.1.1", "CVE-1-1");
        m.add("1.1.1.1", "CVE-1-2");
        let out = render(&m);
        let one = "IP_ADDRESS,CVE_IDS,SEVERITY\n\
                   \"1.1.1.1\",\"CVE-1-1\",\"MEDIUM\"\n\
                   \"1.1.1.1\",\"CVE-1-2\",\"MEDIUM\"\n";
        let two = "IP_ADDRESS,CVE_IDS,SEVERITY\n\
                   \"1.1.1.1\",\"CVE-1-2\",\"MEDIUM\"\n\
                   \"1.1.1.1\",\"CVE-1-1\",\"MEDIUM\"\n";
        assert!(out == one || out == two, "{out}");
    }

    #[test]
    fn last_batch_may_be_short() {
        let mut m = ScanModel::new().with_max_per_record(2);
        for i in 0..5 {
            m.add("10.0.0.1", &format!("CVE-2020-000{i}"));
        }
        let out = render(&m);
        let mut sizes: Vec<usize> = out
            .lines()
            .skip(1)
            .map(|line| line.matches("CVE-").count())
            .collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2, 2]);
    }

    #[test]
    fn empty_model_writes_header_only() {
        assert_eq!(render(&ScanModel::new()), HEADER);
    }

    #[test]
    fn rendering_twice_is_stable() {
        let mut m = ScanModel::new().with_max_per_record(3);
        for ip in ["1.1.1.1", "2.2.2.2", "3.3.3.3"] {
            for i in 0..7 {
                m.add(ip, &format!("CVE-2021-{i:04}"));
            }
        }
        assert_eq!(render(&m), render(&m));
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        let mut m = ScanModel::new();
        m.add("1.1.1.1", "CVE\"X");
        assert!(render(&m).ends_with("\"1.1.1.1\",\"CVE\"\"X\",\"MEDIUM\"\n"));
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_failure_is_reported() {
        let mut m = ScanModel::new();
        m.add("1.1.1.1", "CVE-1-1");
        let err = write_report(&m, FailingSink).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sink);
    }

    #[test]
    fn file_names() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(report_file_name(date, ""), "qevr_20240307.csv");
        assert_eq!(report_file_name(date, " dmz "), "qevr_20240307_dmz.csv");
    }

    #[test]
    fn save_to_file_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut m = ScanModel::new();
        m.add("1.1.1.1", "CVE-1-1");
        save_to_file(&m, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(HEADER));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn uncreatable_output_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = save_to_file(&ScanModel::new(), &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sink);
        assert!(matches!(err, QevrError::Create { .. }));
        assert!(!path.exists());
    }
}
