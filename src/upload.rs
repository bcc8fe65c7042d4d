//! Upload of an eVR report to the SMS vulnerability scanner import endpoint.
//!
//! Equivalent to
//! `curl -k -H "X-SMS-API-KEY: <key>" -F "file=@report.csv" "https://<sms>/vulnscanner/import?...&runtime=<ts>/"`.

use std::io::Cursor;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::StatusCode;

use crate::config::SmsSettings;
use crate::data::export::{report_file_name, write_report};
use crate::data::model::ScanModel;
use crate::data::progress::ProgressReader;

const API_KEY_HEADER: &str = "X-SMS-API-KEY";
const VENDOR: &str = "SMS-Standard";
const PRODUCT: &str = "QeVR";
const PRODUCT_VERSION: &str = "1";

#[derive(Debug)]
pub struct SmsUploader {
    client: reqwest::blocking::Client,
    address: String,
    api_key: String,
}

impl SmsUploader {
    pub fn new(settings: &SmsSettings) -> Result<Self> {
        settings.validate()?;
        if settings.ignore_tls_errors {
            log::warn!("TLS certificate errors are ignored for {}", settings.address);
        }
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(settings.ignore_tls_errors)
            .timeout(settings.timeout())
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            address: settings.address.trim().to_string(),
            api_key: settings.api_key.trim().to_string(),
        })
    }

    /// Import endpoint for a report generated at `runtime`.
    pub fn import_url(&self, runtime: DateTime<Utc>) -> String {
        format!(
            "https://{}/vulnscanner/import?vendor={VENDOR}&product={PRODUCT}&version={PRODUCT_VERSION}&runtime={}/",
            self.address,
            runtime.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        )
    }

    /// Serialize `model` and post it as the `file` part of a multipart form.
    ///
    /// `progress` receives the fraction of the report handed to the
    /// transport so far; it reaches 1.0 before the server has answered.
    /// Returns the file name the report was uploaded under.
    pub fn upload<F>(&self, model: &ScanModel, date: NaiveDate, progress: F) -> Result<String>
    where
        F: FnMut(f64) + Send + 'static,
    {
        let mut body = Vec::new();
        write_report(model, &mut body)?;
        let total = body.len() as u64;
        let file_name = report_file_name(date, "");

        let mut tracker = SendProgress::new(total, progress);
        let reader = ProgressReader::new(Cursor::new(body), move |n| tracker.advance(n));
        let part = Part::reader_with_length(reader, total)
            .file_name(file_name.clone())
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let url = self.import_url(Utc::now());
        log::info!("Uploading {file_name} ({total} bytes) to {url}");
        let resp = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .context("failed to send request")?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().context("failed to read response body")?;
            bail!("error code: {}\n{body}", status.as_u16());
        }
        log::info!("{file_name} accepted by {}", self.address);
        Ok(file_name)
    }
}

// ---------------------------------------------------------------------------
// SendProgress – body bytes to fraction complete
// ---------------------------------------------------------------------------

/// Accumulates the byte counts of a body of `total` bytes and reports the
/// fraction handed over so far. Fractions never decrease and stay within
/// `0.0..=1.0`; an empty body reports 1.0.
pub struct SendProgress<F> {
    sent: u64,
    total: u64,
    report: F,
}

impl<F: FnMut(f64)> SendProgress<F> {
    pub fn new(total: u64, report: F) -> Self {
        Self {
            sent: 0,
            total,
            report,
        }
    }

    pub fn advance(&mut self, bytes: usize) {
        self.sent = self.sent.saturating_add(bytes as u64).min(self.total);
        let fraction = self.fraction();
        (self.report)(fraction);
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.sent as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> SmsSettings {
        SmsSettings {
            address: " 10.38.50.89 ".into(),
            api_key: "37F9C284-5A64-4659-A6DC-306E6332DAE5".into(),
            ..SmsSettings::default()
        }
    }

    #[test]
    fn import_url_format() {
        let uploader = SmsUploader::new(&settings()).unwrap();
        let runtime = Utc.with_ymd_and_hms(2018, 12, 15, 13, 1, 15).unwrap()
            + chrono::Duration::milliseconds(255);
        assert_eq!(
            uploader.import_url(runtime),
            "https://10.38.50.89/vulnscanner/import?vendor=SMS-Standard&product=QeVR&version=1&runtime=2018-12-15T13:01:15.255Z/"
        );
    }

    fn fractions_for(body: &[u8], chunk: usize) -> Vec<f64> {
        let mut fractions = Vec::new();
        {
            let mut tracker = SendProgress::new(body.len() as u64, |f| fractions.push(f));
            let mut reader = ProgressReader::new(Cursor::new(body), |n| tracker.advance(n));
            let mut buf = vec![0u8; chunk];
            while std::io::Read::read(&mut reader, &mut buf).unwrap() > 0 {}
        }
        fractions
    }

    #[test]
    fn send_progress_rises_to_one() {
        let fractions = fractions_for(&[b'x'; 1000], 64);
        assert!(fractions.len() > 10);
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fractions.last().copied(), Some(1.0));
    }

    #[test]
    fn empty_body_reports_complete() {
        let fractions = fractions_for(&[], 64);
        assert_eq!(fractions, vec![1.0]);
    }

    #[test]
    fn overcount_is_clamped() {
        let mut last = 0.0;
        let mut tracker = SendProgress::new(10, |f| last = f);
        tracker.advance(8);
        tracker.advance(8);
        assert_eq!(tracker.fraction(), 1.0);
        drop(tracker);
        assert_eq!(last, 1.0);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut bad = settings();
        bad.api_key = "abcd".into();
        assert!(SmsUploader::new(&bad).is_err());

        let mut bad = settings();
        bad.address = "  ".into();
        assert!(SmsUploader::new(&bad).is_err());
    }
}
