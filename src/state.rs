use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use anyhow::{bail, Result};
use chrono::Local;

use qevr::config::{Config, Target};
use qevr::data::detect::ColumnPatterns;
use qevr::data::export::{report_file_name, save_to_file};
use qevr::data::filter::AddressFilter;
use qevr::data::loader::{file_size, CsvSource};
use qevr::data::model::ScanModel;
use qevr::upload::SmsUploader;

// ---------------------------------------------------------------------------
// Wizard pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Intro,
    Source,
    Filter,
    Load,
    Target,
    Output,
    Sms,
    Upload,
    Finish,
}

impl Page {
    pub fn title(self) -> &'static str {
        match self {
            Page::Intro => "Intro",
            Page::Source => "Source",
            Page::Filter => "Filter",
            Page::Load => "Load",
            Page::Target => "Target",
            Page::Output => "Save",
            Page::Sms => "SMS",
            Page::Upload => "Upload",
            Page::Finish => "Finish",
        }
    }

    /// Page that follows `self`, `None` after the last one.
    pub fn next(self, target: Target) -> Option<Page> {
        match self {
            Page::Intro => Some(Page::Source),
            Page::Source => Some(Page::Filter),
            Page::Filter => Some(Page::Load),
            Page::Load => Some(Page::Target),
            Page::Target => match target {
                Target::File => Some(Page::Output),
                Target::Sms => Some(Page::Sms),
            },
            Page::Output => Some(Page::Finish),
            Page::Sms => Some(Page::Upload),
            Page::Upload => Some(Page::Finish),
            Page::Finish => None,
        }
    }

    /// Every page from Intro to Finish for the chosen target.
    pub fn route(target: Target) -> Vec<Page> {
        let mut pages = vec![Page::Intro];
        let mut page = Page::Intro;
        while let Some(next) = page.next(target) {
            pages.push(next);
            page = next;
        }
        pages
    }
}

// ---------------------------------------------------------------------------
// Background jobs
// ---------------------------------------------------------------------------

/// Atomic progress tracking shared with the worker thread.
#[derive(Default)]
pub struct JobProgress {
    pub bytes_read: AtomicU64,
    pub bytes_total: AtomicU64,
    pub addresses: AtomicUsize,
    upload_fraction: AtomicU64,
}

impl JobProgress {
    pub fn read_fraction(&self) -> f32 {
        let total = self.bytes_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let read = self.bytes_read.load(Ordering::Relaxed);
        (read as f64 / total as f64).min(1.0) as f32
    }

    pub fn upload_fraction(&self) -> f32 {
        f64::from_bits(self.upload_fraction.load(Ordering::Relaxed)) as f32
    }

    fn set_upload_fraction(&self, fraction: f64) {
        self.upload_fraction.store(fraction.to_bits(), Ordering::Relaxed);
    }
}

enum JobOutcome {
    Loaded(ScanModel),
    Uploaded(String),
    Failed(String),
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full wizard state, independent of rendering.
pub struct AppState {
    pub config: Config,
    /// Where the configuration is saved on exit; `None` disables saving.
    config_path: Option<PathBuf>,

    pub page: Page,
    history: Vec<Page>,

    /// Editable source path.
    pub source_text: String,
    /// Editable network list, one per line.
    pub networks_text: String,

    source: Option<CsvSource>,
    filter: AddressFilter,
    /// Aggregate from the last completed load.
    pub model: Option<Arc<ScanModel>>,
    /// File name of the last successful upload.
    pub uploaded_as: Option<String>,

    pub progress: Arc<JobProgress>,
    job_rx: Option<mpsc::Receiver<JobOutcome>>,

    /// Status line of the current page.
    pub status_message: String,
    /// Error from the last action, shown in the navigation bar.
    pub error_message: Option<String>,
    pub quit_requested: bool,
}

impl AppState {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        let source_text = config.source.clone();
        let networks_text = config.filter.networks.join("\n");
        Self {
            config,
            config_path,
            page: Page::Intro,
            history: Vec::new(),
            source_text,
            networks_text,
            source: None,
            filter: AddressFilter::default(),
            model: None,
            uploaded_as: None,
            progress: Arc::new(JobProgress::default()),
            job_rx: None,
            status_message: String::new(),
            error_message: None,
            quit_requested: false,
        }
    }

    /// A load or upload is running.
    pub fn busy(&self) -> bool {
        self.job_rx.is_some()
    }

    pub fn is_last_page(&self) -> bool {
        self.page.next(self.config.output.target).is_none()
    }

    /// Collect the current page's input and move to the next page.
    pub fn go_next(&mut self) {
        if self.busy() {
            return;
        }
        log::info!("Next from page {:?}", self.page);
        if let Err(e) = self.acquire() {
            log::error!("{:?}: {e:#}", self.page);
            self.error_message = Some(format!("{e:#}"));
            return;
        }
        self.error_message = None;
        match self.page.next(self.config.output.target) {
            Some(next) => {
                self.history.push(self.page);
                self.page = next;
                self.enter();
            }
            None => self.quit_requested = true,
        }
    }

    pub fn go_back(&mut self) {
        if self.busy() {
            return;
        }
        if let Some(previous) = self.history.pop() {
            log::info!("Back from page {:?} to {:?}", self.page, previous);
            self.page = previous;
            self.error_message = None;
        }
    }

    /// Pick up the result of a finished background job. Called each frame.
    pub fn poll(&mut self) {
        let Some(rx) = &self.job_rx else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(mpsc::TryRecvError::Empty) => return,
            Err(mpsc::TryRecvError::Disconnected) => {
                JobOutcome::Failed("worker thread stopped unexpectedly".into())
            }
        };
        self.job_rx = None;
        match outcome {
            JobOutcome::Loaded(model) => {
                self.status_message = model.final_status();
                log::info!("{}", self.status_message);
                self.model = Some(Arc::new(model));
            }
            JobOutcome::Uploaded(file_name) => {
                self.status_message = format!(
                    "Vulnerability scan report successfully uploaded as {file_name}\n\
                     Go to SMS console → Profiles → Vulnerability Scans (eVR)"
                );
                self.uploaded_as = Some(file_name);
            }
            JobOutcome::Failed(msg) => {
                log::error!("{msg}");
                self.status_message = "Failed".into();
                self.error_message = Some(msg);
            }
        }
    }

    /// Status line for the load page.
    pub fn load_status(&self) -> String {
        if self.busy() {
            format!(
                "Loaded {} addresses",
                self.progress.addresses.load(Ordering::Relaxed)
            )
        } else {
            self.status_message.clone()
        }
    }

    // -- page transitions --

    fn acquire(&mut self) -> Result<()> {
        match self.page {
            Page::Intro | Page::Target => {}
            Page::Source => {
                let path = self.source_text.trim().to_string();
                if path.is_empty() {
                    bail!("Select the scan CSV file");
                }
                let mut source = CsvSource::new(&path).with_header(self.config.has_header);
                source.detect(&ColumnPatterns::default())?;
                self.config.source = path;
                self.source = Some(source);
            }
            Page::Filter => {
                self.filter = AddressFilter::parse(self.config.filter.mode, &self.networks_text)?;
                self.config.filter.networks = self.filter.raw_lines().to_vec();
                let max = &mut self.config.output.max_cves_per_record;
                *max = (*max).max(1);
            }
            Page::Load => {
                if self.model.is_none() {
                    bail!("The scan file is not loaded");
                }
            }
            Page::Output => {
                let model = self.loaded_model()?;
                let file = &mut self.config.output.file;
                file.folder = file.folder.trim().to_string();
                file.suffix = file.suffix.trim().to_string();
                let path = Path::new(&file.folder)
                    .join(report_file_name(Local::now().date_naive(), &file.suffix));
                save_to_file(&model, &path)?;
                self.status_message =
                    format!("{} saved to {}", model.final_status(), path.display());
            }
            Page::Sms => {
                let sms = &mut self.config.output.sms;
                sms.address = sms.address.trim().to_string();
                sms.api_key = sms.api_key.trim().to_string();
                sms.validate()?;
            }
            Page::Upload => {
                if self.uploaded_as.is_none() {
                    bail!("The report is not uploaded");
                }
            }
            Page::Finish => self.save_config()?,
        }
        Ok(())
    }

    fn enter(&mut self) {
        match self.page {
            Page::Load => self.start_load(),
            Page::Upload => self.start_upload(),
            _ => {}
        }
    }

    fn loaded_model(&self) -> Result<Arc<ScanModel>> {
        match &self.model {
            Some(model) => Ok(Arc::clone(model)),
            None => bail!("The scan file is not loaded"),
        }
    }

    fn save_config(&self) -> Result<()> {
        match &self.config_path {
            Some(path) => self.config.save(path),
            None => {
                log::warn!("Configuration is not saved");
                Ok(())
            }
        }
    }

    fn start_load(&mut self) {
        let Some(source) = self.source.clone() else {
            self.error_message = Some("No source file selected".into());
            return;
        };
        self.model = None;
        self.status_message = "Loading...".into();
        self.progress = Arc::new(JobProgress::default());
        match file_size(source.path()) {
            Ok(size) => self.progress.bytes_total.store(size, Ordering::Relaxed),
            Err(e) => {
                self.status_message = "Failed".into();
                self.error_message = Some(format!("{e:#}"));
                return;
            }
        }

        let filter = self.filter.clone();
        let max = self.config.output.max_cves_per_record;
        let progress = Arc::clone(&self.progress);
        let (tx, rx) = mpsc::channel();
        self.job_rx = Some(rx);

        std::thread::spawn(move || {
            let mut model = ScanModel::new()
                .with_max_per_record(max)
                .with_accept(filter.into_predicate());
            let result = source.load(
                |n| {
                    progress.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
                },
                |ip, cve| {
                    model.add(ip, cve);
                    progress.addresses.store(model.address_count(), Ordering::Relaxed);
                },
            );
            let outcome = match result {
                Ok(()) => JobOutcome::Loaded(model),
                Err(e) => JobOutcome::Failed(format!("Failed: {e:#}")),
            };
            let _ = tx.send(outcome);
        });
    }

    fn start_upload(&mut self) {
        let model = match self.loaded_model() {
            Ok(model) => model,
            Err(e) => {
                self.error_message = Some(format!("{e:#}"));
                return;
            }
        };
        self.uploaded_as = None;
        self.status_message = "Uploading...".into();
        self.progress = Arc::new(JobProgress::default());

        let settings = self.config.output.sms.clone();
        let progress = Arc::clone(&self.progress);
        let (tx, rx) = mpsc::channel();
        self.job_rx = Some(rx);

        std::thread::spawn(move || {
            let result = SmsUploader::new(&settings).and_then(|uploader| {
                uploader.upload(&model, Local::now().date_naive(), move |f| {
                    progress.set_upload_fraction(f)
                })
            });
            let outcome = match result {
                Ok(file_name) => JobOutcome::Uploaded(file_name),
                Err(e) => JobOutcome::Failed(format!("{e:#}")),
            };
            let _ = tx.send(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{Duration, Instant};

    fn wait_for_job(state: &mut AppState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while state.busy() {
            assert!(Instant::now() < deadline, "job did not finish");
            std::thread::sleep(Duration::from_millis(5));
            state.poll();
        }
    }

    #[test]
    fn route_depends_on_target() {
        assert_eq!(
            Page::route(Target::File),
            vec![
                Page::Intro,
                Page::Source,
                Page::Filter,
                Page::Load,
                Page::Target,
                Page::Output,
                Page::Finish
            ]
        );
        let sms = Page::route(Target::Sms);
        assert_eq!(&sms[5..], &[Page::Sms, Page::Upload, Page::Finish]);
    }

    #[test]
    fn source_page_requires_detectable_file() {
        let mut state = AppState::new(Config::default(), None);
        state.go_next();
        assert_eq!(state.page, Page::Source);

        state.go_next();
        assert_eq!(state.page, Page::Source);
        assert!(state.error_message.is_some());

        state.source_text = "/nonexistent/scan.csv".into();
        state.go_next();
        assert_eq!(state.page, Page::Source);
    }

    #[test]
    fn file_flow_writes_report_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan.csv");
        let mut f = std::fs::File::create(&scan).unwrap();
        writeln!(f, "IP,QID,CVE ID").unwrap();
        writeln!(f, "10.0.0.1,1,CVE-2020-0001").unwrap();
        writeln!(f, "10.0.0.1,2,CVE-2020-0002").unwrap();
        writeln!(f, "192.168.0.1,3,CVE-2020-0003").unwrap();
        drop(f);

        let config_path = dir.path().join("config.yaml");
        let mut state = AppState::new(Config::default(), Some(config_path.clone()));
        state.config.filter.mode = qevr::data::filter::FilterMode::Exclude;
        state.networks_text = "192.168.0.0/16 # office".into();
        state.source_text = scan.display().to_string();
        state.config.output.file.folder = dir.path().display().to_string();

        state.go_next(); // intro
        state.go_next(); // source
        state.go_next(); // filter → load starts
        assert_eq!(state.page, Page::Load);
        wait_for_job(&mut state);
        assert_eq!(state.error_message, None);
        assert_eq!(state.status_message, "Loaded 2 CVEs for 1 addresses");

        state.go_next(); // load
        state.go_next(); // target (file)
        assert_eq!(state.page, Page::Output);
        state.go_next(); // output → saves
        assert_eq!(state.page, Page::Finish, "{:?}", state.error_message);

        let reports: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("qevr_"))
            .collect();
        assert_eq!(reports.len(), 1);

        state.go_next(); // finish
        assert!(state.quit_requested);
        let saved = Config::load(&config_path).unwrap();
        assert_eq!(saved.filter.networks, vec!["192.168.0.0/16 # office".to_string()]);
        assert_eq!(saved.source, scan.display().to_string());
    }

    #[test]
    fn back_returns_to_previous_page() {
        let mut state = AppState::new(Config::default(), None);
        state.go_next();
        state.go_back();
        assert_eq!(state.page, Page::Intro);
        state.go_back();
        assert_eq!(state.page, Page::Intro);
    }
}
