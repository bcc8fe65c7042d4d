//! QeVR without the wizard: detect, load, then save or upload in one run.
//!
//! Usage:
//!   qevr-cli scan.csv --folder /tmp/out --suffix dmz
//!   qevr-cli scan.csv --filter exclude --network 10.0.0.0/8 --network 172.16.0.0/12
//!   qevr-cli scan.csv --upload --sms-address 10.38.50.89 --api-key <uuid> --ignore-tls-errors
//!
//! Anything not given on the command line comes from `config.yaml`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};

use qevr::config::{config_file_path, Config, Target};
use qevr::data::detect::ColumnPatterns;
use qevr::data::export::{report_file_name, save_to_file};
use qevr::data::filter::FilterMode;
use qevr::data::loader::{file_size, CsvSource};
use qevr::data::model::ScanModel;
use qevr::upload::SmsUploader;

#[derive(Parser)]
#[command(name = "qevr-cli", version)]
#[command(about = "Convert a vulnerability scan CSV into an SMS eVR import")]
struct Cli {
    /// Scan export to convert (defaults to the configured source)
    source: Option<PathBuf>,

    /// Configuration file (defaults to config.yaml next to the executable)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address filter mode
    #[arg(long, value_enum)]
    filter: Option<FilterArg>,

    /// Network for the filter, repeatable; replaces the configured list
    #[arg(long = "network")]
    networks: Vec<String>,

    /// Folder for the report file
    #[arg(long)]
    folder: Option<String>,

    /// Suffix appended to the report file name
    #[arg(long)]
    suffix: Option<String>,

    /// Maximum CVE ids per output record
    #[arg(long)]
    max_cves: Option<usize>,

    /// The source has no header row
    #[arg(long)]
    no_header: bool,

    /// Upload to the SMS server instead of saving a file
    #[arg(long)]
    upload: bool,

    #[arg(long)]
    sms_address: Option<String>,

    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    ignore_tls_errors: bool,

    /// Upload timeout in seconds, 0 for none
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the effective settings back to the configuration file
    #[arg(long)]
    save_config: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    Nofilter,
    Include,
    Exclude,
}

impl From<FilterArg> for FilterMode {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Nofilter => FilterMode::NoFilter,
            FilterArg::Include => FilterMode::Include,
            FilterArg::Exclude => FilterMode::Exclude,
        }
    }
}

impl Cli {
    /// Override `config` with whatever was given on the command line.
    fn apply(self, config: &mut Config) {
        if let Some(source) = self.source {
            config.source = source.display().to_string();
        }
        if self.no_header {
            config.has_header = false;
        }
        if let Some(mode) = self.filter {
            config.filter.mode = mode.into();
        }
        if !self.networks.is_empty() {
            config.filter.networks = self.networks;
        }
        if let Some(max) = self.max_cves {
            config.output.max_cves_per_record = max;
        }

        let file = &mut config.output.file;
        if self.folder.is_some() || self.suffix.is_some() {
            config.output.target = Target::File;
        }
        if let Some(folder) = self.folder {
            file.folder = folder;
        }
        if let Some(suffix) = self.suffix {
            file.suffix = suffix;
        }

        let sms = &mut config.output.sms;
        if let Some(address) = self.sms_address {
            sms.address = address;
        }
        if let Some(api_key) = self.api_key {
            sms.api_key = api_key;
        }
        if self.ignore_tls_errors {
            sms.ignore_tls_errors = true;
        }
        if let Some(timeout) = self.timeout_secs {
            sms.timeout_secs = timeout;
        }
        if self.upload {
            config.output.target = Target::Sms;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_file_path()?,
    };
    let save_config = cli.save_config;
    let mut config = Config::load(&config_path)?;
    cli.apply(&mut config);

    if config.source.is_empty() {
        bail!("no source file given");
    }
    let filter = config.address_filter()?;

    let mut source = CsvSource::new(&config.source).with_header(config.has_header);
    source.detect(&ColumnPatterns::default())?;
    let total = file_size(source.path())?;

    let mut model = ScanModel::new()
        .with_max_per_record(config.output.max_cves_per_record)
        .with_accept(filter.into_predicate());
    let mut read = 0u64;
    let mut reported = 0u64;
    source.load(
        |n| {
            read += n as u64;
            let pct = read * 100 / total.max(1);
            if pct >= reported + 10 {
                log::info!("Read {pct}%");
                reported = pct;
            }
        },
        |ip, cve| model.add(ip, cve),
    )?;
    log::info!("{}", model.final_status());

    let today = Local::now().date_naive();
    match config.output.target {
        Target::File => {
            let file = &config.output.file;
            let path = Path::new(&file.folder).join(report_file_name(today, &file.suffix));
            save_to_file(&model, &path)?;
            println!("{}", path.display());
        }
        Target::Sms => {
            let uploader = SmsUploader::new(&config.output.sms)?;
            let mut reported = 0u32;
            let file_name = uploader.upload(&model, today, move |fraction| {
                let pct = (fraction * 100.0) as u32;
                if pct >= reported + 10 {
                    log::info!("Uploaded {pct}%");
                    reported = pct;
                }
            })?;
            println!("Uploaded as {file_name}");
        }
    }

    if save_config {
        config.save(&config_path)?;
    }
    Ok(())
}
