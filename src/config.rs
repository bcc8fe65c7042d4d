use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::{AddressFilter, FilterMode};
use crate::data::model::DEFAULT_MAX_PER_RECORD;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

// ---------------------------------------------------------------------------
// Configuration document
// ---------------------------------------------------------------------------

/// Settings remembered between runs, stored as YAML next to the executable.
///
/// ```yaml
/// version: 1
/// source: /data/scan.csv
/// filter:
///   type: exclude
///   networks:
///     - 10.10.40.0/24
///     - 172.16.0.0/16  # lab
/// output:
///   target: sms
///   sms:
///     address: 1.2.3.4
///     api_key: 37F9C284-5A64-4659-A6DC-306E6332DAE5
///     ignore_tls_errors: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// First row of the source is a header.
    pub has_header: bool,
    pub filter: FilterConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub mode: FilterMode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    #[serde(alias = "File")]
    File,
    #[serde(alias = "SMS")]
    Sms,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::File, Target::Sms];

    pub fn label(self) -> &'static str {
        match self {
            Target::File => "Save to file",
            Target::Sms => "Upload to SMS server",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub target: Target,
    pub max_cves_per_record: usize,
    pub file: FileOutput,
    pub sms: SmsSettings,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            target: Target::File,
            max_cves_per_record: DEFAULT_MAX_PER_RECORD,
            file: FileOutput::default(),
            sms: SmsSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub folder: String,
}

/// Connection settings for the SMS vulnerability scanner import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub ignore_tls_errors: bool,
    /// Whole-request timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            api_key: String::new(),
            ignore_tls_errors: false,
            timeout_secs: 5 * 60,
        }
    }
}

impl SmsSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// The server address must be set and the API key must be a UUID.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            bail!("SMS Server Address cannot be empty");
        }
        if uuid::Uuid::parse_str(self.api_key.trim()).is_err() {
            bail!("API Key must be a valid UUID");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            source: String::new(),
            has_header: true,
            filter: FilterConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration at `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("{}: not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("{}: failed to read config file", path.display()));
            }
        };
        serde_yaml::from_str(&text)
            .with_context(|| format!("{}: failed to parse config file", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self).context("failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("{}: failed to write config file", path.display()))?;
        log::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Compile the filter section.
    pub fn address_filter(&self) -> crate::error::Result<AddressFilter> {
        AddressFilter::from_lines(self.filter.mode, &self.filter.networks)
    }
}

/// `config.yaml` in the folder holding the running executable.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(executable_folder()?.join(CONFIG_FILE_NAME))
}

pub fn executable_folder() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to get executable path")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable path has no parent folder")
}
