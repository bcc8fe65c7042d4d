use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::model::Accept;
use crate::error::{QevrError, Result};

// ---------------------------------------------------------------------------
// FilterMode – what to do with addresses inside the listed networks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Keep every address.
    #[default]
    #[serde(rename = "nofilter")]
    NoFilter,
    /// Keep only addresses inside one of the networks.
    Include,
    /// Drop addresses inside any of the networks.
    Exclude,
}

impl FilterMode {
    pub const ALL: [FilterMode; 3] = [
        FilterMode::NoFilter,
        FilterMode::Include,
        FilterMode::Exclude,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterMode::NoFilter => "No filtering",
            FilterMode::Include => "Include only entities that match the list below",
            FilterMode::Exclude => "Omit all entities that match the list below",
        }
    }
}

// ---------------------------------------------------------------------------
// AddressFilter – compiled network list
// ---------------------------------------------------------------------------

/// A filter mode plus the networks it applies to.
///
/// Built from free text with one network per line; `#` starts a comment and
/// blank lines are ignored. The non-blank source lines are kept verbatim so
/// they can be written back to the configuration.
#[derive(Debug, Clone, Default)]
pub struct AddressFilter {
    mode: FilterMode,
    networks: Vec<IpNet>,
    raw: Vec<String>,
}

impl AddressFilter {
    /// Parse newline-separated network text.
    pub fn parse(mode: FilterMode, text: &str) -> Result<Self> {
        Self::from_lines(mode, text.lines())
    }

    pub fn from_lines<I, S>(mode: FilterMode, lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut networks = Vec::new();
        let mut raw = Vec::new();

        for (i, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }
            raw.push(line.to_string());

            let spec = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            }
            .trim();
            if spec.is_empty() {
                continue;
            }

            let net = spec.parse::<IpNet>().map_err(|source| QevrError::MalformedRange {
                line: i + 1,
                text: spec.to_string(),
                source,
            })?;
            networks.push(net);
        }

        Ok(Self { mode, networks, raw })
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn networks(&self) -> &[IpNet] {
        &self.networks
    }

    /// Source lines, comments included.
    pub fn raw_lines(&self) -> &[String] {
        &self.raw
    }

    /// Whether an observation for `address` should be kept.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are matched as the IPv4
    /// address they carry.
    pub fn accepts(&self, address: &str) -> bool {
        if self.mode == FilterMode::NoFilter {
            return true;
        }
        let Ok(ip) = address.parse::<IpAddr>() else {
            return false;
        };
        let ip = ip.to_canonical();
        for net in &self.networks {
            if net.contains(&ip) {
                return self.mode == FilterMode::Include;
            }
        }
        self.mode == FilterMode::Exclude
    }

    /// Close over the filter for use as a [`ScanModel`](super::model::ScanModel) predicate.
    pub fn into_predicate(self) -> Accept {
        Box::new(move |address: &str| self.accepts(address))
    }
}
