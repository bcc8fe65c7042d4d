use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identifiers written per output record unless configured otherwise.
pub const DEFAULT_MAX_PER_RECORD: usize = 2800;

/// Address predicate applied to every observation before it is stored.
pub type Accept = Box<dyn Fn(&str) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// ScanModel – vulnerability ids aggregated per address
// ---------------------------------------------------------------------------

/// Deduplicated `address → {CVE id}` aggregate built during one load pass.
///
/// Single writer: the load pass owns the model mutably, serialization only
/// reads it.
pub struct ScanModel {
    accept: Option<Accept>,
    max_per_record: usize,
    data: HashMap<String, HashSet<String>>,
}

impl Default for ScanModel {
    fn default() -> Self {
        Self {
            accept: None,
            max_per_record: DEFAULT_MAX_PER_RECORD,
            data: HashMap::new(),
        }
    }
}

impl fmt::Debug for ScanModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanModel")
            .field("filtered", &self.accept.is_some())
            .field("max_per_record", &self.max_per_record)
            .field("addresses", &self.data.len())
            .finish()
    }
}

impl ScanModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop observations whose address `accept` rejects.
    pub fn with_accept(mut self, accept: Accept) -> Self {
        self.accept = Some(accept);
        self
    }

    /// Cap on identifiers per output record. Values below 1 are raised to 1.
    pub fn with_max_per_record(mut self, max: usize) -> Self {
        self.max_per_record = max.max(1);
        self
    }

    pub fn max_per_record(&self) -> usize {
        self.max_per_record
    }

    /// Record that `identifier` was reported for `address`.
    pub fn add(&mut self, address: &str, identifier: &str) {
        if let Some(accept) = &self.accept {
            if !accept(address) {
                return;
            }
        }
        match self.data.get_mut(address) {
            Some(ids) => {
                if !ids.contains(identifier) {
                    ids.insert(identifier.to_string());
                }
            }
            None => {
                let mut ids = HashSet::new();
                ids.insert(identifier.to_string());
                self.data.insert(address.to_string(), ids);
            }
        }
    }

    /// Number of distinct addresses.
    pub fn address_count(&self) -> usize {
        self.data.len()
    }

    /// Number of distinct (address, identifier) pairs.
    pub fn pair_count(&self) -> usize {
        self.data.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Identifiers reported for `address`.
    pub fn identifiers(&self, address: &str) -> Option<&HashSet<String>> {
        self.data.get(address)
    }

    /// All addresses with their identifiers, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HashSet<String>)> {
        self.data.iter().map(|(ip, ids)| (ip.as_str(), ids))
    }

    /// Short status for display while loading.
    pub fn status(&self) -> String {
        format!("Loaded {} addresses", self.address_count())
    }

    /// Summary once loading is complete.
    pub fn final_status(&self) -> String {
        format!(
            "Loaded {} CVEs for {} addresses",
            self.pair_count(),
            self.address_count()
        )
    }
}
