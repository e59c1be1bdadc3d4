//! PTB-XL record index loaded from `ptbxl_database.csv`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// One row of the PTB-XL database index.
///
/// Only the columns the pipeline needs are kept; annotation fields stay as
/// raw strings for downstream consumers to parse.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RecordEntry {
    pub ecg_id: u32,
    /// Bucket-relative path of the 100 Hz record, without suffix.
    pub filename_lr: String,
    /// Bucket-relative path of the 500 Hz record, without suffix.
    #[serde(default)]
    pub filename_hr: String,
    /// SCP statement codes, e.g. `{'NORM': 100.0}`.
    #[serde(default)]
    pub scp_codes: String,
    #[serde(default)]
    pub recording_date: String,
}

/// Lookup table from `ecg_id` to its index row.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    entries: HashMap<u32, RecordEntry>,
}

impl RecordIndex {
    pub fn from_csv_file(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open index {}", path.display()))?;

        let mut entries = HashMap::new();
        for row in reader.deserialize() {
            let entry: RecordEntry = row.context("malformed index row")?;
            entries.insert(entry.ecg_id, entry);
        }

        tracing::info!("loaded record index: {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn entry(&self, ecg_id: u32) -> Option<&RecordEntry> {
        self.entries.get(&ecg_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
