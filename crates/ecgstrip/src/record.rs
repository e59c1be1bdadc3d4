//! Decoded ECG record types shared across the crate.

use nalgebra::DMatrix;

/// Per-record metadata accompanying a sample matrix.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EcgMetadata {
    /// Ordered lead names, one per sample-matrix column.
    pub sig_name: Vec<String>,
    /// Number of samples per lead.
    pub sig_len: usize,
    /// Sampling frequency in Hz.
    pub fs: f32,
}

impl EcgMetadata {
    /// Record duration in seconds.
    pub fn duration_s(&self) -> f32 {
        self.sig_len as f32 / self.fs
    }
}

/// A decoded multi-lead ECG signal.
///
/// `samples` is `sig_len x n_leads` in millivolts; column `j` belongs to
/// `metadata.sig_name[j]`.
#[derive(Debug, Clone)]
pub struct EcgRecord {
    pub samples: DMatrix<f32>,
    pub metadata: EcgMetadata,
}

impl EcgRecord {
    /// Number of leads in the sample matrix.
    pub fn n_leads(&self) -> usize {
        self.samples.ncols()
    }
}
