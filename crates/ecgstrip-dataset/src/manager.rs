//! Generate-at-most-once orchestration of PTB-XL artifacts.
//!
//! For each record the manager maintains a triple next to the downloaded
//! signal files: `<record>.hea`/`<record>.dat` (fetched), `<record>.png`
//! (annotated render) and `<record>_mask.png` (trace mask from a clean
//! render). Expensive downloads and renders happen at most once; the
//! `download_if_missing` / `generate_if_missing` flags turn the implicit
//! steps into hard errors for pipelines that pre-stage their data.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;

use ecgstrip::{derive_mask, ChartLayout, ChartRenderer, EcgRecord, RenderMode, TraceMask};

use crate::index::RecordIndex;
use crate::store::ObjectStore;

/// Public PTB-XL v1.0.1 bucket.
pub const PTB_XL_BUCKET: &str = "ptb-xl-1.0.1.physionet.org";

const INDEX_FILE: &str = "ptbxl_database.csv";
const DEFAULT_DOWNLOADS_DIR: &str = "ptb_xl_data";

/// Manager construction parameters.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub bucket: String,
    pub downloads_dir: PathBuf,
    /// Fetch signal files (and the index) on demand.
    pub download_if_missing: bool,
    /// Render image/mask artifacts on demand.
    pub generate_if_missing: bool,
    pub layout: ChartLayout,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bucket: PTB_XL_BUCKET.to_string(),
            downloads_dir: PathBuf::from(DEFAULT_DOWNLOADS_DIR),
            download_if_missing: true,
            generate_if_missing: true,
            layout: ChartLayout::default(),
        }
    }
}

/// PTB-XL dataset manager: cached access to records and their rendered
/// artifacts.
pub struct PtbXlManager {
    store: ObjectStore,
    index: RecordIndex,
    renderer: ChartRenderer,
    download_if_missing: bool,
    generate_if_missing: bool,
}

impl PtbXlManager {
    /// Create a manager; fetches and loads the record index (cached after
    /// the first run).
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let store = ObjectStore::new(&config.bucket, &config.downloads_dir)?;

        let index_path = if config.download_if_missing {
            store.fetch(INDEX_FILE)?
        } else {
            store.is_cached(INDEX_FILE).ok_or_else(|| {
                anyhow!("record index {INDEX_FILE} is not downloaded and downloads are disabled")
            })?
        };
        let index = RecordIndex::from_csv_file(&index_path)?;

        Ok(Self {
            store,
            index,
            renderer: ChartRenderer::new(config.layout),
            download_if_missing: config.download_if_missing,
            generate_if_missing: config.generate_if_missing,
        })
    }

    pub fn index(&self) -> &RecordIndex {
        &self.index
    }

    pub fn renderer(&self) -> &ChartRenderer {
        &self.renderer
    }

    /// Bucket-relative record path (no suffix) for an `ecg_id`.
    fn record_path(&self, ecg_id: u32) -> Result<&str> {
        self.index
            .entry(ecg_id)
            .map(|e| e.filename_lr.as_str())
            .ok_or_else(|| anyhow!("unknown ecg_id {ecg_id}"))
    }

    /// Local signal path without suffix.
    pub fn signal_path(&self, ecg_id: u32) -> Result<PathBuf> {
        Ok(self.store.local_path(self.record_path(ecg_id)?))
    }

    /// Local path of the annotated chart PNG.
    pub fn image_path(&self, ecg_id: u32) -> Result<PathBuf> {
        Ok(self.signal_path(ecg_id)?.with_extension("png"))
    }

    /// Local path of the trace-mask PNG.
    pub fn mask_path(&self, ecg_id: u32) -> Result<PathBuf> {
        let signal = self.signal_path(ecg_id)?;
        let stem = signal
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid record path for ecg_id {ecg_id}"))?;
        Ok(signal.with_file_name(format!("{stem}_mask.png")))
    }

    fn is_downloaded(&self, ecg_id: u32) -> Result<bool> {
        let base = self.signal_path(ecg_id)?;
        Ok(base.with_extension("hea").is_file() && base.with_extension("dat").is_file())
    }

    /// Download a record's header and data files.
    pub fn download_record(&self, ecg_id: u32) -> Result<()> {
        let path = self.record_path(ecg_id)?;
        self.store.fetch(&format!("{path}.hea"))?;
        self.store.fetch(&format!("{path}.dat"))?;
        Ok(())
    }

    fn ensure_downloaded(&self, ecg_id: u32) -> Result<()> {
        if self.is_downloaded(ecg_id)? {
            return Ok(());
        }
        if !self.download_if_missing {
            bail!("record {ecg_id} is not downloaded and downloads are disabled");
        }
        self.download_record(ecg_id)
    }

    /// Load and decode a record's signal, downloading it first if allowed.
    pub fn load_record(&self, ecg_id: u32) -> Result<EcgRecord> {
        self.ensure_downloaded(ecg_id)?;
        let base = self.signal_path(ecg_id)?;
        ecgstrip::wfdb::read_record(&base)
            .map_err(|e| anyhow!("failed to decode record {ecg_id}: {e}"))
    }

    /// In-memory annotated render of a record; nothing is persisted.
    pub fn render(&self, ecg_id: u32) -> Result<RgbImage> {
        let record = self.load_record(ecg_id)?;
        Ok(self
            .renderer
            .render(&record.samples, &record.metadata, RenderMode::Annotated))
    }

    /// Render and persist both artifacts of a record: the annotated chart
    /// and the mask derived from a clean render of the same signal.
    pub fn generate(&self, ecg_id: u32) -> Result<()> {
        let record = self.load_record(ecg_id)?;

        let image_path = self.image_path(ecg_id)?;
        self.renderer
            .render_to_file(
                &record.samples,
                &record.metadata,
                RenderMode::Annotated,
                &image_path,
            )
            .with_context(|| format!("failed to write {}", image_path.display()))?;

        let clean = self
            .renderer
            .render(&record.samples, &record.metadata, RenderMode::Clean);
        let mask = derive_mask(&image::imageops::grayscale(&clean));

        let mask_path = self.mask_path(ecg_id)?;
        mask.save_png(&mask_path)
            .with_context(|| format!("failed to write {}", mask_path.display()))?;

        tracing::info!(
            "generated artifacts for record {}: {} and {}",
            ecg_id,
            image_path.display(),
            mask_path.display()
        );
        Ok(())
    }

    fn is_generated(&self, ecg_id: u32) -> Result<bool> {
        Ok(self.image_path(ecg_id)?.is_file() && self.mask_path(ecg_id)?.is_file())
    }

    fn ensure_generated(&self, ecg_id: u32) -> Result<()> {
        if self.is_generated(ecg_id)? {
            return Ok(());
        }
        if !self.generate_if_missing {
            bail!("artifacts for record {ecg_id} have not been generated");
        }
        self.generate(ecg_id)
    }

    /// Annotated chart image of a record, generating it first if allowed.
    pub fn image(&self, ecg_id: u32) -> Result<RgbImage> {
        self.ensure_generated(ecg_id)?;
        let path = self.image_path(ecg_id)?;
        Ok(image::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .to_rgb8())
    }

    /// Trace mask of a record, generating it first if allowed.
    pub fn mask(&self, ecg_id: u32) -> Result<TraceMask> {
        self.ensure_generated(ecg_id)?;
        let path = self.mask_path(ecg_id)?;
        TraceMask::from_png_file(&path)
            .with_context(|| format!("failed to open {}", path.display()))
    }
}
