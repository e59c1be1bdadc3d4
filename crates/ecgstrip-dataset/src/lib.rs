//! ecgstrip-dataset — PTB-XL dataset plumbing around the `ecgstrip` core.
//!
//! Three layers, composed by [`PtbXlManager`]:
//!
//! 1. [`ObjectStore`] — HTTP fetch from the public PTB-XL bucket with
//!    local-path caching (a file is downloaded at most once).
//! 2. [`RecordIndex`] — the `ptbxl_database.csv` record index, mapping an
//!    `ecg_id` to its bucket-relative signal path and annotation fields.
//! 3. [`PtbXlManager`] — generate-if-missing orchestration of the per-record
//!    (signal, image, mask) artifact triple.

pub mod index;
pub mod manager;
pub mod store;

pub use index::{RecordEntry, RecordIndex};
pub use manager::{ManagerConfig, PtbXlManager, PTB_XL_BUCKET};
pub use store::ObjectStore;
