//! ecgstrip — ECG strip-chart rendering and trace-mask derivation.
//!
//! Turns a multi-lead ECG sample matrix into a gridded strip-chart raster
//! (mimicking traditional ECG paper) and derives a boolean mask isolating the
//! plotted trace pixels from the background. The pipeline stages are:
//!
//! 1. **Layout** – map sample indices and millivolt values into a
//!    millimeter-space canvas (paper speed, gain, per-lead vertical offsets).
//! 2. **Render** – rasterize the millimeter-space traces at 3 px/mm, either
//!    annotated (5 mm grid, lead labels) or clean (trace only).
//! 3. **Mask** – global Otsu threshold over a clean grayscale render;
//!    foreground is every pixel strictly darker than the threshold.
//!
//! [`wfdb`] decodes a WFDB header/data file pair (the PTB-XL on-disk format)
//! into the sample matrix + metadata the renderer consumes.
//!
//! # Public API
//! - [`ChartLayout`] — immutable layout configuration and coordinate engine
//! - [`ChartRenderer`] and [`RenderMode`] — rasterization entry points
//! - [`derive_mask`] and [`TraceMask`] — mask derivation
//! - [`EcgRecord`] / [`EcgMetadata`] — decoded signal types

mod glyphs;
pub mod layout;
pub mod mask;
pub mod record;
pub mod render;
pub mod wfdb;

pub use layout::{ChartLayout, PIXELS_PER_MM, STANDARD_12_LEADS};
pub use mask::{derive_mask, otsu_threshold, TraceMask};
pub use record::{EcgMetadata, EcgRecord};
pub use render::{ChartRenderer, RenderMode};
