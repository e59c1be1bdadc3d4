//! Strip-chart rasterization at a fixed 3 px/mm scale.
//!
//! One render path serves both modes: `Clean` draws the traces only, and
//! `Annotated` adds the 5 mm paper grid plus lead-name labels on top of the
//! *identical* trace geometry. Masks are derived from clean renders, so the
//! two modes must never diverge in where the trace lands.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use nalgebra::DMatrix;

use crate::glyphs;
use crate::layout::{ChartLayout, PIXELS_PER_MM};
use crate::record::EcgMetadata;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TRACE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const GRID_COLOR: Rgb<u8> = Rgb([255, 182, 193]);
const GRID_STEP_MM: f32 = 5.0;

/// Chart position of a lead label relative to its baseline offset, in mm.
const LABEL_X_MM: f32 = 5.0;
const LABEL_RISE_MM: f32 = 5.0;
const LABEL_SCALE: u32 = 2;

/// Rendering mode of a strip chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Paper grid and lead labels over the traces.
    Annotated,
    /// Traces only, for mask derivation.
    Clean,
}

/// Rasterizes ECG records according to a [`ChartLayout`].
///
/// Create once, render many records.
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    layout: ChartLayout,
}

impl ChartRenderer {
    pub fn new(layout: ChartLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ChartLayout {
        &self.layout
    }

    /// Render a record to an in-memory RGB raster.
    ///
    /// Pixel dimensions are `round(width_mm * 3) x round(height_mm * 3)`.
    /// A record with no lead overlapping the configured order renders as a
    /// blank canvas; that is not an error.
    pub fn render(
        &self,
        samples: &DMatrix<f32>,
        metadata: &EcgMetadata,
        mode: RenderMode,
    ) -> RgbImage {
        let (traces, height_mm) = self.layout.to_millimeter_space(samples, metadata);
        let (xs, width_mm) = self.layout.time_vector(metadata.sig_len, metadata.fs);

        let width_px = (width_mm * PIXELS_PER_MM).round() as u32;
        let height_px = (height_mm * PIXELS_PER_MM).round() as u32;
        let mut img = RgbImage::from_pixel(width_px, height_px, BACKGROUND);

        if mode == RenderMode::Annotated {
            draw_grid(&mut img, width_mm, height_mm);
        }

        // Deterministic draw order: configured lead order, top lead first.
        for lead in &self.layout.leads_order {
            let Some(ys) = traces.get(lead) else {
                continue;
            };
            draw_trace(&mut img, &xs, ys, height_mm);
        }

        if mode == RenderMode::Annotated {
            let (offsets, _) = self.layout.vertical_offsets(&metadata.sig_name);
            for (lead, offset) in &offsets {
                let x = (LABEL_X_MM * PIXELS_PER_MM).round() as i64;
                let y = ((height_mm - (offset + LABEL_RISE_MM)) * PIXELS_PER_MM).round() as i64;
                glyphs::draw_label(&mut img, lead, x, y, LABEL_SCALE, TRACE_COLOR);
            }
        }

        img
    }

    /// Render a record and persist the raster as a PNG (or any format the
    /// `image` crate infers from the extension).
    pub fn render_to_file(
        &self,
        samples: &DMatrix<f32>,
        metadata: &EcgMetadata,
        mode: RenderMode,
        path: &std::path::Path,
    ) -> Result<RgbImage, image::ImageError> {
        let img = self.render(samples, metadata, mode);
        img.save(path)?;
        tracing::debug!("chart written to {}", path.display());
        Ok(img)
    }
}

/// Map a chart-frame point (mm, y-up) to raster coordinates (px, y-down).
fn to_raster(x_mm: f32, y_mm: f32, height_mm: f32) -> (f32, f32) {
    (x_mm * PIXELS_PER_MM, (height_mm - y_mm) * PIXELS_PER_MM)
}

fn draw_trace(img: &mut RgbImage, xs: &[f32], ys: &[f32], height_mm: f32) {
    if xs.len() == 1 {
        let (x, y) = to_raster(xs[0], ys[0], height_mm);
        let (x, y) = (x.round() as i64, y.round() as i64);
        if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, TRACE_COLOR);
        }
        return;
    }

    for i in 1..xs.len().min(ys.len()) {
        let start = to_raster(xs[i - 1], ys[i - 1], height_mm);
        let end = to_raster(xs[i], ys[i], height_mm);
        draw_line_segment_mut(img, start, end, TRACE_COLOR);
    }
}

/// Light grid lines every 5 mm on both axes, tick-aligned at 0.
///
/// The chart y axis points up, so horizontal lines are laid out from the
/// bottom edge; lines landing on the far edge are clamped inside the raster.
fn draw_grid(img: &mut RgbImage, width_mm: f32, height_mm: f32) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let mut x_mm = 0.0;
    while x_mm <= width_mm + f32::EPSILON {
        let col = ((x_mm * PIXELS_PER_MM).round() as u32).min(w - 1);
        for y in 0..h {
            img.put_pixel(col, y, GRID_COLOR);
        }
        x_mm += GRID_STEP_MM;
    }

    let mut y_mm = 0.0;
    while y_mm <= height_mm + f32::EPSILON {
        let row = (((height_mm - y_mm) * PIXELS_PER_MM).round() as u32).min(h - 1);
        for x in 0..w {
            img.put_pixel(x, row, GRID_COLOR);
        }
        y_mm += GRID_STEP_MM;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::STANDARD_12_LEADS;

    fn flat_record(leads: &[&str], sig_len: usize, fs: f32) -> (DMatrix<f32>, EcgMetadata) {
        let samples = DMatrix::from_element(sig_len, leads.len(), 0.0);
        let metadata = EcgMetadata {
            sig_name: leads.iter().map(|s| s.to_string()).collect(),
            sig_len,
            fs,
        };
        (samples, metadata)
    }

    #[test]
    fn raster_dimensions_follow_3px_per_mm() {
        let renderer = ChartRenderer::default();
        // 1000 samples at 500 Hz -> 50 mm wide; default layout -> 240 mm tall.
        let (samples, metadata) = flat_record(&STANDARD_12_LEADS, 1000, 500.0);
        let img = renderer.render(&samples, &metadata, RenderMode::Clean);
        assert_eq!(img.dimensions(), (150, 720));
    }

    #[test]
    fn clean_and_annotated_trace_geometry_match() {
        let renderer = ChartRenderer::default();
        let metadata = EcgMetadata {
            sig_name: vec!["I".to_string(), "II".to_string()],
            sig_len: 200,
            fs: 100.0,
        };
        let samples = DMatrix::from_fn(200, 2, |i, j| {
            let t = i as f32 / 100.0;
            if j == 0 { (t * 8.0).sin() } else { (t * 5.0).cos() * 0.7 }
        });

        let clean = renderer.render(&samples, &metadata, RenderMode::Clean);
        let annotated = renderer.render(&samples, &metadata, RenderMode::Annotated);
        assert_eq!(clean.dimensions(), annotated.dimensions());

        // Every trace pixel of the clean render must be a trace pixel of the
        // annotated render; overlays only ever add pixels.
        for (x, y, pix) in clean.enumerate_pixels() {
            if *pix == Rgb([0, 0, 0]) {
                assert_eq!(
                    *annotated.get_pixel(x, y),
                    Rgb([0, 0, 0]),
                    "trace shifted at ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn clean_render_has_no_grid_color() {
        let renderer = ChartRenderer::default();
        let (samples, metadata) = flat_record(&["I", "II"], 100, 100.0);
        let clean = renderer.render(&samples, &metadata, RenderMode::Clean);
        assert!(clean.pixels().all(|p| *p != GRID_COLOR));
    }

    #[test]
    fn annotated_render_has_grid_and_flat_baselines() {
        let renderer = ChartRenderer::default();
        let (samples, metadata) = flat_record(&["I"], 100, 100.0);
        let img = renderer.render(&samples, &metadata, RenderMode::Annotated);

        assert!(img.pixels().any(|p| *p == GRID_COLOR));

        // A zero signal draws its trace exactly on the lead baseline.
        let (offsets, height_mm) = renderer.layout().vertical_offsets(&metadata.sig_name);
        let row = ((height_mm - offsets["I"]) * PIXELS_PER_MM).round() as u32;
        assert_eq!(*img.get_pixel(10, row), Rgb([0, 0, 0]));
    }

    #[test]
    fn zero_overlap_renders_blank_canvas() {
        let renderer = ChartRenderer::default();
        let (samples, metadata) = flat_record(&["X1", "X2"], 50, 100.0);
        let img = renderer.render(&samples, &metadata, RenderMode::Clean);
        assert_eq!(img.dimensions(), (38, 720));
        assert!(img.pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn render_to_file_writes_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chart.png");

        let renderer = ChartRenderer::default();
        let (samples, metadata) = flat_record(&["I"], 100, 100.0);
        let img = renderer
            .render_to_file(&samples, &metadata, RenderMode::Annotated, &path)
            .expect("render to file");

        let reloaded = image::open(&path).expect("reload").to_rgb8();
        assert_eq!(reloaded.dimensions(), img.dimensions());
    }
}
