//! Trace-mask derivation: global Otsu thresholding of a clean render.
//!
//! The mask isolates ink from paper: a pixel is foreground when its
//! intensity is *strictly less than* the automatically chosen threshold
//! (dark trace on white background). The strict comparison is load-bearing —
//! downstream consumers rely on threshold ties counting as background.

use std::path::Path;

use image::{GrayImage, Luma};

/// Boolean pixel mask with the dimensions of the raster it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl TraceMask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize]
    }

    /// Row-major mask values.
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// Number of foreground (trace) pixels.
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Encode as an 8-bit grayscale image, foreground white (255).
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    /// Decode from an 8-bit grayscale image; any nonzero pixel is foreground.
    pub fn from_gray_image(img: &GrayImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.pixels().map(|p| p[0] != 0).collect(),
        }
    }

    /// Persist as a PNG (foreground white on black).
    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.to_gray_image().save(path)
    }

    /// Load a mask previously written by [`TraceMask::save_png`].
    pub fn from_png_file(path: &Path) -> Result<Self, image::ImageError> {
        let img = image::open(path)?.to_luma8();
        Ok(Self::from_gray_image(&img))
    }
}

/// Global Otsu threshold over the 256-bin intensity histogram.
///
/// Chooses the split maximizing inter-class variance between the two pixel
/// populations (equivalently minimizing intra-class variance) and returns the
/// midpoint just above the maximizing index, so that on a pure black-on-white
/// image the black population falls strictly below the threshold. A
/// constant-intensity image yields its single intensity value, making the
/// strict-less-than mask empty — degenerate input, not an error.
pub fn otsu_threshold(img: &GrayImage) -> f32 {
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p[0] as usize] += 1;
    }

    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let nonzero_bins = hist.iter().filter(|&&n| n > 0).count();
    if nonzero_bins == 1 {
        let value = hist.iter().position(|&n| n > 0).unwrap_or(0);
        return value as f32;
    }

    let weighted_sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(v, &n)| v as f64 * n as f64)
        .sum();

    let mut best_split = 0usize;
    let mut best_variance = f64::NEG_INFINITY;
    let mut w0 = 0.0;
    let mut sum0 = 0.0;

    // Split at t puts intensities <= t in the dark class.
    for t in 0..255usize {
        w0 += hist[t] as f64;
        sum0 += t as f64 * hist[t] as f64;

        let w1 = total as f64 - w0;
        if w0 == 0.0 {
            continue;
        }
        if w1 == 0.0 {
            break;
        }

        let mean0 = sum0 / w0;
        let mean1 = (weighted_sum - sum0) / w1;
        let variance = w0 * w1 * (mean0 - mean1) * (mean0 - mean1);

        if variance > best_variance {
            best_variance = variance;
            best_split = t;
        }
    }

    best_split as f32 + 0.5
}

/// Derive the boolean trace mask of a clean grayscale render.
///
/// Output dimensions equal the input's; foreground iff intensity is strictly
/// below the Otsu threshold.
pub fn derive_mask(img: &GrayImage) -> TraceMask {
    let threshold = otsu_threshold(img);
    tracing::debug!(
        "otsu threshold {:.1} over {}x{} render",
        threshold,
        img.width(),
        img.height()
    );

    TraceMask {
        width: img.width(),
        height: img.height(),
        data: img.pixels().map(|p| (p[0] as f32) < threshold).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_dimensions_match_input() {
        let img = GrayImage::from_pixel(37, 53, Luma([255]));
        let mask = derive_mask(&img);
        assert_eq!((mask.width(), mask.height()), (37, 53));
        assert_eq!(mask.as_slice().len(), 37 * 53);
    }

    #[test]
    fn black_stroke_on_white_masks_exactly_the_stroke() {
        let mut img = GrayImage::from_pixel(40, 40, Luma([255]));
        // An arbitrary L-shaped stroke.
        for x in 5..30 {
            img.put_pixel(x, 20, Luma([0]));
        }
        for y in 20..35 {
            img.put_pixel(5, y, Luma([0]));
        }

        let mask = derive_mask(&img);
        for y in 0..40 {
            for x in 0..40 {
                let stroke = img.get_pixel(x, y)[0] == 0;
                assert_eq!(mask.get(x, y), stroke, "polarity mismatch at ({x}, {y})");
            }
        }
    }

    #[test]
    fn constant_image_masks_all_background() {
        for value in [0u8, 128, 255] {
            let img = GrayImage::from_pixel(16, 16, Luma([value]));
            let mask = derive_mask(&img);
            assert_eq!(mask.foreground_count(), 0, "value {value}");
        }
    }

    #[test]
    fn threshold_separates_bimodal_histogram() {
        let mut img = GrayImage::from_pixel(20, 20, Luma([200]));
        for x in 0..20 {
            img.put_pixel(x, 0, Luma([30]));
        }

        let t = otsu_threshold(&img);
        assert!(t > 30.0 && t <= 200.0, "threshold {t} outside (30, 200]");

        let mask = derive_mask(&img);
        assert_eq!(mask.foreground_count(), 20);
    }

    #[test]
    fn mask_png_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mask.png");

        let mut img = GrayImage::from_pixel(12, 9, Luma([255]));
        img.put_pixel(3, 4, Luma([0]));
        img.put_pixel(11, 8, Luma([0]));
        let mask = derive_mask(&img);

        mask.save_png(&path).expect("save");
        let reloaded = TraceMask::from_png_file(&path).expect("load");
        assert_eq!(reloaded, mask);
    }
}
