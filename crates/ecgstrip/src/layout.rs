//! Strip-chart layout geometry: millimeter-space coordinate transforms.
//!
//! [`ChartLayout`] binds the physical chart parameters (paper speed, gain,
//! lead spacing) once and exposes pure transforms from sample space into the
//! millimeter canvas. No I/O, no randomness, nothing is mutated after
//! construction.

use std::collections::HashMap;
use std::path::Path;

use nalgebra::DMatrix;

use crate::record::EcgMetadata;

/// Canonical 12-lead ordering, top row of the chart first.
pub const STANDARD_12_LEADS: [&str; 12] = [
    "I", "II", "III", "AVR", "AVL", "AVF", "V1", "V2", "V3", "V4", "V5", "V6",
];

/// Fixed physical-to-pixel scale of every render.
pub const PIXELS_PER_MM: f32 = 3.0;

/// Immutable chart layout configuration.
///
/// Fully determines canvas width/height and every lead's vertical offset.
/// Leads present in a signal but absent from `leads_order` are silently
/// dropped by every transform below; this name-join is a deliberate design
/// choice (unknown lead codes must not fail a render), not accidental loss.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChartLayout {
    /// Paper speed in mm/s.
    pub mm_per_second: f32,
    /// Vertical spacing between adjacent lead baselines in mm.
    pub lead_separation_mm: f32,
    /// Vertical margin above the first and below the last baseline in mm.
    pub vertical_margin_mm: f32,
    /// Gain in mm/mV.
    pub mm_per_millivolt: f32,
    /// Lead ordering, top-to-bottom. Also fixes the canvas height.
    pub leads_order: Vec<String>,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            mm_per_second: 25.0,
            lead_separation_mm: 20.0,
            vertical_margin_mm: 10.0,
            mm_per_millivolt: 10.0,
            leads_order: STANDARD_12_LEADS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChartLayout {
    /// Load a layout from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let layout: Self = serde_json::from_str(&data)?;
        Ok(layout)
    }

    /// Canvas height in mm.
    ///
    /// Depends on the *configured* order length, not on the leads actually
    /// present in a record, so charts of partial records keep the full-chart
    /// geometry.
    pub fn height_mm(&self) -> f32 {
        self.lead_separation_mm * (self.leads_order.len() as f32 - 1.0)
            + 2.0 * self.vertical_margin_mm
    }

    /// Canvas width in mm for a record of `sig_len` samples at `fs` Hz.
    pub fn width_mm(&self, sig_len: usize, fs: f32) -> f32 {
        sig_len as f32 / fs * self.mm_per_second
    }

    /// Baseline offset in mm for each lead present in both `lead_names` and
    /// `leads_order`, plus the canvas height.
    ///
    /// The first lead of the order sits topmost at `height - margin`, the
    /// last at `margin`.
    pub fn vertical_offsets(&self, lead_names: &[String]) -> (HashMap<String, f32>, f32) {
        let height = self.height_mm();

        let mut offsets = HashMap::new();
        for name in lead_names {
            let Some(idx) = self.leads_order.iter().position(|l| l == name) else {
                continue;
            };
            let offset = height - self.vertical_margin_mm - idx as f32 * self.lead_separation_mm;
            offsets.insert(name.clone(), offset);
        }

        (offsets, height)
    }

    /// Horizontal sample positions in mm, plus the canvas width.
    ///
    /// `x[i] = i * mm_per_second / fs`, identical for every lead.
    pub fn time_vector(&self, sig_len: usize, fs: f32) -> (Vec<f32>, f32) {
        let mm_per_sample = self.mm_per_second / fs;
        let xs = (0..sig_len).map(|i| i as f32 * mm_per_sample).collect();
        (xs, self.width_mm(sig_len, fs))
    }

    /// Per-lead vertical trace positions in mm, plus the canvas height.
    ///
    /// `y = offset(lead) + mv * mm_per_millivolt` for each sample of each
    /// matched lead. Panics if `metadata.sig_name` names more leads than the
    /// sample matrix has columns — that is a caller contract violation, not a
    /// recoverable condition.
    pub fn to_millimeter_space(
        &self,
        samples: &DMatrix<f32>,
        metadata: &EcgMetadata,
    ) -> (HashMap<String, Vec<f32>>, f32) {
        let (offsets, height) = self.vertical_offsets(&metadata.sig_name);

        let mut traces = HashMap::new();
        for (col, name) in metadata.sig_name.iter().enumerate() {
            let Some(&offset) = offsets.get(name) else {
                continue;
            };
            let ys = samples
                .column(col)
                .iter()
                .map(|mv| offset + mv * self.mm_per_millivolt)
                .collect();
            traces.insert(name.clone(), ys);
        }

        (traces, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_height_is_240mm() {
        let layout = ChartLayout::default();
        assert_eq!(layout.height_mm(), 240.0);
    }

    #[test]
    fn offsets_decrease_in_lead_order() {
        let layout = ChartLayout::default();
        let (offsets, height) = layout.vertical_offsets(&names(&STANDARD_12_LEADS));

        assert_eq!(offsets.len(), 12);
        assert_eq!(offsets["I"], height - layout.vertical_margin_mm);
        assert_eq!(offsets["V6"], layout.vertical_margin_mm);

        let mut prev = f32::INFINITY;
        for lead in STANDARD_12_LEADS {
            let offset = offsets[lead];
            assert!(offset < prev, "offset for {lead} must decrease");
            prev = offset;
        }
    }

    #[test]
    fn unknown_leads_are_excluded_without_error() {
        let layout = ChartLayout::default();
        let (offsets, _) = layout.vertical_offsets(&names(&["II", "NEHB_D", "V3"]));
        assert_eq!(offsets.len(), 2);
        assert!(offsets.contains_key("II"));
        assert!(offsets.contains_key("V3"));
        assert!(!offsets.contains_key("NEHB_D"));
    }

    #[test]
    fn empty_lead_list_gives_empty_mapping() {
        let layout = ChartLayout::default();
        let (offsets, _) = layout.vertical_offsets(&[]);
        assert!(offsets.is_empty());
    }

    #[test]
    fn time_vector_scales_with_paper_speed() {
        let layout = ChartLayout::default();
        let (xs, width) = layout.time_vector(1000, 500.0);

        assert_eq!(width, 50.0);
        assert_eq!(xs.len(), 1000);
        assert_eq!(xs[0], 0.0);
        assert!((xs[1] - xs[0] - 0.05).abs() < 1e-6);
    }

    #[test]
    fn millimeter_space_applies_gain_above_baseline() {
        let layout = ChartLayout::default();
        let metadata = EcgMetadata {
            sig_name: names(&["I", "II"]),
            sig_len: 3,
            fs: 100.0,
        };
        // Column-major constructor: one column per lead.
        let samples = DMatrix::from_columns(&[
            nalgebra::DVector::from_vec(vec![0.0_f32, 1.0, -0.5]),
            nalgebra::DVector::from_vec(vec![0.5_f32, 0.0, 0.0]),
        ]);

        let (traces, height) = layout.to_millimeter_space(&samples, &metadata);
        let (offsets, _) = layout.vertical_offsets(&metadata.sig_name);

        assert_eq!(height, 240.0);
        assert_eq!(traces["I"], vec![offsets["I"], offsets["I"] + 10.0, offsets["I"] - 5.0]);
        assert_eq!(traces["II"][0], offsets["II"] + 5.0);
    }

    #[test]
    fn partial_record_keeps_full_chart_height() {
        let layout = ChartLayout::default();
        let metadata = EcgMetadata {
            sig_name: names(&["V2"]),
            sig_len: 2,
            fs: 100.0,
        };
        let samples = DMatrix::from_element(2, 1, 0.0_f32);

        let (traces, height) = layout.to_millimeter_space(&samples, &metadata);
        assert_eq!(height, 240.0);
        assert_eq!(traces.len(), 1);
    }

    #[test]
    fn layout_json_round_trip() {
        let layout = ChartLayout {
            mm_per_second: 50.0,
            leads_order: names(&["I", "II"]),
            ..ChartLayout::default()
        };
        let json = serde_json::to_string(&layout).expect("serialize");
        let parsed: ChartLayout = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, layout);
    }
}
