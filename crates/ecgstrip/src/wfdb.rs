//! WFDB record decoding: `.hea` header parsing and format-16 sample reading.
//!
//! Covers the subset of the WFDB specification that PTB-XL records use: a
//! single interleaved little-endian 16-bit data file shared by all leads.
//! Digital samples are converted to millivolts as `(raw - baseline) / gain`.

use std::path::Path;

use nalgebra::DMatrix;

use crate::record::{EcgMetadata, EcgRecord};

/// WFDB-defined fallback when a header specifies a zero ADC gain.
const DEFAULT_ADC_GAIN: f32 = 200.0;

/// One signal line of a WFDB header.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    /// Data file holding this signal's samples.
    pub file_name: String,
    /// Sample encoding format (only 16 is supported here).
    pub format: u32,
    /// ADC units per physical unit.
    pub adc_gain: f32,
    /// Digital value corresponding to 0 physical units.
    pub baseline: i32,
    /// Physical units, `mV` unless the header says otherwise.
    pub units: String,
    /// Signal description; for ECG records this is the lead name.
    pub description: String,
}

/// Parsed WFDB header.
#[derive(Debug, Clone, PartialEq)]
pub struct WfdbHeader {
    pub record_name: String,
    pub n_sig: usize,
    pub fs: f32,
    pub sig_len: usize,
    pub signals: Vec<SignalSpec>,
}

impl WfdbHeader {
    /// Parse header text. `#` comment lines and blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let record_line = lines.next().ok_or("empty header")?;
        let fields: Vec<&str> = record_line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(format!(
                "record line must be 'name n_sig fs sig_len', got '{record_line}'"
            ));
        }

        let record_name = fields[0].to_string();
        let n_sig: usize = fields[1]
            .parse()
            .map_err(|_| format!("invalid signal count '{}'", fields[1]))?;
        // The frequency field may carry a counter frequency after '/'.
        let fs_str = fields[2].split('/').next().unwrap_or(fields[2]);
        let fs: f32 = fs_str
            .parse()
            .map_err(|_| format!("invalid sampling frequency '{}'", fields[2]))?;
        let sig_len: usize = fields[3]
            .parse()
            .map_err(|_| format!("invalid signal length '{}'", fields[3]))?;

        let mut signals = Vec::with_capacity(n_sig);
        for idx in 0..n_sig {
            let line = lines
                .next()
                .ok_or_else(|| format!("header ends before signal line {idx}"))?;
            signals.push(parse_signal_line(line, idx)?);
        }

        Ok(Self {
            record_name,
            n_sig,
            fs,
            sig_len,
            signals,
        })
    }
}

/// Parse one signal line:
/// `file format gain(baseline)/units adc_res adc_zero init_val cksum blk desc`.
fn parse_signal_line(line: &str, idx: usize) -> Result<SignalSpec, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(format!("signal line {idx} too short: '{line}'"));
    }

    let format: u32 = fields[1]
        .parse()
        .map_err(|_| format!("invalid format '{}' on signal line {idx}", fields[1]))?;

    let (gain, explicit_baseline, units) = parse_gain_field(fields[2], idx)?;
    let adc_zero: i32 = fields
        .get(4)
        .map(|f| f.parse())
        .transpose()
        .map_err(|_| format!("invalid adc_zero on signal line {idx}"))?
        .unwrap_or(0);

    // The description is free text after the fixed fields.
    let description = if fields.len() > 8 {
        fields[8..].join(" ")
    } else {
        format!("ch{idx}")
    };

    Ok(SignalSpec {
        file_name: fields[0].to_string(),
        format,
        adc_gain: if gain == 0.0 { DEFAULT_ADC_GAIN } else { gain },
        // Baseline defaults to the ADC zero when not given explicitly.
        baseline: explicit_baseline.unwrap_or(adc_zero),
        units,
        description,
    })
}

/// Split a `gain(baseline)/units` field into its parts.
fn parse_gain_field(field: &str, idx: usize) -> Result<(f32, Option<i32>, String), String> {
    let (gain_part, units) = match field.split_once('/') {
        Some((g, u)) => (g, u.to_string()),
        None => (field, "mV".to_string()),
    };

    let (gain_str, baseline) = match gain_part.split_once('(') {
        Some((g, rest)) => {
            let baseline_str = rest
                .strip_suffix(')')
                .ok_or_else(|| format!("unclosed baseline on signal line {idx}"))?;
            let baseline: i32 = baseline_str
                .parse()
                .map_err(|_| format!("invalid baseline '{baseline_str}' on signal line {idx}"))?;
            (g, Some(baseline))
        }
        None => (gain_part, None),
    };

    let gain: f32 = gain_str
        .parse()
        .map_err(|_| format!("invalid gain '{gain_str}' on signal line {idx}"))?;

    Ok((gain, baseline, units))
}

/// Read a WFDB record given its path without suffix (`.hea`/`.dat` are
/// appended). Returns the sample matrix in millivolts plus metadata.
pub fn read_record(path_no_suffix: &Path) -> Result<EcgRecord, Box<dyn std::error::Error>> {
    let header_path = path_no_suffix.with_extension("hea");
    let text = std::fs::read_to_string(&header_path)?;
    let header = WfdbHeader::parse(&text)?;

    if let Some(bad) = header.signals.iter().find(|s| s.format != 16) {
        return Err(format!("unsupported WFDB format {} (only 16)", bad.format).into());
    }
    if header
        .signals
        .iter()
        .any(|s| s.file_name != header.signals[0].file_name)
    {
        return Err("multi-file WFDB records are not supported".into());
    }

    let data_path = path_no_suffix.with_extension("dat");
    let bytes = std::fs::read(&data_path)?;
    let expected = header.sig_len * header.n_sig * 2;
    if bytes.len() < expected {
        return Err(format!(
            "data file {} truncated: {} bytes, expected {}",
            data_path.display(),
            bytes.len(),
            expected
        )
        .into());
    }

    let samples = DMatrix::from_fn(header.sig_len, header.n_sig, |i, j| {
        let at = (i * header.n_sig + j) * 2;
        let raw = i16::from_le_bytes([bytes[at], bytes[at + 1]]) as f32;
        let spec = &header.signals[j];
        (raw - spec.baseline as f32) / spec.adc_gain
    });

    tracing::debug!(
        "decoded record {}: {} leads, {} samples at {} Hz",
        header.record_name,
        header.n_sig,
        header.sig_len,
        header.fs
    );

    let metadata = EcgMetadata {
        sig_name: header.signals.iter().map(|s| s.description.clone()).collect(),
        sig_len: header.sig_len,
        fs: header.fs,
    };

    Ok(EcgRecord { samples, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "\
00001_lr 2 100 4
00001_lr.dat 16 1000.0(0)/mV 16 0 -119 23 0 I
00001_lr.dat 16 500(10)/mV 16 0 -55 99 0 II
# age: 56 sex: F
";

    #[test]
    fn parses_ptb_xl_shaped_header() {
        let header = WfdbHeader::parse(HEADER).expect("parse");

        assert_eq!(header.record_name, "00001_lr");
        assert_eq!(header.n_sig, 2);
        assert_eq!(header.fs, 100.0);
        assert_eq!(header.sig_len, 4);

        assert_eq!(header.signals[0].adc_gain, 1000.0);
        assert_eq!(header.signals[0].baseline, 0);
        assert_eq!(header.signals[0].description, "I");
        assert_eq!(header.signals[1].adc_gain, 500.0);
        assert_eq!(header.signals[1].baseline, 10);
        assert_eq!(header.signals[1].units, "mV");
    }

    #[test]
    fn zero_gain_falls_back_to_wfdb_default() {
        let spec = parse_signal_line("x.dat 16 0/mV 16 0 0 0 0 V1", 0).expect("parse");
        assert_eq!(spec.adc_gain, DEFAULT_ADC_GAIN);
    }

    #[test]
    fn rejects_short_record_line() {
        let err = WfdbHeader::parse("00001_lr 2 100").expect_err("must fail");
        assert!(err.contains("record line"));
    }

    #[test]
    fn decodes_format16_samples_to_millivolts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("00001_lr");

        std::fs::write(base.with_extension("hea"), HEADER).expect("write hea");

        // Interleaved frames: (lead I, lead II) per sample instant.
        let raw: [i16; 8] = [0, 10, 1000, 510, -500, -490, 2000, 1010];
        let mut dat = std::fs::File::create(base.with_extension("dat")).expect("create dat");
        for v in raw {
            dat.write_all(&v.to_le_bytes()).expect("write");
        }
        drop(dat);

        let record = read_record(&base).expect("read record");
        assert_eq!(record.metadata.sig_name, vec!["I", "II"]);
        assert_eq!(record.metadata.sig_len, 4);
        assert_eq!(record.samples.nrows(), 4);
        assert_eq!(record.samples.ncols(), 2);

        // Lead I: gain 1000, baseline 0.
        assert_eq!(record.samples[(0, 0)], 0.0);
        assert_eq!(record.samples[(1, 0)], 1.0);
        assert_eq!(record.samples[(2, 0)], -0.5);
        // Lead II: gain 500, baseline 10.
        assert_eq!(record.samples[(0, 1)], 0.0);
        assert_eq!(record.samples[(1, 1)], 1.0);
        assert_eq!(record.samples[(3, 1)], 2.0);
    }

    #[test]
    fn truncated_data_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("00001_lr");

        std::fs::write(base.with_extension("hea"), HEADER).expect("write hea");
        std::fs::write(base.with_extension("dat"), [0u8; 6]).expect("write dat");

        let err = read_record(&base).expect_err("must fail");
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn unsupported_format_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("rec");

        std::fs::write(
            base.with_extension("hea"),
            "rec 1 100 2\nrec.dat 212 1000(0)/mV 12 0 0 0 0 I\n",
        )
        .expect("write hea");
        std::fs::write(base.with_extension("dat"), [0u8; 4]).expect("write dat");

        let err = read_record(&base).expect_err("must fail");
        assert!(err.to_string().contains("unsupported"));
    }
}
