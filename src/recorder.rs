// src/recorder.rs
//! Dataset persistence.
//!
//! Native `.lfd` layout, one field per CRLF-terminated line:
//!
//! ```text
//! Datalogger v1.0
//! <title>
//! <capacity>
//! <magnitude>,<unit code>
//! <display min>,<display max>
//! <sample 0>
//! ...
//! <sample capacity-1>
//! ```
//!
//! The `.csv` export (`Samples,Values` then `index,value`) is write-only.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::validate_range;
use crate::drivers::{ConfigError, FormatError, IntervalUnit, Sample, SampleInterval};

pub const FORMAT_TAG: &str = "Datalogger v1.0";
pub const NATIVE_EXTENSION: &str = "lfd";
pub const EXPORT_EXTENSION: &str = "csv";

const EOL: &str = "\r\n";
const HEADER_LINES: usize = 5;

/// Everything needed to restore a buffer and its display settings.
#[derive(Clone, Debug, PartialEq)]
pub struct PersistedDataset {
    pub title: String,
    pub interval: SampleInterval,
    pub display_min: f64,
    pub display_max: f64,
    /// One value per buffer slot; the length is the capacity.
    pub samples: Vec<f64>,
}

impl PersistedDataset {
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Samples paired with their slot index.
    pub fn indexed(&self) -> impl Iterator<Item = Sample> + '_ {
        self.samples.iter().enumerate().map(|(i, &value)| Sample {
            index: i as u64,
            value,
        })
    }

    pub fn save_to_string(&self) -> String {
        // the title occupies exactly one line
        let title: String = self
            .title
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .collect();
        let mut out = String::with_capacity(32 * (HEADER_LINES + self.samples.len()));
        out.push_str(FORMAT_TAG);
        out.push_str(EOL);
        out.push_str(&title);
        out.push_str(EOL);
        out.push_str(&format!("{}{EOL}", self.capacity()));
        out.push_str(&format!(
            "{},{}{EOL}",
            self.interval.magnitude,
            self.interval.unit.code()
        ));
        out.push_str(&format!("{},{}{EOL}", self.display_min, self.display_max));
        for value in &self.samples {
            out.push_str(&format!("{value}{EOL}"));
        }
        out
    }

    /// Parses a complete dataset. Anything short of a full, well-formed file
    /// is rejected.
    pub fn load_from_str(text: &str) -> Result<Self, FormatError> {
        // `lines` strips the terminator; only the title keeps its spacing
        let raw_lines: Vec<&str> = text.lines().collect();
        let lines: Vec<&str> = raw_lines.iter().map(|l| l.trim()).collect();
        let field = |line: usize, what: &'static str| {
            lines
                .get(line - 1)
                .copied()
                .ok_or(FormatError::MissingLine { line, what })
        };

        let tag = field(1, "format tag")?;
        if tag != FORMAT_TAG {
            return Err(FormatError::BadTag(tag.to_owned()));
        }
        field(2, "title")?;
        let title = raw_lines[1].to_owned();

        let raw = field(3, "capacity")?;
        let capacity: usize = raw.parse().map_err(|_| FormatError::BadNumber {
            line: 3,
            value: raw.to_owned(),
        })?;
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity.into());
        }

        let (magnitude, code) = split_pair(4, field(4, "interval")?)?;
        let magnitude: u32 = magnitude.parse().map_err(|_| FormatError::BadNumber {
            line: 4,
            value: magnitude.to_owned(),
        })?;
        let unit = IntervalUnit::from_code(code).ok_or_else(|| FormatError::BadUnit {
            line: 4,
            code: code.to_owned(),
        })?;
        let interval = SampleInterval::new(magnitude, unit)?;

        let (min, max) = split_pair(5, field(5, "display range")?)?;
        let display_min = parse_value(5, min)?;
        let display_max = parse_value(5, max)?;
        validate_range(display_min, display_max)?;

        let last = HEADER_LINES.saturating_add(capacity);
        let samples = ((HEADER_LINES + 1)..=last)
            .map(|line| parse_value(line, field(line, "sample")?))
            .collect::<Result<Vec<f64>, FormatError>>()?;
        if lines.iter().skip(last).any(|rest| !rest.is_empty()) {
            return Err(FormatError::TrailingData { expected: capacity });
        }

        Ok(Self {
            title,
            interval,
            display_min,
            display_max,
            samples,
        })
    }

    pub fn csv_export(&self) -> String {
        let mut out = format!("Samples,Values{EOL}");
        for sample in self.indexed() {
            out.push_str(&format!("{},{}{EOL}", sample.index, sample.value));
        }
        out
    }

    /// Writes the native file (adding `.lfd` when `path` has no extension)
    /// and, on request, the CSV export next to it. Returns the native path.
    pub fn save_to_path(&self, path: &Path, export_csv: bool) -> Result<PathBuf, FormatError> {
        let native = native_path(path);
        write_file(&native, &self.save_to_string())?;
        log::info!("dataset saved to {}", native.display());
        if export_csv {
            let export = export_path(&native);
            write_file(&export, &self.csv_export())?;
            log::info!("csv export saved to {}", export.display());
        }
        Ok(native)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, FormatError> {
        let text = fs::read_to_string(path)?;
        let dataset = Self::load_from_str(&text)?;
        log::info!(
            "loaded {} samples from {}",
            dataset.capacity(),
            path.display()
        );
        Ok(dataset)
    }
}

/// `path` with the native extension added if it has none.
pub fn native_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(NATIVE_EXTENSION)
    }
}

/// Export path derived from a native path.
pub fn export_path(native: &Path) -> PathBuf {
    native.with_extension(EXPORT_EXTENSION)
}

fn write_file(path: &Path, contents: &str) -> Result<(), FormatError> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(contents.as_bytes())?;
    w.flush()?;
    Ok(())
}

fn split_pair(line: usize, raw: &str) -> Result<(&str, &str), FormatError> {
    raw.split_once(',')
        .map(|(a, b)| (a.trim(), b.trim()))
        .ok_or_else(|| FormatError::BadField {
            line,
            value: raw.to_owned(),
        })
}

fn parse_value(line: usize, raw: &str) -> Result<f64, FormatError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(FormatError::BadNumber {
            line,
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dataset() -> PersistedDataset {
        PersistedDataset {
            title: "Thermistor".into(),
            interval: SampleInterval::new(250, IntervalUnit::Milliseconds).unwrap(),
            display_min: -1.5,
            display_max: 6.0,
            samples: vec![0.0, 2.5, 4.9951171875, 0.1],
        }
    }

    #[test]
    fn native_layout_is_crlf_lines() {
        let text = dataset().save_to_string();
        assert_eq!(
            text,
            "Datalogger v1.0\r\nThermistor\r\n4\r\n250,m\r\n-1.5,6\r\n0\r\n2.5\r\n4.9951171875\r\n0.1\r\n"
        );
    }

    #[test]
    fn load_restores_what_save_wrote() {
        let original = dataset();
        let loaded = PersistedDataset::load_from_str(&original.save_to_string()).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn partial_file_is_rejected() {
        let text = dataset().save_to_string();
        let truncated: String = text.split_inclusive("\r\n").take(7).collect();
        assert!(matches!(
            PersistedDataset::load_from_str(&truncated),
            Err(FormatError::MissingLine { line: 8, what: "sample" })
        ));
        assert!(matches!(
            PersistedDataset::load_from_str("Datalogger v1.0\r\n"),
            Err(FormatError::MissingLine { line: 2, .. })
        ));
    }

    #[test]
    fn header_mismatches_are_rejected() {
        let text = dataset().save_to_string();
        let bad_unit = text.replace("250,m", "250,h");
        assert!(matches!(
            PersistedDataset::load_from_str(&bad_unit),
            Err(FormatError::BadUnit { line: 4, .. })
        ));
        let bad_tag = text.replace("Datalogger v1.0", "Oscilloscope v2");
        assert!(matches!(
            PersistedDataset::load_from_str(&bad_tag),
            Err(FormatError::BadTag(_))
        ));
        let out_of_range = text.replace("250,m", "5000,m");
        assert!(matches!(
            PersistedDataset::load_from_str(&out_of_range),
            Err(FormatError::Invalid(ConfigError::InvalidInterval { .. }))
        ));
    }

    #[test]
    fn non_numeric_sample_is_rejected() {
        let text = dataset().save_to_string().replace("\r\n2.5\r\n", "\r\nabc\r\n");
        assert!(matches!(
            PersistedDataset::load_from_str(&text),
            Err(FormatError::BadNumber { line: 7, .. })
        ));
    }

    #[test]
    fn extra_samples_are_rejected_but_blank_tail_is_fine() {
        let text = dataset().save_to_string();
        assert!(PersistedDataset::load_from_str(&format!("{text}\r\n\r\n")).is_ok());
        assert!(matches!(
            PersistedDataset::load_from_str(&format!("{text}1.0\r\n")),
            Err(FormatError::TrailingData { expected: 4 })
        ));
    }

    #[test]
    fn multi_line_title_is_flattened() {
        let mut data = dataset();
        data.title = "two\nlines".into();
        let loaded = PersistedDataset::load_from_str(&data.save_to_string()).unwrap();
        assert_eq!(loaded.title, "two lines");
    }

    #[test]
    fn title_spacing_survives_a_round_trip() {
        let mut data = dataset();
        data.title = "  padded \t".into();
        let loaded = PersistedDataset::load_from_str(&data.save_to_string()).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn csv_export_rows() {
        let csv = dataset().csv_export();
        let rows: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(rows[0], "Samples,Values");
        assert_eq!(rows[1], "0,0");
        assert_eq!(rows[2], "1,2.5");
        assert_eq!(rows.len(), 6); // header, 4 rows, empty tail
    }

    #[test]
    fn save_and_load_files() {
        let dir = tempdir().unwrap();
        let native = dataset()
            .save_to_path(&dir.path().join("run"), true)
            .unwrap();
        assert_eq!(native, dir.path().join("run.lfd"));
        assert!(dir.path().join("run.csv").exists());
        assert_eq!(PersistedDataset::load_from_path(&native).unwrap(), dataset());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            PersistedDataset::load_from_path(&dir.path().join("nope.lfd")),
            Err(FormatError::Io(_))
        ));
    }
}
