//! Data loader for RAPD recording CSV files.
//!
//! A recording is a table with one row per eye-tracker frame and the columns
//! `TimeStamp`, `Intensity_Left`, `Pupil_Diameter_Left`, `Intensity_Right`
//! and `Pupil_Diameter_Right`. Extra columns are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use log::debug;
use thiserror::Error;

/// Pupil-diameter sentinel meaning "no reading".
pub const INVALID_PUPIL_DIAMETER: f64 = -1.0;

/// Column names of the recording table.
pub const TIMESTAMP_COLUMN: &str = "TimeStamp";
pub const INTENSITY_LEFT_COLUMN: &str = "Intensity_Left";
pub const PUPIL_LEFT_COLUMN: &str = "Pupil_Diameter_Left";
pub const INTENSITY_RIGHT_COLUMN: &str = "Intensity_Right";
pub const PUPIL_RIGHT_COLUMN: &str = "Pupil_Diameter_Right";

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Not a CSV file: {0}")]
    NotCsv(PathBuf),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Timestamps not strictly increasing at data row {row}")]
    OutOfOrder { row: usize },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One recorded instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub intensity_left: f64,
    pub intensity_right: f64,
    pub pupil_left: f64,
    pub pupil_right: f64,
}

impl Sample {
    /// True when both eyes carry a real pupil reading.
    #[inline]
    pub fn has_valid_pupils(&self) -> bool {
        self.pupil_left != INVALID_PUPIL_DIAMETER && self.pupil_right != INVALID_PUPIL_DIAMETER
    }
}

/// A complete recording of one alternating light test.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    /// Samples in chronological order.
    pub samples: Vec<Sample>,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl Recording {
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples,
            source_path: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// File stem of the source path, used to name output artefacts.
    pub fn stem(&self) -> Option<String> {
        self.source_path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_string())
    }
}

/// Load a recording from a CSV file.
///
/// Rows with a missing, unparseable or non-finite field are dropped.
/// The remaining rows must have strictly increasing timestamps.
///
/// # Errors
///
/// Returns an error if the file is not a CSV, lacks one of the required
/// columns, is out of order, or has no usable rows.
pub fn load_recording_csv<P: AsRef<Path>>(path: P) -> Result<Recording> {
    let path = path.as_ref();

    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(LoaderError::NotCsv(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();

    let required = [
        TIMESTAMP_COLUMN,
        INTENSITY_LEFT_COLUMN,
        PUPIL_LEFT_COLUMN,
        INTENSITY_RIGHT_COLUMN,
        PUPIL_RIGHT_COLUMN,
    ];
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !col_map.contains_key(name))
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns(missing.join(", ")));
    }

    let idx = |name: &str| col_map[name];
    let (ts_idx, il_idx, pl_idx, ir_idx, pr_idx) = (
        idx(TIMESTAMP_COLUMN),
        idx(INTENSITY_LEFT_COLUMN),
        idx(PUPIL_LEFT_COLUMN),
        idx(INTENSITY_RIGHT_COLUMN),
        idx(PUPIL_RIGHT_COLUMN),
    );

    let mut samples: Vec<Sample> = Vec::with_capacity(4096);
    let mut dropped = 0usize;

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        let field = |i: usize| -> Option<f64> {
            record
                .get(i)
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        let parsed = (|| {
            Some(Sample {
                timestamp: field(ts_idx)?,
                intensity_left: field(il_idx)?,
                pupil_left: field(pl_idx)?,
                intensity_right: field(ir_idx)?,
                pupil_right: field(pr_idx)?,
            })
        })();

        let Some(sample) = parsed else {
            dropped += 1;
            continue;
        };

        if let Some(prev) = samples.last() {
            if sample.timestamp <= prev.timestamp {
                return Err(LoaderError::OutOfOrder { row });
            }
        }
        samples.push(sample);
    }

    if dropped > 0 {
        debug!("{}: dropped {} incomplete rows", path.display(), dropped);
    }

    if samples.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    debug!("{}: loaded {} samples", path.display(), samples.len());

    Ok(Recording {
        samples,
        source_path: Some(path.to_path_buf()),
    })
}
