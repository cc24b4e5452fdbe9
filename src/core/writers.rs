//! CSV writers for scoring results.
//!
//! - Recordings in the loader's column layout
//! - Aggregated score points (`x_log_units,rapd_score`)
//! - Per-group outcomes, including the reason a group was skipped

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::loaders::{
    Sample, INTENSITY_LEFT_COLUMN, INTENSITY_RIGHT_COLUMN, PUPIL_LEFT_COLUMN, PUPIL_RIGHT_COLUMN,
    TIMESTAMP_COLUMN,
};
use crate::processors::aggregation::ScorePoint;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a CSV writer over a buffered file for the given path.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn write_rows<I, R>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let path_str = path.display().to_string();
    let mut writer = create_csv_writer(path)?;

    writer
        .write_record(header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write samples as a recording CSV readable by
/// [`load_recording_csv`](super::loaders::load_recording_csv).
///
/// Values are written in their shortest exact form, so finite samples load
/// back bit for bit.
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
pub fn write_recording_csv(path: &Path, samples: &[Sample]) -> Result<()> {
    write_rows(
        path,
        &[
            TIMESTAMP_COLUMN,
            INTENSITY_LEFT_COLUMN,
            PUPIL_LEFT_COLUMN,
            INTENSITY_RIGHT_COLUMN,
            PUPIL_RIGHT_COLUMN,
        ],
        samples.iter().map(|s| {
            [
                s.timestamp.to_string(),
                s.intensity_left.to_string(),
                s.pupil_left.to_string(),
                s.intensity_right.to_string(),
                s.pupil_right.to_string(),
            ]
        }),
    )
}

/// Write aggregated score points to CSV.
///
/// One row per point with headers `x_log_units,rapd_score`, in the order
/// given.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `points` - Aggregated score points
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use rapd_pipeline::core::writers::write_score_points_csv;
/// use rapd_pipeline::processors::aggregation::ScorePoint;
/// use std::path::Path;
///
/// let points = vec![ScorePoint { x: 0.3, y: -1.2 }];
/// write_score_points_csv(Path::new("points.csv"), &points).unwrap();
/// ```
pub fn write_score_points_csv(path: &Path, points: &[ScorePoint]) -> Result<()> {
    write_rows(
        path,
        &["x_log_units", "rapd_score"],
        points
            .iter()
            .map(|p| [format!("{:.2}", p.x), format!("{:.6}", p.y)]),
    )
}

/// One line of the per-group results table.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResultRow {
    /// Pattern key as `[right, left, right, left]` intensities.
    pub key_tokens: [f64; 4],
    pub preceded_by_dark: bool,
    pub repetitions: usize,
    /// Score of the group, or the reason it was skipped.
    pub outcome: std::result::Result<f64, String>,
}

/// Write one row per illumination group.
///
/// Columns are the four pattern key tokens, `preceded_by_dark`,
/// `repetitions`, then `score` for scored groups or `error` for skipped
/// ones. The unused column of the pair is left empty.
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
pub fn write_group_results_csv(path: &Path, rows: &[GroupResultRow]) -> Result<()> {
    let rows = rows.iter().map(|r| {
        let mut row: Vec<String> = r.key_tokens.iter().map(|t| t.to_string()).collect();
        row.push(r.preceded_by_dark.to_string());
        row.push(r.repetitions.to_string());
        match &r.outcome {
            Ok(score) => {
                row.push(format!("{:.6}", score));
                row.push(String::new());
            }
            Err(reason) => {
                row.push(String::new());
                row.push(reason.clone());
            }
        }
        row
    });

    write_rows(
        path,
        &[
            "right_first",
            "left_first",
            "right_second",
            "left_second",
            "preceded_by_dark",
            "repetitions",
            "score",
            "error",
        ],
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::load_recording_csv;
    use crate::core::synthetic::{StimulusBlock, SyntheticProtocol};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_recording_csv_loads_back() {
        let samples = SyntheticProtocol::new()
            .block(StimulusBlock::new(1.0, 0.3, 1))
            .generate();

        let dir = tempdir().unwrap();
        let path = dir.path().join("recording.csv");
        write_recording_csv(&path, &samples).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(
            "TimeStamp,Intensity_Left,Pupil_Diameter_Left,Intensity_Right,Pupil_Diameter_Right"
        ));

        let recording = load_recording_csv(&path).unwrap();
        assert_eq!(recording.len(), samples.len());
        assert_eq!(recording.samples[250].intensity_left, 0.3);
        assert_eq!(recording.samples, samples);
    }

    #[test]
    fn test_write_recording_csv_keeps_full_precision() {
        let samples: Vec<Sample> = [1.123456, 1.1234567, 1.2]
            .iter()
            .enumerate()
            .map(|(i, &t)| Sample {
                timestamp: t,
                intensity_left: 0.16,
                intensity_right: 1.0 / 3.0,
                pupil_left: 4.0 / 3.0 + i as f64,
                pupil_right: 5.123456789,
            })
            .collect();

        let dir = tempdir().unwrap();
        let path = dir.path().join("fine.csv");
        write_recording_csv(&path, &samples).unwrap();

        let recording = load_recording_csv(&path).unwrap();
        assert_eq!(recording.samples, samples);
    }

    #[test]
    fn test_write_score_points_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let points = vec![ScorePoint { x: 0.0, y: 1.5 }, ScorePoint { x: -0.3, y: -2.25 }];

        write_score_points_csv(&path, &points).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "x_log_units,rapd_score");
        assert_eq!(lines.len(), 3); // header + 2 data rows
        assert_eq!(lines[1], "0.00,1.500000");
        assert_eq!(lines[2], "-0.30,-2.250000");
    }

    #[test]
    fn test_write_score_points_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subdir").join("nested").join("points.csv");

        write_score_points_csv(&path, &[ScorePoint { x: 0.3, y: 0.0 }]).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_group_results_csv() {
        let rows = vec![
            GroupResultRow {
                key_tokens: [1.0, 0.0, 0.0, 1.0],
                preceded_by_dark: true,
                repetitions: 6,
                outcome: Ok(1.25),
            },
            GroupResultRow {
                key_tokens: [1.0, 0.0, 0.0, 0.3],
                preceded_by_dark: true,
                repetitions: 2,
                outcome: Err("need 7 change indices, found 5".to_string()),
            },
        ];

        let dir = tempdir().unwrap();
        let path = dir.path().join("groups.csv");
        write_group_results_csv(&path, &rows).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 8);
        assert_eq!(&headers[6], "score");

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);

        // Scored group: score filled, error empty
        assert_eq!(&records[0][4], "true");
        assert_eq!(&records[0][5], "6");
        assert_eq!(&records[0][6], "1.250000");
        assert!(records[0][7].is_empty());

        // Skipped group: score empty, error filled
        assert_eq!(&records[1][3], "0.3");
        assert!(records[1][6].is_empty());
        assert_eq!(&records[1][7], "need 7 change indices, found 5");
    }
}
