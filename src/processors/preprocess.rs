//! Sample cleaning: boundary trimming and pupil-channel smoothing.

use log::debug;
use thiserror::Error;

use crate::config::PreprocessingConfig;
use crate::core::loaders::{Sample, INVALID_PUPIL_DIAMETER};
use crate::core::transforms::{gaussian_filter1d, interpolate_gaps};

/// Errors that can occur during preprocessing.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("no sample has a valid pupil diameter in both eyes ({total} samples)")]
    EmptySignal { total: usize },
}

/// Trimmed samples with their smoothed pupil channels.
///
/// Position `i` of `samples`, `filtered_right` and `filtered_left` always
/// refers to the same instant; positions are dense and 0-based.
#[derive(Debug, Clone)]
pub struct CleanedRecording {
    pub samples: Vec<Sample>,
    pub filtered_right: Vec<f64>,
    pub filtered_left: Vec<f64>,
    /// Index in the raw sequence of `samples[0]`.
    pub offset: usize,
}

impl CleanedRecording {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Raw-sequence index of cleaned position `position`.
    #[inline]
    pub fn raw_index(&self, position: usize) -> usize {
        self.offset + position
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }
}

/// Inclusive `[first, last]` range of samples with both pupils valid at its ends.
///
/// # Errors
///
/// `EmptySignal` when no sample has both readings.
pub fn valid_bounds(samples: &[Sample]) -> Result<(usize, usize), PreprocessError> {
    let first = samples.iter().position(Sample::has_valid_pupils);
    let last = samples.iter().rposition(Sample::has_valid_pupils);

    match (first, last) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(PreprocessError::EmptySignal {
            total: samples.len(),
        }),
    }
}

/// Drop leading and trailing samples outside the valid bounds.
///
/// Interior samples are kept untouched, including interior sentinels.
pub fn trim_invalid_boundaries(samples: &[Sample]) -> Result<(usize, Vec<Sample>), PreprocessError> {
    let (first, last) = valid_bounds(samples)?;
    Ok((first, samples[first..=last].to_vec()))
}

/// Smooth one pupil channel, optionally filling interior sentinels first.
pub fn smooth_channel(
    timestamps: &[f64],
    values: &[f64],
    config: &PreprocessingConfig,
) -> Vec<f64> {
    if config.interpolate_gaps {
        let filled = interpolate_gaps(timestamps, values, INVALID_PUPIL_DIAMETER);
        gaussian_filter1d(&filled, config.smoothing_sigma, config.truncate)
    } else {
        gaussian_filter1d(values, config.smoothing_sigma, config.truncate)
    }
}

/// Trim, reindex and smooth a raw sample sequence.
pub fn preprocess(
    samples: &[Sample],
    config: &PreprocessingConfig,
) -> Result<CleanedRecording, PreprocessError> {
    let (offset, trimmed) = trim_invalid_boundaries(samples)?;

    debug!(
        "Trimmed {} leading and {} trailing samples, {} remain",
        offset,
        samples.len() - offset - trimmed.len(),
        trimmed.len()
    );

    let timestamps: Vec<f64> = trimmed.iter().map(|s| s.timestamp).collect();
    let right: Vec<f64> = trimmed.iter().map(|s| s.pupil_right).collect();
    let left: Vec<f64> = trimmed.iter().map(|s| s.pupil_left).collect();

    let filtered_right = smooth_channel(&timestamps, &right, config);
    let filtered_left = smooth_channel(&timestamps, &left, config);

    Ok(CleanedRecording {
        samples: trimmed,
        filtered_right,
        filtered_left,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64, left: f64, right: f64) -> Sample {
        Sample {
            timestamp: t,
            intensity_left: 0.0,
            intensity_right: 1.0,
            pupil_left: left,
            pupil_right: right,
        }
    }

    #[test]
    fn test_trim_boundaries() {
        let samples = vec![
            sample(0.0, -1.0, 4.0),
            sample(1.0, 4.0, -1.0),
            sample(2.0, 4.0, 4.1),
            sample(3.0, -1.0, 4.2),
            sample(4.0, 4.3, 4.3),
            sample(5.0, 4.3, -1.0),
        ];

        let (offset, trimmed) = trim_invalid_boundaries(&samples).unwrap();
        assert_eq!(offset, 2);
        assert_eq!(trimmed.len(), 3);
        assert!(trimmed.first().unwrap().has_valid_pupils());
        assert!(trimmed.last().unwrap().has_valid_pupils());
        // Interior sentinel retained untouched
        assert_eq!(trimmed[1], samples[3]);
    }

    #[test]
    fn test_empty_signal() {
        let samples = vec![sample(0.0, -1.0, 4.0), sample(1.0, 4.0, -1.0)];
        assert!(matches!(
            preprocess(&samples, &PreprocessingConfig::default()),
            Err(PreprocessError::EmptySignal { total: 2 })
        ));
        assert!(matches!(
            preprocess(&[], &PreprocessingConfig::default()),
            Err(PreprocessError::EmptySignal { total: 0 })
        ));
    }

    #[test]
    fn test_preprocess_aligned_lengths() {
        let samples: Vec<Sample> = (0..300)
            .map(|i| {
                let t = i as f64 * 0.01;
                let pupil = if i < 5 || i > 290 { -1.0 } else { 4.0 + (t * 3.0).sin() };
                sample(t, pupil, pupil)
            })
            .collect();

        let cleaned = preprocess(&samples, &PreprocessingConfig::default()).unwrap();
        assert_eq!(cleaned.offset, 5);
        assert_eq!(cleaned.len(), 286);
        assert_eq!(cleaned.filtered_right.len(), cleaned.len());
        assert_eq!(cleaned.filtered_left.len(), cleaned.len());
        assert_eq!(cleaned.raw_index(0), 5);
        assert_eq!(cleaned.samples[0], samples[5]);
    }

    #[test]
    fn test_constant_channel_is_noop() {
        let samples: Vec<Sample> = (0..120).map(|i| sample(i as f64, 3.5, 5.25)).collect();
        let cleaned = preprocess(&samples, &PreprocessingConfig::default()).unwrap();
        for (&l, &r) in cleaned.filtered_left.iter().zip(&cleaned.filtered_right) {
            assert!((l - 3.5).abs() < 1e-9);
            assert!((r - 5.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_interior_gap_filled_before_smoothing() {
        let mut samples: Vec<Sample> = (0..100).map(|i| sample(i as f64, 4.0, 4.0)).collect();
        samples[50].pupil_left = -1.0;

        let cleaned = preprocess(&samples, &PreprocessingConfig::default()).unwrap();
        assert!((cleaned.filtered_left[50] - 4.0).abs() < 1e-9);
        // Cleaned samples themselves are not modified
        assert_eq!(cleaned.samples[50].pupil_left, -1.0);

        let raw_config = PreprocessingConfig {
            interpolate_gaps: false,
            ..Default::default()
        };
        let raw = preprocess(&samples, &raw_config).unwrap();
        assert!(raw.filtered_left[50] < 4.0);
    }
}
