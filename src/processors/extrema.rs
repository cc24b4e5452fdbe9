//! Per-repetition peak and valley extraction.
//!
//! For repetition `i` of a group, the peak is searched in the first
//! `peak_window_samples` samples after `change_indices[i]`, and the valley over
//! the whole interval `change_indices[i]..change_indices[i + 1]`. The same
//! windows are applied to both filtered pupil signals.

use thiserror::Error;

use crate::config::WindowConfig;
use crate::core::transforms::{window_max, window_min};

/// Errors that can occur while extracting cycle extrema.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtremaError {
    #[error("empty {kind} window [{start}, {end}) for a signal of {len} samples")]
    InsufficientWindow {
        kind: WindowKind,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("need at least {required} change indices, group has {available}")]
    InsufficientRepetitions { required: usize, available: usize },
}

/// Which of the two search windows failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Peak,
    Valley,
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowKind::Peak => write!(f, "peak"),
            WindowKind::Valley => write!(f, "valley"),
        }
    }
}

/// Peak and valley of one eye for one repetition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeExtrema {
    pub peak_value: f64,
    pub peak_index: usize,
    pub valley_value: f64,
    pub valley_index: usize,
}

/// Both eyes' extrema for one processed repetition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleExtrema {
    /// Repetition index into the group's change indices.
    pub repetition: usize,
    pub right: EyeExtrema,
    pub left: EyeExtrema,
}

/// Ordered per-eye series, one entry per processed repetition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EyeSeries {
    pub peaks: Vec<f64>,
    pub peak_indices: Vec<usize>,
    pub valleys: Vec<f64>,
    pub valley_indices: Vec<usize>,
}

impl EyeSeries {
    #[inline]
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    fn push(&mut self, e: &EyeExtrema) {
        self.peaks.push(e.peak_value);
        self.peak_indices.push(e.peak_index);
        self.valleys.push(e.valley_value);
        self.valley_indices.push(e.valley_index);
    }
}

/// All extrema of one group, split per eye.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupExtrema {
    pub cycles: Vec<CycleExtrema>,
    pub right: EyeSeries,
    pub left: EyeSeries,
}

impl GroupExtrema {
    pub fn from_cycles(cycles: Vec<CycleExtrema>) -> Self {
        let mut right = EyeSeries::default();
        let mut left = EyeSeries::default();
        for c in &cycles {
            right.push(&c.right);
            left.push(&c.left);
        }
        Self { cycles, right, left }
    }

    /// `(index, value)` of every peak and valley, both eyes.
    pub fn markers(&self) -> Vec<(usize, f64)> {
        let mut out = Vec::with_capacity(self.cycles.len() * 4);
        for series in [&self.right, &self.left] {
            out.extend(series.peak_indices.iter().copied().zip(series.peaks.iter().copied()));
            out.extend(series.valley_indices.iter().copied().zip(series.valleys.iter().copied()));
        }
        out
    }
}

/// Maximum of the peak window starting at `start`, clamped to the signal.
pub fn window_peak(signal: &[f64], start: usize, window: usize) -> Result<(f64, usize), ExtremaError> {
    let end = start.saturating_add(window);
    window_max(signal, start, end).ok_or(ExtremaError::InsufficientWindow {
        kind: WindowKind::Peak,
        start,
        end,
        len: signal.len(),
    })
}

/// Minimum over `start..end`.
pub fn window_valley(signal: &[f64], start: usize, end: usize) -> Result<(f64, usize), ExtremaError> {
    if end > signal.len() {
        return Err(ExtremaError::InsufficientWindow {
            kind: WindowKind::Valley,
            start,
            end,
            len: signal.len(),
        });
    }
    window_min(signal, start, end).ok_or(ExtremaError::InsufficientWindow {
        kind: WindowKind::Valley,
        start,
        end,
        len: signal.len(),
    })
}

fn eye_extrema(
    signal: &[f64],
    start: usize,
    end: usize,
    peak_window: usize,
) -> Result<EyeExtrema, ExtremaError> {
    let (peak_value, peak_index) = window_peak(signal, start, peak_window)?;
    let (valley_value, valley_index) = window_valley(signal, start, end)?;
    Ok(EyeExtrema {
        peak_value,
        peak_index,
        valley_value,
        valley_index,
    })
}

/// Repetition indices to process for a group.
///
/// After a dark gap the first `dark_lead_in_skip` repetitions are dropped.
pub fn repetition_range(preceded_by_dark: bool, config: &WindowConfig) -> std::ops::Range<usize> {
    let start = if preceded_by_dark {
        config.dark_lead_in_skip.min(config.repetitions)
    } else {
        0
    };
    start..config.repetitions
}

/// Extract peak/valley pairs for every processed repetition of a group.
///
/// # Errors
///
/// `InsufficientRepetitions` when `change_indices` cannot close the last
/// repetition window, `InsufficientWindow` when a window falls outside the
/// filtered signals.
pub fn extract_cycle_extrema(
    change_indices: &[usize],
    preceded_by_dark: bool,
    filtered_right: &[f64],
    filtered_left: &[f64],
    config: &WindowConfig,
) -> Result<GroupExtrema, ExtremaError> {
    let range = repetition_range(preceded_by_dark, config);

    let required = range.end + 1;
    if change_indices.len() < required {
        return Err(ExtremaError::InsufficientRepetitions {
            required,
            available: change_indices.len(),
        });
    }

    let cycles = range
        .map(|i| {
            let (start, end) = (change_indices[i], change_indices[i + 1]);
            Ok(CycleExtrema {
                repetition: i,
                right: eye_extrema(filtered_right, start, end, config.peak_window_samples)?,
                left: eye_extrema(filtered_left, start, end, config.peak_window_samples)?,
            })
        })
        .collect::<Result<Vec<_>, ExtremaError>>()?;

    Ok(GroupExtrema::from_cycles(cycles))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sawtooth that drops from 10 at each change to 10 - depth at the next.
    fn sawtooth(changes: &[usize], depth: f64) -> Vec<f64> {
        let len = *changes.last().unwrap() + 1;
        let mut out = vec![10.0; len];
        for w in changes.windows(2) {
            let span = (w[1] - w[0]) as f64;
            for i in w[0]..w[1] {
                out[i] = 10.0 - depth * (i - w[0]) as f64 / span;
            }
        }
        out
    }

    fn changes(count: usize, spacing: usize) -> Vec<usize> {
        (0..count).map(|i| i * spacing).collect()
    }

    #[test]
    fn test_six_windows_without_dark() {
        let ci = changes(13, 200);
        let signal = sawtooth(&ci, 2.0);
        let extrema =
            extract_cycle_extrema(&ci, false, &signal, &signal, &WindowConfig::default()).unwrap();

        assert_eq!(extrema.cycles.len(), 6);
        assert_eq!(extrema.right.len(), 6);
        assert_eq!(extrema.left.len(), 6);
        assert_eq!(extrema.cycles[0].repetition, 0);
        assert_eq!(extrema.cycles[5].repetition, 5);

        let c = extrema.cycles[2].right;
        assert_eq!(c.peak_index, 400);
        assert!((c.peak_value - 10.0).abs() < 1e-12);
        assert_eq!(c.valley_index, 599);
    }

    #[test]
    fn test_four_windows_after_dark() {
        let ci = changes(7, 200);
        let signal = sawtooth(&ci, 2.0);
        let extrema =
            extract_cycle_extrema(&ci, true, &signal, &signal, &WindowConfig::default()).unwrap();

        assert_eq!(extrema.cycles.len(), 4);
        let reps: Vec<usize> = extrema.cycles.iter().map(|c| c.repetition).collect();
        assert_eq!(reps, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_peak_window_limited() {
        // Maximum outside the first 100 samples is not picked up
        let mut signal = vec![5.0; 400];
        signal[10] = 6.0;
        signal[150] = 9.0;
        let (value, idx) = window_peak(&signal, 0, 100).unwrap();
        assert_eq!((value, idx), (6.0, 10));

        let (value, idx) = window_valley(&signal, 0, 400).unwrap();
        assert_eq!((value, idx), (5.0, 0));
    }

    #[test]
    fn test_peak_window_clamped_to_signal() {
        let signal = vec![1.0, 3.0, 2.0];
        assert_eq!(window_peak(&signal, 1, 100).unwrap(), (3.0, 1));
        assert!(matches!(
            window_peak(&signal, 3, 100),
            Err(ExtremaError::InsufficientWindow { kind: WindowKind::Peak, .. })
        ));
    }

    #[test]
    fn test_empty_valley_window() {
        let signal = vec![1.0; 10];
        assert!(matches!(
            window_valley(&signal, 4, 4),
            Err(ExtremaError::InsufficientWindow { kind: WindowKind::Valley, .. })
        ));
        assert!(window_valley(&signal, 4, 11).is_err());
    }

    #[test]
    fn test_insufficient_repetitions() {
        let ci = changes(6, 200);
        let signal = vec![1.0; 1200];
        let err = extract_cycle_extrema(&ci, false, &signal, &signal, &WindowConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            ExtremaError::InsufficientRepetitions {
                required: 7,
                available: 6
            }
        );
    }

    #[test]
    fn test_markers_cover_both_eyes() {
        let ci = changes(13, 200);
        let signal = sawtooth(&ci, 2.0);
        let extrema =
            extract_cycle_extrema(&ci, false, &signal, &signal, &WindowConfig::default()).unwrap();
        assert_eq!(extrema.markers().len(), 6 * 4);
    }
}
