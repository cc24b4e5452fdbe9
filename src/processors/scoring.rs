//! Contraction amplitudes and the per-group RAPD score.
//!
//! Repetitions alternate the illuminated eye. For a pattern that opens on the
//! right eye, even positions of the processed series feed the right eye's
//! contraction amplitudes (measured on the right pupil) and odd positions the
//! left eye's (measured on the left pupil); a left-first pattern swaps roles.
//!
//! `score = 10 * ln(mean(CA_right) / mean(CA_left))`

use thiserror::Error;

use crate::config::WindowConfig;
use crate::core::transforms::mean;
use crate::processors::extrema::{extract_cycle_extrema, ExtremaError, EyeSeries, GroupExtrema};
use crate::processors::segmentation::{IlluminationGroup, PatternKey};

/// Errors that can occur while scoring a group.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    #[error(transparent)]
    Extrema(#[from] ExtremaError),

    #[error("degenerate contraction amplitude: {reason}")]
    DegenerateAmplitude { reason: String },
}

impl ScoreError {
    fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateAmplitude {
            reason: reason.into(),
        }
    }
}

/// Fractional constriction from `peak` to `valley`.
pub fn contraction_amplitude(peak: f64, valley: f64) -> Result<f64, ScoreError> {
    if peak == 0.0 {
        return Err(ScoreError::degenerate("peak diameter is zero"));
    }
    Ok((peak - valley) / peak)
}

/// Contraction amplitudes per stimulated eye, in repetition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractionAmplitudes {
    pub right: Vec<f64>,
    pub left: Vec<f64>,
}

/// Split the processed repetitions between the two eyes and compute each
/// eye's contraction amplitudes.
pub fn contraction_amplitudes(
    right: &EyeSeries,
    left: &EyeSeries,
    right_eye_first: bool,
) -> Result<ContractionAmplitudes, ScoreError> {
    let mut out = ContractionAmplitudes::default();
    let count = right.len().min(left.len());

    for pos in 0..count {
        let right_turn = (pos % 2 == 0) == right_eye_first;
        if right_turn {
            out.right
                .push(contraction_amplitude(right.peaks[pos], right.valleys[pos])?);
        } else {
            out.left
                .push(contraction_amplitude(left.peaks[pos], left.valleys[pos])?);
        }
    }

    Ok(out)
}

/// Signed log-ratio of the two eyes' mean contraction amplitudes.
pub fn rapd_score(amplitudes: &ContractionAmplitudes) -> Result<f64, ScoreError> {
    let right = mean(&amplitudes.right)
        .ok_or_else(|| ScoreError::degenerate("no right-eye contraction amplitudes"))?;
    let left = mean(&amplitudes.left)
        .ok_or_else(|| ScoreError::degenerate("no left-eye contraction amplitudes"))?;

    let ratio = right / left;
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(ScoreError::degenerate(format!(
            "amplitude ratio {right} / {left} has no real logarithm"
        )));
    }

    Ok(10.0 * ratio.ln())
}

/// Score plus the intermediate values it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupScore {
    pub key: PatternKey,
    pub score: f64,
    pub amplitudes: ContractionAmplitudes,
    pub extrema: GroupExtrema,
}

/// Score already-extracted extrema.
pub fn score_extrema(
    key: PatternKey,
    extrema: GroupExtrema,
) -> Result<GroupScore, ScoreError> {
    let amplitudes = contraction_amplitudes(&extrema.right, &extrema.left, key.right_eye_first())?;
    let score = rapd_score(&amplitudes)?;
    Ok(GroupScore {
        key,
        score,
        amplitudes,
        extrema,
    })
}

/// Extract extrema for a group and score it.
pub fn score_group(
    group: &IlluminationGroup,
    filtered_right: &[f64],
    filtered_left: &[f64],
    config: &WindowConfig,
) -> Result<GroupScore, ScoreError> {
    let extrema = extract_cycle_extrema(
        &group.change_indices,
        group.preceded_by_dark,
        filtered_right,
        filtered_left,
        config,
    )?;
    score_extrema(group.key, extrema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::extrema::{CycleExtrema, EyeExtrema};

    fn eye(peak: f64, valley: f64) -> EyeExtrema {
        EyeExtrema {
            peak_value: peak,
            peak_index: 0,
            valley_value: valley,
            valley_index: 0,
        }
    }

    /// Right eye constricts by `right_depth` on even repetitions, left eye by
    /// `left_depth` on odd ones; the unstimulated eye barely moves.
    fn alternating_extrema(right_depth: f64, left_depth: f64, count: usize) -> GroupExtrema {
        let cycles = (0..count)
            .map(|i| {
                let (r, l) = if i % 2 == 0 {
                    (eye(5.0, 5.0 - right_depth), eye(5.0, 4.9))
                } else {
                    (eye(5.0, 4.9), eye(5.0, 5.0 - left_depth))
                };
                CycleExtrema {
                    repetition: i,
                    right: r,
                    left: l,
                }
            })
            .collect();
        GroupExtrema::from_cycles(cycles)
    }

    #[test]
    fn test_contraction_amplitude() {
        assert!((contraction_amplitude(5.0, 4.0).unwrap() - 0.2).abs() < 1e-12);
        assert!(matches!(
            contraction_amplitude(0.0, 1.0),
            Err(ScoreError::DegenerateAmplitude { .. })
        ));
    }

    #[test]
    fn test_pairing_right_first() {
        let extrema = alternating_extrema(1.0, 0.5, 6);
        let ca = contraction_amplitudes(&extrema.right, &extrema.left, true).unwrap();
        assert_eq!(ca.right.len(), 3);
        assert_eq!(ca.left.len(), 3);
        assert!(ca.right.iter().all(|v| (v - 0.2).abs() < 1e-12));
        assert!(ca.left.iter().all(|v| (v - 0.1).abs() < 1e-12));
    }

    #[test]
    fn test_score_value() {
        let key = PatternKey::from_tokens([1.0, 0.0, 0.0, 1.0]);
        let result = score_extrema(key, alternating_extrema(1.0, 0.5, 6)).unwrap();
        assert!((result.score - 10.0 * 2.0f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_score_sign_flips_when_eyes_swap() {
        let extrema = alternating_extrema(1.0, 0.5, 4);
        let right_first = PatternKey::from_tokens([1.0, 0.0, 0.0, 1.0]);
        let forward = score_extrema(right_first, extrema.clone()).unwrap().score;

        // Swap which series is called right/left and flip the opening eye
        let swapped = GroupExtrema {
            cycles: extrema.cycles.clone(),
            right: extrema.left.clone(),
            left: extrema.right.clone(),
        };
        let left_first = PatternKey::from_tokens([0.0, 1.0, 1.0, 0.0]);
        let backward = score_extrema(left_first, swapped).unwrap().score;

        assert!(forward > 0.0);
        assert!((forward + backward).abs() < 1e-9);
    }

    #[test]
    fn test_zero_peak_is_degenerate() {
        let mut extrema = alternating_extrema(1.0, 0.5, 6);
        extrema.right.peaks[2] = 0.0;
        let key = PatternKey::from_tokens([1.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            score_extrema(key, extrema),
            Err(ScoreError::DegenerateAmplitude { .. })
        ));
    }

    #[test]
    fn test_empty_amplitudes_are_degenerate() {
        let extrema = alternating_extrema(1.0, 0.5, 1);
        let key = PatternKey::from_tokens([1.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            score_extrema(key, extrema),
            Err(ScoreError::DegenerateAmplitude { .. })
        ));
    }

    #[test]
    fn test_zero_left_amplitude_is_degenerate() {
        let amplitudes = ContractionAmplitudes {
            right: vec![0.2],
            left: vec![0.0],
        };
        assert!(rapd_score(&amplitudes).is_err());
    }
}
