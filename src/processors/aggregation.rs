//! Mapping group scores onto the log-transmittance axis.
//!
//! Each pattern key is placed on a signed x-axis: the attenuated side's
//! transmittance in log10 units, negated when the right-eye slots reach full
//! intensity. Scores landing on the same x value are averaged.

use thiserror::Error;

use crate::config::{TransmittanceConfig, TransmittanceLevel};
use crate::processors::segmentation::PatternKey;

/// Intensity level treated as "no attenuation".
pub const FULL_INTENSITY: f64 = 1.0;

/// Errors that can occur during aggregation.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("no score points to aggregate")]
    NoScorePoints,
}

/// One aggregated point of the RAPD graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorePoint {
    /// Filter strength in signed log10 units.
    pub x: f64,
    /// Mean RAPD score of the groups at this x.
    pub y: f64,
}

#[inline]
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Signed log-transmittance of the attenuated intensity in a pattern key.
///
/// When token 0 or token 2 equals full intensity, the attenuated level is
/// looked up in tokens 1/3 and the result is `-round(log10(t), 2)`. Otherwise
/// tokens 0/2 are searched and the result is `round(log10(t), 2)`. Table rows
/// are tried in order, full intensity skipped. No match gives 0.
pub fn x_axis_value(key: &PatternKey, levels: &[TransmittanceLevel]) -> f64 {
    let t = key.tokens();
    let left_eye_varies = t[0] == FULL_INTENSITY || t[2] == FULL_INTENSITY;

    for level in levels.iter().filter(|l| l.intensity != FULL_INTENSITY) {
        if left_eye_varies {
            if t[1] == level.intensity || t[3] == level.intensity {
                return -round2(level.transmittance.log10());
            }
        } else if t[0] == level.intensity || t[2] == level.intensity {
            return round2(level.transmittance.log10());
        }
    }
    0.0
}

/// Group `(key, score)` pairs by x value and average each group.
///
/// Points come out in order of first appearance of their x value, at most one
/// per distinct x.
pub fn aggregate_scores(
    scores: &[(PatternKey, f64)],
    config: &TransmittanceConfig,
) -> Result<Vec<ScorePoint>, AggregationError> {
    if scores.is_empty() {
        return Err(AggregationError::NoScorePoints);
    }

    let mut buckets: Vec<(f64, Vec<f64>)> = Vec::new();
    for (key, score) in scores {
        let x = x_axis_value(key, &config.levels);
        match buckets.iter_mut().find(|(bx, _)| *bx == x) {
            Some((_, ys)) => ys.push(*score),
            None => buckets.push((x, vec![*score])),
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(x, ys)| ScorePoint {
            x,
            y: ys.iter().sum::<f64>() / ys.len() as f64,
        })
        .collect())
}
