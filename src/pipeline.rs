//! End-to-end RAPD scoring run.
//!
//! ```text
//!  samples ─► preprocess ─► segment ─► (per group, parallel) extrema + score
//!                                              │
//!                                              ▼
//!                                 aggregate ─► score points ─► estimate
//! ```
//!
//! Preprocessing, segmentation and aggregation failures abort the run. A group
//! that fails extraction or scoring is logged and left out of the aggregation.

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::loaders::Sample;
use crate::core::writers::GroupResultRow;
use crate::processors::aggregation::{aggregate_scores, AggregationError, ScorePoint};
use crate::processors::preprocess::{preprocess, CleanedRecording, PreprocessError};
use crate::processors::regression::{estimate, RapdEstimate};
use crate::processors::scoring::{score_group, GroupScore, ScoreError};
use crate::processors::segmentation::{segment, IlluminationGroup, PatternKey, Segmentation, SegmentationError};

/// Errors that abort a scoring run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("segmentation failed: {0}")]
    Segmentation(#[from] SegmentationError),

    #[error("aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),
}

/// Result of scoring one illumination group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupOutcome {
    pub group: IlluminationGroup,
    pub result: Result<GroupScore, ScoreError>,
}

impl GroupOutcome {
    pub fn key(&self) -> PatternKey {
        self.group.key
    }

    pub fn score(&self) -> Option<f64> {
        self.result.as_ref().ok().map(|s| s.score)
    }

    /// Flatten into a row of the per-group results table.
    pub fn result_row(&self) -> GroupResultRow {
        GroupResultRow {
            key_tokens: self.group.key.tokens(),
            preceded_by_dark: self.group.preceded_by_dark,
            repetitions: self.group.repetitions(),
            outcome: self
                .result
                .as_ref()
                .map(|s| s.score)
                .map_err(|e| e.to_string()),
        }
    }
}

/// Everything a scoring run produces.
#[derive(Debug, Clone)]
pub struct RapdReport {
    pub cleaned: CleanedRecording,
    pub segmentation: Segmentation,
    /// One outcome per group, in group order.
    pub outcomes: Vec<GroupOutcome>,
    pub points: Vec<ScorePoint>,
}

impl RapdReport {
    /// Successfully scored groups.
    pub fn scored(&self) -> impl Iterator<Item = &GroupScore> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Groups that were skipped, with the reason.
    pub fn failures(&self) -> impl Iterator<Item = (&IlluminationGroup, &ScoreError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.group, e)))
    }

    /// Cleaned sample positions of every illumination change, sentinel
    /// included, without repeats.
    pub fn illumination_change_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .segmentation
            .events
            .iter()
            .map(|e| e.sample_index)
            .collect();
        indices.dedup();
        indices
    }

    /// `(position, value)` of every peak and valley of the scored groups.
    pub fn extrema_markers(&self) -> Vec<(usize, f64)> {
        self.scored().flat_map(|s| s.extrema.markers()).collect()
    }

    /// One results-table row per group, in group order.
    pub fn result_rows(&self) -> Vec<GroupResultRow> {
        self.outcomes.iter().map(GroupOutcome::result_row).collect()
    }

    /// Zero-crossing estimate of the score points.
    pub fn estimate(&self) -> Option<RapdEstimate> {
        estimate(&self.points).ok()
    }
}

/// Score every group against the filtered signals, in parallel.
pub fn score_groups(
    groups: &[IlluminationGroup],
    cleaned: &CleanedRecording,
    config: &PipelineConfig,
) -> Vec<GroupOutcome> {
    groups
        .par_iter()
        .map(|group| GroupOutcome {
            group: group.clone(),
            result: score_group(
                group,
                &cleaned.filtered_right,
                &cleaned.filtered_left,
                &config.windows,
            ),
        })
        .collect()
}

/// Run the full scoring pipeline over a raw sample sequence.
///
/// # Errors
///
/// Fails when no valid pupil window exists, when no stimulus pattern can be
/// formed, or when every group failed to score.
pub fn run_pipeline(samples: &[Sample], config: &PipelineConfig) -> Result<RapdReport, PipelineError> {
    let cleaned = preprocess(samples, &config.preprocessing)?;
    let segmentation = segment(&cleaned.samples, &config.segmentation)?;

    let outcomes = score_groups(&segmentation.groups, &cleaned, config);

    for outcome in &outcomes {
        match &outcome.result {
            Ok(score) => debug!("Group {} scored {:.4}", outcome.group.key, score.score),
            Err(e) => warn!("Skipping group {}: {}", outcome.group.key, e),
        }
    }

    let scores: Vec<(PatternKey, f64)> = outcomes
        .iter()
        .filter_map(|o| o.score().map(|s| (o.key(), s)))
        .collect();

    let points = aggregate_scores(&scores, &config.transmittance)?;

    info!(
        "Scored {}/{} groups into {} points",
        scores.len(),
        outcomes.len(),
        points.len()
    );

    Ok(RapdReport {
        cleaned,
        segmentation,
        outcomes,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::synthetic::{StimulusBlock, SyntheticProtocol};

    #[test]
    fn test_pipeline_single_block() {
        let protocol = SyntheticProtocol::new().block(StimulusBlock::new(1.0, 1.0, 6).responses(1.0, 1.0));
        let config = PipelineConfig::default();

        let report = run_pipeline(&protocol.generate(), &config).unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.points.len(), 1);
        assert_eq!(report.points[0].x, 0.0);
        // Symmetric responses give a score near zero
        assert!(report.points[0].y.abs() < 0.05);
        assert_eq!(report.extrema_markers().len(), 4 * 4);
    }

    #[test]
    fn test_failed_group_is_isolated() {
        // Second block is too short to fill six repetition windows
        let protocol = SyntheticProtocol::new()
            .block(StimulusBlock::new(1.0, 1.0, 6).responses(1.0, 0.5))
            .block(StimulusBlock::new(1.0, 0.3, 2).responses(1.0, 0.5));
        let report = run_pipeline(&protocol.generate(), &PipelineConfig::default()).unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.scored().count(), 1);
        let (group, err) = report.failures().next().unwrap();
        assert_eq!(group.key.tokens(), [1.0, 0.0, 0.0, 0.3]);
        assert!(matches!(err, ScoreError::Extrema(_)));
        assert_eq!(report.points.len(), 1);
    }

    #[test]
    fn test_result_rows_follow_outcomes() {
        let protocol = SyntheticProtocol::new()
            .block(StimulusBlock::new(1.0, 1.0, 6).responses(1.0, 0.8))
            .block(StimulusBlock::new(1.0, 0.3, 2));
        let report = run_pipeline(&protocol.generate(), &PipelineConfig::default()).unwrap();

        let rows = report.result_rows();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].key_tokens, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(rows[0].repetitions, 6);
        assert_eq!(rows[0].outcome, Ok(report.outcomes[0].score().unwrap()));

        assert_eq!(rows[1].key_tokens, [1.0, 0.0, 0.0, 0.3]);
        assert_eq!(rows[1].repetitions, 2);
        let reason = rows[1].outcome.clone().unwrap_err();
        assert_eq!(reason, report.outcomes[1].result.clone().unwrap_err().to_string());
    }

    #[test]
    fn test_all_groups_failing_aborts() {
        let protocol = SyntheticProtocol::new().block(StimulusBlock::new(1.0, 1.0, 2));
        assert!(matches!(
            run_pipeline(&protocol.generate(), &PipelineConfig::default()),
            Err(PipelineError::Aggregation(AggregationError::NoScorePoints))
        ));
    }

    #[test]
    fn test_unrecoverable_errors_surface() {
        let invalid = SyntheticProtocol::new()
            .block(StimulusBlock::new(1.0, 1.0, 6))
            .generate()
            .into_iter()
            .map(|mut s| {
                s.pupil_left = -1.0;
                s
            })
            .collect::<Vec<_>>();
        assert!(matches!(
            run_pipeline(&invalid, &PipelineConfig::default()),
            Err(PipelineError::Preprocess(_))
        ));

        let dark_only = SyntheticProtocol::new().lead_in_dark(500).generate();
        assert!(matches!(
            run_pipeline(&dark_only, &PipelineConfig::default()),
            Err(PipelineError::Segmentation(_))
        ));
    }

    #[test]
    fn test_change_indices_deduplicated() {
        let protocol = SyntheticProtocol::new().block(StimulusBlock::new(1.0, 1.0, 6));
        let report = run_pipeline(&protocol.generate(), &PipelineConfig::default()).unwrap();
        let indices = report.illumination_change_indices();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(indices.len(), report.segmentation.events.len());
    }
}
