//! Scoring stages.

pub mod aggregation;
pub mod extrema;
pub mod preprocess;
pub mod regression;
pub mod scoring;
pub mod segmentation;

// Re-export key types for convenience
pub use aggregation::{aggregate_scores, x_axis_value, AggregationError, ScorePoint};
pub use extrema::{extract_cycle_extrema, ExtremaError, GroupExtrema};
pub use preprocess::{preprocess, CleanedRecording, PreprocessError};
pub use regression::{estimate, Laterality, RapdEstimate, RegressionError};
pub use scoring::{rapd_score, score_group, GroupScore, ScoreError};
pub use segmentation::{
    segment, IlluminationEvent, IlluminationGroup, IntensityPair, PatternKey, Segmentation,
    SegmentationError,
};
