//! Relative afferent pupillary defect (RAPD) scoring pipeline.
//!
//! This crate provides tools for:
//! - Loading paired pupil-diameter and illumination recordings from CSV
//! - Trimming and Gaussian-smoothing the pupil traces
//! - Segmenting the illumination timeline into alternating stimulus patterns
//! - Extracting per-repetition peaks and valleys and scoring each pattern
//! - Aggregating scores on a log-transmittance axis and fitting the zero crossing
//!
//! # Example
//!
//! ```no_run
//! use rapd_pipeline::{core::loaders::load_recording_csv, run_pipeline, PipelineConfig};
//!
//! let recording = load_recording_csv("recording.csv").unwrap();
//! let report = run_pipeline(&recording.samples, &PipelineConfig::default()).unwrap();
//! for point in &report.points {
//!     println!("{:.2} log units: {:.3}", point.x, point.y);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod processors;
pub mod visualization;

pub use config::{
    PipelineConfig, PlotConfig, PreprocessingConfig, SegmentationConfig, TransmittanceConfig,
    WindowConfig,
};
pub use core::loaders::{Recording, Sample};
pub use pipeline::{run_pipeline, PipelineError, RapdReport};
pub use processors::aggregation::ScorePoint;
pub use processors::regression::{Laterality, RapdEstimate};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
