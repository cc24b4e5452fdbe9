//! Configuration types for the RAPD pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for cleaning and smoothing the pupil channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Gaussian kernel standard deviation, in samples
    #[serde(default = "default_smoothing_sigma")]
    pub smoothing_sigma: f64,

    /// Kernel half-width in units of sigma
    #[serde(default = "default_truncate")]
    pub truncate: f64,

    /// Linearly interpolate interior invalid readings before smoothing
    #[serde(default = "default_interpolate_gaps")]
    pub interpolate_gaps: bool,
}

fn default_smoothing_sigma() -> f64 {
    6.0
}

fn default_truncate() -> f64 {
    4.0
}

fn default_interpolate_gaps() -> bool {
    true
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            smoothing_sigma: default_smoothing_sigma(),
            truncate: default_truncate(),
            interpolate_gaps: default_interpolate_gaps(),
        }
    }
}

/// Configuration for grouping illumination changes into stimulus patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Treat the first stimulus block of a recording as preceded by darkness
    #[serde(default = "default_recording_starts_dark")]
    pub recording_starts_dark: bool,
}

fn default_recording_starts_dark() -> bool {
    true
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            recording_starts_dark: default_recording_starts_dark(),
        }
    }
}

/// Configuration for the per-repetition peak/valley windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Length of the peak search window starting at each change, in samples
    #[serde(default = "default_peak_window_samples")]
    pub peak_window_samples: usize,

    /// Number of repetition windows examined per group
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,

    /// Leading windows dropped when the group follows a dark gap
    #[serde(default = "default_dark_lead_in_skip")]
    pub dark_lead_in_skip: usize,
}

fn default_peak_window_samples() -> usize {
    100
}

fn default_repetitions() -> usize {
    6
}

fn default_dark_lead_in_skip() -> usize {
    2
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            peak_window_samples: default_peak_window_samples(),
            repetitions: default_repetitions(),
            dark_lead_in_skip: default_dark_lead_in_skip(),
        }
    }
}

/// One row of the stimulus-intensity to filter-transmittance table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransmittanceLevel {
    pub intensity: f64,
    pub transmittance: f64,
}

/// Fixed lookup from nominal stimulus intensity to relative transmittance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmittanceConfig {
    #[serde(default = "default_transmittance_levels")]
    pub levels: Vec<TransmittanceLevel>,
}

fn default_transmittance_levels() -> Vec<TransmittanceLevel> {
    vec![
        TransmittanceLevel { intensity: 1.0, transmittance: 1.0 },
        TransmittanceLevel { intensity: 0.3, transmittance: 0.5 },
        TransmittanceLevel { intensity: 0.16, transmittance: 0.25 },
    ]
}

impl Default for TransmittanceConfig {
    fn default() -> Self {
        Self {
            levels: default_transmittance_levels(),
        }
    }
}

/// Configuration for PNG output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default = "default_plot_width")]
    pub width: u32,

    #[serde(default = "default_plot_height")]
    pub height: u32,

    /// Draw tick labels and axis descriptions. Needs a system font.
    #[serde(default = "default_axis_labels")]
    pub axis_labels: bool,
}

fn default_plot_width() -> u32 {
    1800
}

fn default_plot_height() -> u32 {
    1200
}

fn default_axis_labels() -> bool {
    true
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_plot_width(),
            height: default_plot_height(),
            axis_labels: default_axis_labels(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub windows: WindowConfig,

    #[serde(default)]
    pub transmittance: TransmittanceConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
