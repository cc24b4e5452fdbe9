//! PNG rendering of scoring results.
//!
//! This module draws the RAPD score graph and the filtered pupil traces with
//! their illumination changes and extracted extrema, using the plotters
//! bitmap backend.

use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::PlotConfig;
use crate::pipeline::RapdReport;
use crate::processors::aggregation::ScorePoint;
use crate::processors::regression::RapdEstimate;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No score points to plot")]
    NoPoints,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

const RIGHT_EYE_COLOR: RGBColor = RGBColor(228, 26, 28);
const LEFT_EYE_COLOR: RGBColor = RGBColor(55, 126, 184);
const FIT_COLOR: RGBColor = RGBColor(77, 175, 74);

/// Alternating colours for illumination change lines.
const CHANGE_COLORS: [RGBColor; 2] = [RGBColor(255, 127, 0), RGBColor(152, 78, 163)];

fn plotting_error<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Min..max of `values` widened by 5% on both sides.
///
/// A flat or empty input gets a unit margin instead.
fn padded_range<I: IntoIterator<Item = f64>>(values: I) -> Range<f64> {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }

    if min > max {
        return -1.0..1.0;
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0)..(max + 1.0);
    }

    let padding = (max - min) * 0.05;
    (min - padding)..(max + padding)
}

fn change_line_color(i: usize) -> RGBColor {
    CHANGE_COLORS[i % CHANGE_COLORS.len()]
}

/// Score points, fitted line, `y = 0` reference and the zero crossing.
fn draw_score_panel(
    area: &Panel<'_>,
    points: &[ScorePoint],
    estimate: Option<&RapdEstimate>,
    config: &PlotConfig,
) -> Result<()> {
    let crossing = estimate.and_then(|e| e.x_intercept());

    let x_range = padded_range(points.iter().map(|p| p.x).chain(crossing));
    let line: Vec<(f64, f64)> = match estimate {
        Some(e) => [x_range.start, x_range.end]
            .iter()
            .filter_map(|&x| e.predict(x).map(|y| (x, y)))
            .collect(),
        None => Vec::new(),
    };
    let y_range = padded_range(
        points
            .iter()
            .map(|p| p.y)
            .chain(line.iter().map(|(_, y)| *y))
            .chain(std::iter::once(0.0)),
    );

    let mut builder = ChartBuilder::on(area);
    builder.margin(10);
    if config.axis_labels {
        builder.x_label_area_size(40).y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(plotting_error)?;

    if config.axis_labels {
        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_desc("Filter strength (log units)")
            .y_desc("RAPD score")
            .draw()
            .map_err(plotting_error)?;
    }

    chart
        .draw_series(DashedLineSeries::new(
            vec![(x_range.start, 0.0), (x_range.end, 0.0)],
            10,
            6,
            BLACK.stroke_width(1),
        ))
        .map_err(plotting_error)?;

    if !line.is_empty() {
        chart
            .draw_series(LineSeries::new(line, FIT_COLOR.stroke_width(2)))
            .map_err(plotting_error)?;
    }

    if let Some(x) = crossing {
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(x, y_range.start), (x, y_range.end)],
                RIGHT_EYE_COLOR.stroke_width(2),
            )))
            .map_err(plotting_error)?;
    }

    chart
        .draw_series(
            points
                .iter()
                .map(|p| Circle::new((p.x, p.y), 6, LEFT_EYE_COLOR.filled())),
        )
        .map_err(plotting_error)?;

    Ok(())
}

/// Filtered pupil traces with illumination changes and extrema markers.
fn draw_diameter_panel(area: &Panel<'_>, report: &RapdReport, config: &PlotConfig) -> Result<()> {
    let cleaned = &report.cleaned;
    let x_range = 0.0..cleaned.len().max(1) as f64;
    let y_range = padded_range(
        cleaned
            .filtered_right
            .iter()
            .chain(cleaned.filtered_left.iter())
            .copied(),
    );

    let mut builder = ChartBuilder::on(area);
    builder.margin(10);
    if config.axis_labels {
        builder.x_label_area_size(40).y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(x_range, y_range.clone())
        .map_err(plotting_error)?;

    if config.axis_labels {
        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_desc("Sample")
            .y_desc("Pupil diameter")
            .draw()
            .map_err(plotting_error)?;
    }

    chart
        .draw_series(
            report
                .illumination_change_indices()
                .into_iter()
                .enumerate()
                .map(|(i, idx)| {
                    let x = idx as f64;
                    PathElement::new(
                        vec![(x, y_range.start), (x, y_range.end)],
                        change_line_color(i).stroke_width(1),
                    )
                }),
        )
        .map_err(plotting_error)?;

    for (signal, color) in [
        (&cleaned.filtered_right, RIGHT_EYE_COLOR),
        (&cleaned.filtered_left, LEFT_EYE_COLOR),
    ] {
        chart
            .draw_series(LineSeries::new(
                signal.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                color.stroke_width(2),
            ))
            .map_err(plotting_error)?;
    }

    chart
        .draw_series(
            report
                .extrema_markers()
                .into_iter()
                .map(|(idx, v)| Circle::new((idx as f64, v), 4, BLACK.filled())),
        )
        .map_err(plotting_error)?;

    Ok(())
}

/// Plot the RAPD score graph and save as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `points` - Aggregated score points
/// * `estimate` - Fitted line to overlay, if any
/// * `config` - Image size and labelling
///
/// # Errors
///
/// Returns `NoPoints` for an empty point list, otherwise any error raised
/// while creating or encoding the image.
pub fn plot_score_graph(
    output_path: &Path,
    points: &[ScorePoint],
    estimate: Option<&RapdEstimate>,
    config: &PlotConfig,
) -> Result<()> {
    if points.is_empty() {
        return Err(VisualizationError::NoPoints);
    }
    ensure_parent_dirs(output_path)?;

    let root = BitMapBackend::new(output_path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    draw_score_panel(&root, points, estimate, config)?;

    root.present().map_err(plotting_error)?;
    Ok(())
}

/// Plot the filtered pupil traces above the score graph and save as PNG.
///
/// The top panel shows both filtered diameters against sample position,
/// a vertical line at every illumination change and a black marker at
/// every extracted peak and valley. The bottom panel is the score graph.
pub fn plot_diameter_and_scores(
    output_path: &Path,
    report: &RapdReport,
    config: &PlotConfig,
) -> Result<()> {
    if report.points.is_empty() {
        return Err(VisualizationError::NoPoints);
    }
    ensure_parent_dirs(output_path)?;

    let root = BitMapBackend::new(output_path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    let panels = root.split_evenly((2, 1));
    draw_diameter_panel(&panels[0], report, config)?;
    draw_score_panel(&panels[1], &report.points, report.estimate().as_ref(), config)?;

    root.present().map_err(plotting_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::core::synthetic::{StimulusBlock, SyntheticProtocol};
    use crate::pipeline::run_pipeline;
    use crate::processors::regression::estimate;
    use tempfile::tempdir;

    fn unlabelled() -> PlotConfig {
        PlotConfig {
            width: 400,
            height: 300,
            axis_labels: false,
        }
    }

    #[test]
    fn test_padded_range() {
        let r = padded_range(vec![0.0, 10.0]);
        assert!((r.start + 0.5).abs() < 1e-12);
        assert!((r.end - 10.5).abs() < 1e-12);

        assert_eq!(padded_range(vec![2.0, 2.0]), 1.0..3.0);
        assert_eq!(padded_range(Vec::new()), -1.0..1.0);
        assert_eq!(padded_range(vec![f64::NAN, 3.0]), 2.0..4.0);
    }

    #[test]
    fn test_change_colors_alternate() {
        assert_eq!(change_line_color(0), change_line_color(2));
        assert_ne!(change_line_color(0), change_line_color(1));
    }

    #[test]
    fn test_plot_score_graph_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plots").join("score.png");
        let points = vec![
            ScorePoint { x: -0.3, y: -2.0 },
            ScorePoint { x: 0.0, y: 1.0 },
            ScorePoint { x: 0.3, y: 4.0 },
        ];
        let fit = estimate(&points).unwrap();

        plot_score_graph(&path, &points, Some(&fit), &unlabelled()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_plot_score_graph_rejects_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("score.png");
        assert!(matches!(
            plot_score_graph(&path, &[], None, &unlabelled()),
            Err(VisualizationError::NoPoints)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_plot_diameter_and_scores_writes_png() {
        let protocol = SyntheticProtocol::new().block(StimulusBlock::new(1.0, 1.0, 6).responses(1.0, 0.7));
        let report = run_pipeline(&protocol.generate(), &PipelineConfig::default()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.png");
        plot_diameter_and_scores(&path, &report, &unlabelled()).unwrap();
        assert!(path.exists());
    }
}
