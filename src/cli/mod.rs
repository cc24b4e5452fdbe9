//! Command-line interface for the RAPD pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders::{load_recording_csv, Recording};
use crate::core::writers::{write_group_results_csv, write_score_points_csv};
use crate::pipeline::{run_pipeline, RapdReport};
use crate::processors::preprocess::preprocess;
use crate::processors::regression::{estimate, RapdEstimate};
use crate::processors::segmentation::segment;
use crate::visualization::{plot_diameter_and_scores, plot_score_graph};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "rapd-pipeline")]
#[command(about = "RAPD scoring from paired pupil-diameter recordings", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a recording and write points, group results and plots
    Score {
        /// Recording CSV file
        csv_file: PathBuf,
        /// Output directory (defaults to the recording's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Skip PNG rendering
        #[arg(long)]
        no_plot: bool,
        /// Print the scores without writing any file
        #[arg(long)]
        scores_only: bool,
    },

    /// Print the illumination events and stimulus groups of a recording
    Segments {
        /// Recording CSV file
        csv_file: PathBuf,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination YAML file
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Score {
            csv_file,
            output_dir,
            no_plot,
            scores_only,
        } => {
            cmd_score(&csv_file, output_dir, no_plot, scores_only, &config);
        }
        Commands::Segments { csv_file } => {
            cmd_segments(&csv_file, &config);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path);
        }
    }
}

/// Files produced by a scoring run.
#[derive(Default)]
struct ScoreOutputs {
    points_csv: Option<PathBuf>,
    groups_csv: Option<PathBuf>,
    score_png: Option<PathBuf>,
    trace_png: Option<PathBuf>,
}

fn load(csv_file: &Path) -> Result<Recording> {
    load_recording_csv(csv_file)
        .with_context(|| format!("Failed to load recording: {}", csv_file.display()))
}

fn write_outputs(
    report: &RapdReport,
    fit: Option<&RapdEstimate>,
    output_dir: &Path,
    stem: &str,
    plot: bool,
    config: &PipelineConfig,
) -> Result<ScoreOutputs> {
    let mut outputs = ScoreOutputs::default();

    let points_csv = output_dir.join(format!("{stem}_rapd_points.csv"));
    write_score_points_csv(&points_csv, &report.points)
        .with_context(|| format!("Failed to write score points: {}", points_csv.display()))?;
    outputs.points_csv = Some(points_csv);

    let groups_csv = output_dir.join(format!("{stem}_rapd_groups.csv"));
    write_group_results_csv(&groups_csv, &report.result_rows())
        .with_context(|| format!("Failed to write group results: {}", groups_csv.display()))?;
    outputs.groups_csv = Some(groups_csv);

    // A single point has no line to draw
    if plot && report.points.len() > 1 {
        let score_png = output_dir.join(format!("RAPD_score_{stem}.png"));
        plot_score_graph(&score_png, &report.points, fit, &config.plot)
            .with_context(|| format!("Failed to plot score graph: {}", score_png.display()))?;
        outputs.score_png = Some(score_png);

        let trace_png = output_dir.join(format!("{stem}_rapd_trace.png"));
        plot_diameter_and_scores(&trace_png, report, &config.plot)
            .with_context(|| format!("Failed to plot diameter trace: {}", trace_png.display()))?;
        outputs.trace_png = Some(trace_png);
    }

    Ok(outputs)
}

/// Summary lines for the zero crossing, or the raw score of a lone point.
fn estimate_items(report: &RapdReport, fit: Option<&RapdEstimate>) -> Vec<(&'static str, String)> {
    let mut items = Vec::new();
    if let Some(RapdEstimate::Fitted { x_intercept, .. }) = fit {
        items.push(("RAPD (log units)", format!("{:.3}", x_intercept)));
        if let Some(side) = fit.and_then(|f| f.laterality()) {
            items.push(("Affected side", side.to_string()));
        }
    } else if let [only] = report.points.as_slice() {
        items.push(("RAPD score", format!("{:.4}", only.y)));
    }
    items
}

fn print_scores(report: &RapdReport) {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(score) => println!("{:<24} {:>10.4}", outcome.group.key, score.score),
            Err(e) => println!("{:<24} {:>10}  ({})", outcome.group.key, "skipped", e),
        }
    }
    println!();
    for point in &report.points {
        println!("x = {:>6.2}  score = {:>10.4}", point.x, point.y);
    }
}

fn cmd_score(
    csv_file: &Path,
    output_dir: Option<PathBuf>,
    no_plot: bool,
    scores_only: bool,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    let spinner = create_spinner("Loading recording...");

    let recording = match load(csv_file) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_and_clear();
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Scoring illumination groups...");

    let report = match run_pipeline(&recording.samples, config) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Scoring failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.finish_and_clear();

    if scores_only {
        print_scores(&report);
        return;
    }

    if let [only] = report.points.as_slice() {
        println!("RAPD score: {:.4}", only.y);
    }

    let fit = if report.points.len() > 1 {
        match estimate(&report.points) {
            Ok(fit) => Some(fit),
            Err(e) => {
                warn!("No zero crossing: {}", e);
                None
            }
        }
    } else {
        None
    };

    let stem = recording.stem().unwrap_or_else(|| "recording".to_string());
    let effective_output_dir = output_dir.unwrap_or_else(|| {
        csv_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let spinner = create_spinner("Writing results...");

    let outputs = match write_outputs(&report, fit.as_ref(), &effective_output_dir, &stem, !no_plot, config) {
        Ok(o) => o,
        Err(e) => {
            spinner.finish_and_clear();
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    spinner.finish_and_clear();

    let show = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    let mut items = vec![
        ("Input file", csv_file.display().to_string()),
        ("Samples", recording.len().to_string()),
        (
            "Groups scored",
            format!("{}/{}", report.scored().count(), report.outcomes.len()),
        ),
        ("Score points", report.points.len().to_string()),
    ];
    items.extend(estimate_items(&report, fit.as_ref()));
    items.push(("Points CSV", show(&outputs.points_csv)));
    items.push(("Groups CSV", show(&outputs.groups_csv)));
    items.push(("Score graph", show(&outputs.score_png)));
    items.push(("Diameter trace", show(&outputs.trace_png)));
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("RAPD Scoring Complete", &items);
}

fn cmd_segments(csv_file: &Path, config: &PipelineConfig) {
    let recording = match load(csv_file) {
        Ok(r) => r,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let cleaned = match preprocess(&recording.samples, &config.preprocessing) {
        Ok(c) => c,
        Err(e) => {
            error!("Preprocessing failed: {}", e);
            std::process::exit(1);
        }
    };

    let segmentation = match segment(&cleaned.samples, &config.segmentation) {
        Ok(s) => s,
        Err(e) => {
            error!("Segmentation failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("Illumination events ({}):", segmentation.events.len());
    for event in &segmentation.events {
        println!(
            "  {:>8}  t = {:>10.3}  {}",
            event.sample_index, event.timestamp, event.pair
        );
    }

    println!();
    println!("Stimulus groups ({}):", segmentation.groups.len());
    for group in &segmentation.groups {
        println!(
            "  {:<24} repetitions = {:<3} after dark = {:<5} changes = {:?}",
            group.key.to_string(),
            group.repetitions(),
            group.preceded_by_dark,
            group.change_indices
        );
    }

    print_summary(
        "Segmentation Complete",
        &[
            ("Input file", csv_file.display().to_string()),
            ("Samples kept", cleaned.len().to_string()),
            ("Leading rows trimmed", cleaned.offset.to_string()),
            ("Events", segmentation.events.len().to_string()),
            ("Groups", segmentation.groups.len().to_string()),
        ],
    );
}

fn cmd_init_config(path: &Path) {
    match PipelineConfig::default().to_yaml(path) {
        Ok(()) => println!("Wrote default configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write config to {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
