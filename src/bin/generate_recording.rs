//! Writes a synthetic RAPD recording CSV.
//!
//! One stimulus block per intensity pair: full/full, then each attenuated
//! level on the left and on the right. The left eye's response is scaled by
//! `--left-response` to simulate a defect.

use std::path::PathBuf;

use clap::Parser;
use rapd_pipeline::core::synthetic::{StimulusBlock, SyntheticProtocol};
use rapd_pipeline::core::writers::write_recording_csv;

#[derive(Parser)]
#[command(name = "generate_recording")]
#[command(about = "Generate a synthetic alternating-light recording", version)]
struct Args {
    /// Output CSV file
    #[arg(short, long, default_value = "synthetic_recording.csv")]
    output: PathBuf,

    /// Repetitions per stimulus block
    #[arg(long, default_value_t = 8)]
    repetitions: usize,

    /// Attenuated intensity levels to include
    #[arg(long, default_values_t = vec![0.3, 0.16])]
    levels: Vec<f64>,

    /// Constriction depth (mm) of the right eye at full intensity
    #[arg(long, default_value_t = 1.0)]
    right_response: f64,

    /// Constriction depth (mm) of the left eye at full intensity
    #[arg(long, default_value_t = 0.7)]
    left_response: f64,

    /// Dark samples before the first block
    #[arg(long, default_value_t = 200)]
    lead_in: usize,

    /// Samples per illumination phase
    #[arg(long, default_value_t = 250)]
    phase_samples: usize,
}

fn main() {
    let args = Args::parse();

    let mut protocol = SyntheticProtocol::new()
        .lead_in_dark(args.lead_in)
        .samples_per_phase(args.phase_samples)
        .block(StimulusBlock::new(1.0, 1.0, args.repetitions).responses(args.right_response, args.left_response));

    // Response depth follows the stimulus intensity
    for &level in &args.levels {
        protocol = protocol
            .block(
                StimulusBlock::new(1.0, level, args.repetitions)
                    .responses(args.right_response, args.left_response * level),
            )
            .block(
                StimulusBlock::new(level, 1.0, args.repetitions)
                    .responses(args.right_response * level, args.left_response),
            );
    }

    let samples = protocol.generate();

    if let Err(e) = write_recording_csv(&args.output, &samples) {
        eprintln!("Failed to write recording: {e}");
        std::process::exit(1);
    }

    println!(
        "Wrote {} samples ({} blocks) to {}",
        samples.len(),
        protocol.blocks.len(),
        args.output.display()
    );
}
