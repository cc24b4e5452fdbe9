//! Deterministic synthetic recordings.
//!
//! A protocol is an optional dark lead-in followed by stimulus blocks. Each
//! block alternates right-eye and left-eye illumination phases for a number of
//! repetitions and ends with a dark gap. Both pupils follow the same
//! consensual triangular response to every phase: a fast linear constriction
//! of the stimulated eye's response depth, then a slow linear recovery back to
//! baseline by the end of the phase.

use super::loaders::{Sample, INVALID_PUPIL_DIAMETER};

/// One block of alternating stimulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StimulusBlock {
    /// Intensity shown to the right eye during its phases.
    pub right_level: f64,
    /// Intensity shown to the left eye during its phases.
    pub left_level: f64,
    pub repetitions: usize,
    /// Constriction depth (mm) evoked by a right-eye phase.
    pub right_response: f64,
    /// Constriction depth (mm) evoked by a left-eye phase.
    pub left_response: f64,
    /// Open each repetition with the left eye.
    pub left_first: bool,
}

impl StimulusBlock {
    pub fn new(right_level: f64, left_level: f64, repetitions: usize) -> Self {
        Self {
            right_level,
            left_level,
            repetitions,
            right_response: 1.0,
            left_response: 1.0,
            left_first: false,
        }
    }

    pub fn responses(mut self, right: f64, left: f64) -> Self {
        self.right_response = right;
        self.left_response = left;
        self
    }

    pub fn left_first(mut self) -> Self {
        self.left_first = true;
        self
    }

    /// `(right intensity, left intensity, response depth)` of each phase.
    fn phases(&self) -> Vec<(f64, f64, f64)> {
        let right = (self.right_level, 0.0, self.right_response);
        let left = (0.0, self.left_level, self.left_response);
        let pair = if self.left_first {
            [left, right]
        } else {
            [right, left]
        };
        (0..self.repetitions).flat_map(|_| pair).collect()
    }
}

/// Builder for a synthetic recording.
#[derive(Debug, Clone)]
pub struct SyntheticProtocol {
    pub samples_per_phase: usize,
    pub sample_period: f64,
    pub baseline_diameter: f64,
    /// Samples from phase onset to maximum constriction.
    pub constriction_samples: usize,
    pub lead_in_dark: usize,
    /// Dark samples appended after every block.
    pub dark_gap: usize,
    /// Leading samples with an invalid left pupil reading.
    pub invalid_leading: usize,
    /// Trailing samples with an invalid right pupil reading.
    pub invalid_trailing: usize,
    pub blocks: Vec<StimulusBlock>,
}

impl Default for SyntheticProtocol {
    fn default() -> Self {
        Self {
            samples_per_phase: 250,
            sample_period: 0.01,
            baseline_diameter: 5.0,
            constriction_samples: 40,
            lead_in_dark: 0,
            dark_gap: 150,
            invalid_leading: 0,
            invalid_trailing: 0,
            blocks: Vec::new(),
        }
    }
}

impl SyntheticProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(mut self, block: StimulusBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn lead_in_dark(mut self, samples: usize) -> Self {
        self.lead_in_dark = samples;
        self
    }

    pub fn dark_gap(mut self, samples: usize) -> Self {
        self.dark_gap = samples;
        self
    }

    pub fn samples_per_phase(mut self, samples: usize) -> Self {
        self.samples_per_phase = samples;
        self
    }

    pub fn invalid_boundaries(mut self, leading: usize, trailing: usize) -> Self {
        self.invalid_leading = leading;
        self.invalid_trailing = trailing;
        self
    }

    /// Pupil constriction depth `k` samples into a phase of response `depth`.
    fn response_at(&self, k: usize, depth: f64) -> f64 {
        let p = self.samples_per_phase.max(1);
        let c = self.constriction_samples.clamp(1, p);
        if k < c {
            depth * k as f64 / c as f64
        } else if p > c {
            depth * (p - k) as f64 / (p - c) as f64
        } else {
            depth
        }
    }

    fn push(&self, samples: &mut Vec<Sample>, right: f64, left: f64, depth: f64) {
        let diameter = self.baseline_diameter - depth;
        samples.push(Sample {
            timestamp: samples.len() as f64 * self.sample_period,
            intensity_left: left,
            intensity_right: right,
            pupil_left: diameter,
            pupil_right: diameter,
        });
    }

    /// Render the protocol into a sample sequence.
    pub fn generate(&self) -> Vec<Sample> {
        let mut samples = Vec::new();

        for _ in 0..self.lead_in_dark {
            self.push(&mut samples, 0.0, 0.0, 0.0);
        }

        for block in &self.blocks {
            for (right, left, depth) in block.phases() {
                for k in 0..self.samples_per_phase {
                    self.push(&mut samples, right, left, self.response_at(k, depth));
                }
            }
            for _ in 0..self.dark_gap {
                self.push(&mut samples, 0.0, 0.0, 0.0);
            }
        }

        let n = samples.len();
        for s in samples.iter_mut().take(self.invalid_leading) {
            s.pupil_left = INVALID_PUPIL_DIAMETER;
        }
        for s in samples.iter_mut().skip(n.saturating_sub(self.invalid_trailing)) {
            s.pupil_right = INVALID_PUPIL_DIAMETER;
        }

        samples
    }
}
