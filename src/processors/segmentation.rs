//! Illumination segmentation.
//!
//! The stimulus timeline is reduced to a list of illumination events (one per
//! change of the right/left intensity pair, plus a closing sentinel) and the
//! events are then grouped into alternating right/left stimulus patterns.
//!
//! ```text
//!  pair:   (0,0) (1,0) (0,1) (1,0) (0,1) ... (0,0) (0.3,0) (0,1) ...
//!           dark  └───── pattern A ─────┘     dark  └── pattern B ──
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use log::debug;
use thiserror::Error;

use crate::config::SegmentationConfig;
use crate::core::loaders::Sample;

/// Errors that can occur during segmentation.
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("no stimulus pattern: found {non_dark} non-dark illumination events, need at least 2")]
    NoStimulusPattern { non_dark: usize },
}

/// Stimulus intensities presented to each eye at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityPair {
    pub right: f64,
    pub left: f64,
}

impl IntensityPair {
    /// Both eyes dark.
    pub const DARK: IntensityPair = IntensityPair {
        right: 0.0,
        left: 0.0,
    };

    pub fn new(right: f64, left: f64) -> Self {
        Self { right, left }
    }

    pub fn of(sample: &Sample) -> Self {
        Self::new(sample.intensity_right, sample.intensity_left)
    }

    #[inline]
    pub fn is_dark(&self) -> bool {
        *self == Self::DARK
    }
}

impl fmt::Display for IntensityPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.right, self.left)
    }
}

/// A change of the intensity pair at a cleaned sample position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IlluminationEvent {
    pub pair: IntensityPair,
    pub sample_index: usize,
    pub timestamp: f64,
}

/// Key of an alternating stimulus pattern: the pair that opens each
/// repetition followed by the pair that closes it.
///
/// Tokens, in order: `first.right, first.left, second.right, second.left`.
#[derive(Debug, Clone, Copy)]
pub struct PatternKey {
    pub first: IntensityPair,
    pub second: IntensityPair,
}

impl PatternKey {
    pub fn new(first: IntensityPair, second: IntensityPair) -> Self {
        Self { first, second }
    }

    pub fn from_tokens(tokens: [f64; 4]) -> Self {
        Self::new(
            IntensityPair::new(tokens[0], tokens[1]),
            IntensityPair::new(tokens[2], tokens[3]),
        )
    }

    #[inline]
    pub fn tokens(&self) -> [f64; 4] {
        [self.first.right, self.first.left, self.second.right, self.second.left]
    }

    /// True when the pattern opens with the right eye illuminated.
    #[inline]
    pub fn right_eye_first(&self) -> bool {
        self.first.right != 0.0
    }

    #[inline]
    fn contains(&self, pair: &IntensityPair) -> bool {
        *pair == self.first || *pair == self.second
    }
}

// Exact float equality: intensities come from a small fixed set of levels.
impl PartialEq for PatternKey {
    fn eq(&self, other: &Self) -> bool {
        self.tokens() == other.tokens()
    }
}

impl Eq for PatternKey {}

impl Hash for PatternKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for t in self.tokens() {
            // +0.0 folds -0.0 onto 0.0 so equal keys hash equally
            (t + 0.0).to_bits().hash(state);
        }
    }
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.tokens();
        write!(f, "{:?}_{:?}_{:?}_{:?}", a, b, c, d)
    }
}

/// Change indices and dark-gap state collected for one pattern key.
#[derive(Debug, Clone, PartialEq)]
pub struct IlluminationGroup {
    pub key: PatternKey,
    /// Sample positions of the consumed events, concatenated across every
    /// occurrence of the pattern in the timeline.
    pub change_indices: Vec<usize>,
    /// Whether the most recent occurrence followed a dark gap.
    pub preceded_by_dark: bool,
    /// Number of separate blocks merged into this group.
    pub occurrences: usize,
}

impl IlluminationGroup {
    /// Full right+left repetitions covered by the change indices.
    #[inline]
    pub fn repetitions(&self) -> usize {
        self.change_indices.len() / 2
    }
}

/// Events plus pattern groups in first-appearance order.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub events: Vec<IlluminationEvent>,
    pub groups: Vec<IlluminationGroup>,
}

impl Segmentation {
    pub fn group(&self, key: &PatternKey) -> Option<&IlluminationGroup> {
        self.groups.iter().find(|g| g.key == *key)
    }
}

/// Walk the samples and emit an event whenever the intensity pair changes.
///
/// The pair before the first sample is taken to be dark, so a recording that
/// opens with a lit stimulus produces an event at position 0. A closing
/// sentinel repeating the last pair at the final position is always appended.
pub fn detect_illumination_events(samples: &[Sample]) -> Vec<IlluminationEvent> {
    let mut events = Vec::new();
    let Some(last) = samples.last() else {
        return events;
    };

    let mut current = IntensityPair::DARK;
    for (idx, sample) in samples.iter().enumerate() {
        let pair = IntensityPair::of(sample);
        if pair != current {
            current = pair;
            events.push(IlluminationEvent {
                pair,
                sample_index: idx,
                timestamp: sample.timestamp,
            });
        }
    }

    events.push(IlluminationEvent {
        pair: current,
        sample_index: samples.len() - 1,
        timestamp: last.timestamp,
    });

    events
}

/// Group illumination events into alternating stimulus patterns.
///
/// A dark event never opens a pattern; it marks the following block as
/// preceded by darkness. Any other event opens a two-pair pattern with its
/// successor, and the run of events cycling through those two pairs is
/// consumed. A block covering `reps` repetitions contributes `2 * reps + 1`
/// change indices. When the same key recurs later, its indices are appended
/// to the existing group and its dark flag overwrites the previous one.
pub fn group_illumination_events(
    events: &[IlluminationEvent],
    config: &SegmentationConfig,
) -> Result<Vec<IlluminationGroup>, SegmentationError> {
    let non_dark = events.iter().filter(|e| !e.pair.is_dark()).count();
    if non_dark < 2 {
        return Err(SegmentationError::NoStimulusPattern { non_dark });
    }

    let mut groups: Vec<IlluminationGroup> = Vec::new();
    let mut lookup: HashMap<PatternKey, usize> = HashMap::new();

    let mut cursor = 0usize;
    let mut preceded_by_dark = config.recording_starts_dark;

    while cursor + 1 < events.len() {
        let event = &events[cursor];
        if event.pair.is_dark() {
            preceded_by_dark = true;
            cursor += 1;
            continue;
        }

        let key = PatternKey::new(event.pair, events[cursor + 1].pair);
        let available = events.len() - cursor;
        let run = events[cursor..]
            .iter()
            .take_while(|e| key.contains(&e.pair))
            .count();

        let mut reps = run / 2;
        if 2 * reps + 1 > available {
            // Run reaches the sentinel: the final repetition has no closing change
            reps -= 1;
        }

        if reps == 0 {
            debug!("Pattern {} at event {} has no full repetition", key, cursor);
            cursor += 1;
            preceded_by_dark = false;
            continue;
        }

        let indices = events[cursor..cursor + 2 * reps + 1]
            .iter()
            .map(|e| e.sample_index);

        match lookup.get(&key).copied() {
            Some(slot) => {
                let group = &mut groups[slot];
                group.change_indices.extend(indices);
                group.preceded_by_dark = preceded_by_dark;
                group.occurrences += 1;
            }
            None => {
                lookup.insert(key, groups.len());
                groups.push(IlluminationGroup {
                    key,
                    change_indices: indices.collect(),
                    preceded_by_dark,
                    occurrences: 1,
                });
            }
        }

        debug!(
            "Pattern {}: {} repetitions from event {} (after dark: {})",
            key, reps, cursor, preceded_by_dark
        );

        cursor += 2 * reps;
        preceded_by_dark = false;
    }

    if groups.is_empty() {
        return Err(SegmentationError::NoStimulusPattern { non_dark });
    }

    Ok(groups)
}

/// Detect events and group them in one pass over the cleaned samples.
pub fn segment(
    samples: &[Sample],
    config: &SegmentationConfig,
) -> Result<Segmentation, SegmentationError> {
    let events = detect_illumination_events(samples);
    let groups = group_illumination_events(&events, config)?;

    debug!(
        "Segmented {} samples into {} events and {} groups",
        samples.len(),
        events.len(),
        groups.len()
    );

    Ok(Segmentation { events, groups })
}
