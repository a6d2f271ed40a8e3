//! Defect classification for one recording.
//!
//! A single forward scan over the file's records (on-disk order, no
//! reordering needed since only aggregate statistics are computed) decides
//! which firmware defects the file suffers from. The scan never mutates
//! records; its only product is the [`Verdict`].

use std::path::Path;

use log::debug;

use crate::config::ClassifierConfig;
use crate::core::loaders::{read_sequential, Result};
use crate::core::records::{Payload, Record, ReadingKind};

/// Immutable per-file classification outcome.
///
/// The flags are not mutually exclusive; a file is fine only when none of
/// them is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// File predates the SI patch: acceleration is in milli-g, magnetic
    /// field in micro-Tesla.
    pub before_si_patch: bool,
    /// File was produced by the broken patch with its fixed-offset bug.
    pub from_broken_patch: bool,
    /// Switch-state records must be dropped from this file.
    pub remove_switch_state: bool,
}

impl Verdict {
    /// A file needing no correction at all.
    pub fn fine() -> Self {
        Self {
            before_si_patch: false,
            from_broken_patch: false,
            remove_switch_state: false,
        }
    }

    /// True when no defect flag is set; such files are copied byte-for-byte.
    pub fn is_fine(&self) -> bool {
        !self.before_si_patch && !self.from_broken_patch && !self.remove_switch_state
    }
}

/// Running statistics over the qualifying acceleration records of one file.
///
/// Constructed fresh per file and discarded after [`finish`]; no
/// classification state ever crosses a file boundary.
#[derive(Debug, Default)]
pub struct ClassificationAccumulator {
    magnitude_sum: f64,
    sample_count: u64,
    last_sample: Option<[f64; 3]>,
    max_delta: [f64; 3],
}

impl ClassificationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the statistics.
    ///
    /// Only decodable SI-named acceleration records qualify; everything else
    /// is ignored.
    pub fn update(&mut self, record: &Record) {
        if record.kind() != Some(ReadingKind::Acceleration) {
            return;
        }
        let Payload::Triplet { x, y, z } = record.payload else {
            return;
        };

        let sample = [x as f64, y as f64, z as f64];
        self.magnitude_sum +=
            (sample[0] * sample[0] + sample[1] * sample[1] + sample[2] * sample[2]).sqrt();
        self.sample_count += 1;

        // Deltas are against the immediately preceding qualifying record,
        // not a smoothed baseline.
        if let Some(prev) = self.last_sample {
            for axis in 0..3 {
                let delta = (sample[axis] - prev[axis]).abs();
                if delta > self.max_delta[axis] {
                    self.max_delta[axis] = delta;
                }
            }
        }
        self.last_sample = Some(sample);
    }

    /// Produce the verdict for the scanned file.
    pub fn finish(&self, config: &ClassifierConfig) -> Verdict {
        // The SI-named channel only exists on firmware revisions that also
        // mis-emit switch-state data alongside it.
        let remove_switch_state = self.sample_count > 0;

        let from_broken_patch = self
            .max_delta
            .iter()
            .any(|&delta| delta > config.broken_patch_delta);

        // Mean magnitude is undefined for zero qualifying records; such
        // files cannot be pre-SI.
        let before_si_patch = if !from_broken_patch && self.sample_count > 0 {
            let mean = self.magnitude_sum / self.sample_count as f64;
            mean > config.legacy_mean_min && mean < config.legacy_mean_max
        } else {
            false
        };

        Verdict {
            before_si_patch,
            from_broken_patch,
            remove_switch_state,
        }
    }
}

/// Classify one recording with a single sequential scan.
pub fn classify_file(path: &Path, config: &ClassifierConfig) -> Result<Verdict> {
    let mut accumulator = ClassificationAccumulator::new();
    for record in read_sequential(path)? {
        accumulator.update(&record?);
    }

    let verdict = accumulator.finish(config);
    debug!(
        "{}: before_si_patch={} from_broken_patch={} remove_switch_state={}",
        path.display(),
        verdict.before_si_patch,
        verdict.from_broken_patch,
        verdict.remove_switch_state
    );
    Ok(verdict)
}
