//! Per-record correction pass for one classified recording.
//!
//! The engine consumes the verdict produced by the classifier plus the
//! file's records in strictly ascending sample-time order (delivered by
//! [`read_ordered`]) and decides, record by record, what to rewrite and what
//! to drop. Conversions and offset corrections run in single precision to
//! match the instrument's native arithmetic; duplicate detection compares in
//! double precision and bit-exactly, because the target is the instrument
//! literally repeating a sample, not similar values.
//!
//! All dedup state lives inside one [`CorrectionEngine`] and is discarded
//! with it; carrying it across files would wrongly suppress the first
//! record of the next file.

use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use crate::config::CorrectionConfig;
use crate::core::loaders::read_ordered;
use crate::core::records::{Payload, Record, ReadingKind};
use crate::core::writers::RecordWriter;

use super::classifier::Verdict;

/// Milli-g to meters per second squared.
const MG_TO_MPS2: f32 = 9.80665 / 1000.0;

/// Micro-Tesla to Tesla.
const UT_TO_T: f32 = 1e-6;

/// Counters describing what one correction pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionStats {
    /// Records delivered to the engine.
    pub records_read: u64,
    /// Records kept and written out.
    pub records_written: u64,
    /// Switch-state records suppressed.
    pub dropped_switch_state: u64,
    /// Three-axis records dropped by the any-axis duplicate rule.
    pub dropped_duplicates: u64,
    /// Scalar records dropped as duplicates or sudden-drop glitches.
    pub dropped_scalars: u64,
    /// Headings dropped for being near zero.
    pub dropped_headings: u64,
}

/// Duplicate filter for a three-axis reading kind.
///
/// A reading is dropped when it is not the first of its kind in the file and
/// any one of its axes bit-exactly equals the corresponding axis of the
/// previous kept reading. The any-axis OR is deliberate: it reproduces the
/// instrument's observed repeat pattern, even though it is more aggressive
/// than a whole-vector comparison.
#[derive(Debug, Default)]
struct VectorDedup {
    last_kept: Option<[f64; 3]>,
}

impl VectorDedup {
    /// Decide whether to keep `sample`; records it as last-kept if so.
    fn admit(&mut self, sample: [f64; 3]) -> bool {
        if let Some(prev) = self.last_kept {
            if sample.iter().zip(prev.iter()).any(|(a, b)| a == b) {
                return false;
            }
        }
        self.last_kept = Some(sample);
        true
    }
}

/// Duplicate and glitch filter for a scalar reading kind.
#[derive(Debug, Default)]
struct ScalarDedup {
    last_kept: Option<f64>,
}

impl ScalarDedup {
    /// Decide whether to keep `value`.
    ///
    /// Drops bit-exact repeats of the previous kept value and sudden large
    /// decreases (previous − current > ratio·|previous|). Large increases
    /// pass; the asymmetry matches the sensor glitch mode being filtered.
    fn admit(&mut self, value: f64, drop_ratio: f64) -> bool {
        if let Some(prev) = self.last_kept {
            if value == prev || prev - value > drop_ratio * prev.abs() {
                return false;
            }
        }
        self.last_kept = Some(value);
        true
    }
}

/// Stateful per-file correction pass driven by a classification verdict.
pub struct CorrectionEngine<'a> {
    verdict: Verdict,
    config: &'a CorrectionConfig,
    magnetic: VectorDedup,
    angular: VectorDedup,
    altitude: ScalarDedup,
    ground_speed: ScalarDedup,
    heading: ScalarDedup,
    stats: CorrectionStats,
}

impl<'a> CorrectionEngine<'a> {
    /// Build an engine with fresh dedup state for one file.
    pub fn new(verdict: Verdict, config: &'a CorrectionConfig) -> Self {
        Self {
            verdict,
            config,
            magnetic: VectorDedup::default(),
            angular: VectorDedup::default(),
            altitude: ScalarDedup::default(),
            ground_speed: ScalarDedup::default(),
            heading: ScalarDedup::default(),
            stats: CorrectionStats::default(),
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> CorrectionStats {
        self.stats
    }

    /// Process one record; `None` means the record is dropped.
    ///
    /// Records must arrive in ascending sample-time order. Records with
    /// opaque payloads (unknown tags, decode anomalies) pass through
    /// unchanged rather than being dropped.
    pub fn apply(&mut self, record: Record) -> Option<Record> {
        self.stats.records_read += 1;
        let kept = self.dispatch(record);
        if kept.is_some() {
            self.stats.records_written += 1;
        }
        kept
    }

    fn dispatch(&mut self, record: Record) -> Option<Record> {
        let Some(kind) = record.kind() else {
            return Some(record);
        };

        match kind {
            ReadingKind::SwitchState => {
                if self.verdict.remove_switch_state {
                    self.stats.dropped_switch_state += 1;
                    None
                } else {
                    Some(record)
                }
            }
            ReadingKind::LegacyAcceleration | ReadingKind::Acceleration => {
                Some(self.correct_acceleration(record))
            }
            ReadingKind::MagneticField => self.correct_magnetic(record),
            ReadingKind::AngularVelocity => self.dedup_angular(record),
            ReadingKind::Altitude => self.filter_altitude(record),
            ReadingKind::GroundSpeed => self.filter_ground_speed(record),
            ReadingKind::GeodeticHeading => self.filter_heading(record),
        }
    }

    /// Offset correction (raw-value threshold, per axis) followed by SI
    /// conversion; both in f32.
    fn correct_acceleration(&self, record: Record) -> Record {
        let Payload::Triplet { x, y, z } = record.payload else {
            return record;
        };

        let fix = |raw: f32| -> f32 {
            let mut value = raw;
            if self.verdict.from_broken_patch && value > self.config.accel_offset_threshold {
                value -= self.config.accel_offset;
            }
            if self.verdict.before_si_patch {
                value *= MG_TO_MPS2;
            }
            value
        };

        Record {
            payload: Payload::Triplet {
                x: fix(x),
                y: fix(y),
                z: fix(z),
            },
            ..record
        }
    }

    fn correct_magnetic(&mut self, record: Record) -> Option<Record> {
        let Payload::Triplet { x, y, z } = record.payload else {
            return Some(record);
        };

        let fix = |raw: f32| -> f32 {
            let mut value = raw;
            if self.verdict.from_broken_patch && value > self.config.mag_offset_threshold {
                value -= self.config.mag_offset;
            }
            if self.verdict.before_si_patch {
                value *= UT_TO_T;
            }
            value
        };
        let (cx, cy, cz) = (fix(x), fix(y), fix(z));

        if self.magnetic.admit([cx as f64, cy as f64, cz as f64]) {
            Some(Record {
                payload: Payload::Triplet {
                    x: cx,
                    y: cy,
                    z: cz,
                },
                ..record
            })
        } else {
            self.stats.dropped_duplicates += 1;
            None
        }
    }

    fn dedup_angular(&mut self, record: Record) -> Option<Record> {
        let Payload::Triplet { x, y, z } = record.payload else {
            return Some(record);
        };

        if self.angular.admit([x as f64, y as f64, z as f64]) {
            Some(record)
        } else {
            self.stats.dropped_duplicates += 1;
            None
        }
    }

    fn filter_altitude(&mut self, record: Record) -> Option<Record> {
        let Payload::Scalar(value) = record.payload else {
            return Some(record);
        };

        if self.altitude.admit(value as f64, self.config.sudden_drop_ratio) {
            Some(record)
        } else {
            self.stats.dropped_scalars += 1;
            None
        }
    }

    fn filter_ground_speed(&mut self, record: Record) -> Option<Record> {
        let Payload::Scalar(value) = record.payload else {
            return Some(record);
        };

        if self
            .ground_speed
            .admit(value as f64, self.config.sudden_drop_ratio)
        {
            Some(record)
        } else {
            self.stats.dropped_scalars += 1;
            None
        }
    }

    fn filter_heading(&mut self, record: Record) -> Option<Record> {
        let Payload::Scalar(value) = record.payload else {
            return Some(record);
        };

        // Near-zero headings are invalid regardless of history and do not
        // become the previous-kept value.
        if (value as f64).abs() < self.config.heading_min_abs {
            self.stats.dropped_headings += 1;
            return None;
        }

        if self.heading.admit(value as f64, self.config.sudden_drop_ratio) {
            Some(record)
        } else {
            self.stats.dropped_scalars += 1;
            None
        }
    }
}

/// Run the correction pass for one file.
///
/// Records are re-read in ascending sample-time order; every kept record is
/// encoded and appended immediately, so the output never buffers in memory.
pub fn correct_file(
    input: &Path,
    output: &Path,
    verdict: Verdict,
    config: &CorrectionConfig,
) -> Result<CorrectionStats> {
    let records = read_ordered(input)
        .with_context(|| format!("Failed to read recording: {}", input.display()))?;

    let mut writer = RecordWriter::create(output)
        .with_context(|| format!("Failed to create output recording: {}", output.display()))?;

    let mut engine = CorrectionEngine::new(verdict, config);
    for record in records {
        if let Some(kept) = engine.apply(record) {
            writer
                .append(&kept)
                .with_context(|| format!("Failed to write record to {}", output.display()))?;
        }
    }

    let stats = engine.stats();
    debug!(
        "{}: read {} wrote {} (switch {}, dup {}, scalar {}, heading {})",
        input.display(),
        stats.records_read,
        stats.records_written,
        stats.dropped_switch_state,
        stats.dropped_duplicates,
        stats.dropped_scalars,
        stats.dropped_headings
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::read_sequential;
    use tempfile::TempDir;

    fn run_engine(verdict: Verdict, records: Vec<Record>) -> Vec<Record> {
        let config = CorrectionConfig::default();
        let mut engine = CorrectionEngine::new(verdict, &config);
        records
            .into_iter()
            .filter_map(|r| engine.apply(r))
            .collect()
    }

    fn pre_si_verdict() -> Verdict {
        Verdict {
            before_si_patch: true,
            from_broken_patch: false,
            remove_switch_state: true,
        }
    }

    fn broken_verdict() -> Verdict {
        Verdict {
            before_si_patch: false,
            from_broken_patch: true,
            remove_switch_state: true,
        }
    }

    fn triplet_of(record: &Record) -> (f32, f32, f32) {
        match record.payload {
            Payload::Triplet { x, y, z } => (x, y, z),
            _ => panic!("expected triplet payload"),
        }
    }

    #[test]
    fn test_milli_g_conversion() {
        let records = vec![Record::triplet(
            ReadingKind::Acceleration,
            10,
            1000.0,
            0.0,
            -1000.0,
        )];
        let kept = run_engine(pre_si_verdict(), records);

        let (x, _, z) = triplet_of(&kept[0]);
        assert!((x - 9.80665).abs() < 1e-4);
        assert!((z + 9.80665).abs() < 1e-4);
    }

    #[test]
    fn test_legacy_channel_gets_same_conversion() {
        let records = vec![Record::triplet(
            ReadingKind::LegacyAcceleration,
            10,
            1000.0,
            0.0,
            0.0,
        )];
        let kept = run_engine(pre_si_verdict(), records);
        let (x, _, _) = triplet_of(&kept[0]);
        assert!((x - 9.80665).abs() < 1e-4);
    }

    #[test]
    fn test_magnetic_conversion() {
        let records = vec![Record::triplet(
            ReadingKind::MagneticField,
            10,
            25.0,
            0.0,
            -40.0,
        )];
        let kept = run_engine(pre_si_verdict(), records);
        let (x, _, z) = triplet_of(&kept[0]);
        assert!((x - 25.0e-6).abs() < 1e-10);
        assert!((z + 40.0e-6).abs() < 1e-10);
    }

    #[test]
    fn test_broken_patch_offset_applies_above_threshold() {
        let records = vec![Record::triplet(
            ReadingKind::Acceleration,
            10,
            2600.0,
            1200.0,
            0.0,
        )];
        let kept = run_engine(broken_verdict(), records);

        let (x, y, _) = triplet_of(&kept[0]);
        assert!((x - 87.126).abs() < 1e-3);
        // 1200 is at or below the 1250 threshold and stays untouched.
        assert_eq!(y, 1200.0);
    }

    #[test]
    fn test_broken_patch_magnetic_offset() {
        let records = vec![Record::triplet(
            ReadingKind::MagneticField,
            10,
            0.025,
            0.005,
            0.0,
        )];
        let kept = run_engine(broken_verdict(), records);
        let (x, y, _) = triplet_of(&kept[0]);
        assert!((x - (0.025 - 0.019_660_5)).abs() < 1e-6);
        assert_eq!(y, 0.005);
    }

    #[test]
    fn test_switch_state_suppression() {
        let switch = Record::opaque(ReadingKind::SwitchState.tag(), 10, vec![1]);

        let kept = run_engine(broken_verdict(), vec![switch.clone()]);
        assert!(kept.is_empty());

        let benign = Verdict {
            before_si_patch: false,
            from_broken_patch: false,
            remove_switch_state: false,
        };
        let kept = run_engine(benign, vec![switch.clone()]);
        assert_eq!(kept, vec![switch]);
    }

    #[test]
    fn test_any_single_axis_repeat_drops_record() {
        // X repeats exactly; Y and Z differ. The OR semantics still drops
        // the second record.
        let records = vec![
            Record::triplet(ReadingKind::MagneticField, 10, 1.5, 2.0, 3.0),
            Record::triplet(ReadingKind::MagneticField, 20, 1.5, 2.5, 3.5),
        ];
        let kept = run_engine(Verdict::fine(), records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].sample_time_us, 10);
    }

    #[test]
    fn test_no_axis_repeats_keeps_all() {
        let records = vec![
            Record::triplet(ReadingKind::MagneticField, 10, 1.0, 2.0, 3.0),
            Record::triplet(ReadingKind::MagneticField, 20, 1.1, 2.1, 3.1),
            Record::triplet(ReadingKind::MagneticField, 30, 1.2, 2.2, 3.2),
        ];
        let kept = run_engine(Verdict::fine(), records);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_dedup_compares_against_previous_kept() {
        // Second record is dropped (X repeats). Third matches the dropped
        // record's Y but no axis of the first (kept) record, so it stays.
        let records = vec![
            Record::triplet(ReadingKind::AngularVelocity, 10, 1.0, 2.0, 3.0),
            Record::triplet(ReadingKind::AngularVelocity, 20, 1.0, 9.0, 8.0),
            Record::triplet(ReadingKind::AngularVelocity, 30, 4.0, 9.0, 5.0),
        ];
        let kept = run_engine(Verdict::fine(), records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].sample_time_us, 30);
    }

    #[test]
    fn test_angular_velocity_never_unit_converted() {
        let records = vec![Record::triplet(
            ReadingKind::AngularVelocity,
            10,
            100.0,
            200.0,
            300.0,
        )];
        let kept = run_engine(pre_si_verdict(), records);
        assert_eq!(triplet_of(&kept[0]), (100.0, 200.0, 300.0));
    }

    #[test]
    fn test_altitude_sudden_drop_filtered() {
        let records = vec![
            Record::scalar(ReadingKind::Altitude, 10, 100.0),
            // 100 - 1 = 99 > 0.98 * 100; glitch.
            Record::scalar(ReadingKind::Altitude, 20, 1.0),
            // 100 - 3 = 97 < 98; plausible.
            Record::scalar(ReadingKind::Altitude, 30, 3.0),
        ];
        let kept = run_engine(Verdict::fine(), records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].sample_time_us, 30);
    }

    #[test]
    fn test_altitude_duplicate_filtered() {
        let records = vec![
            Record::scalar(ReadingKind::Altitude, 10, 55.5),
            Record::scalar(ReadingKind::Altitude, 20, 55.5),
            Record::scalar(ReadingKind::Altitude, 30, 55.6),
        ];
        let kept = run_engine(Verdict::fine(), records);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_sudden_increase_passes() {
        let records = vec![
            Record::scalar(ReadingKind::GroundSpeed, 10, 1.0),
            Record::scalar(ReadingKind::GroundSpeed, 20, 500.0),
        ];
        let kept = run_engine(Verdict::fine(), records);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_near_zero_heading_always_dropped() {
        let records = vec![Record::scalar(ReadingKind::GeodeticHeading, 10, 0.0005)];
        let kept = run_engine(Verdict::fine(), records);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_valid_heading_sequence_kept() {
        let records = vec![
            Record::scalar(ReadingKind::GeodeticHeading, 10, 44.9),
            Record::scalar(ReadingKind::GeodeticHeading, 20, 45.0),
        ];
        let kept = run_engine(Verdict::fine(), records);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_dropped_heading_is_not_previous_kept() {
        // The near-zero heading between two identical valid ones must not
        // shield the duplicate from detection.
        let records = vec![
            Record::scalar(ReadingKind::GeodeticHeading, 10, 45.0),
            Record::scalar(ReadingKind::GeodeticHeading, 20, 0.0002),
            Record::scalar(ReadingKind::GeodeticHeading, 30, 45.0),
        ];
        let kept = run_engine(Verdict::fine(), records);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_opaque_payload_passes_through() {
        let anomaly = Record::opaque(ReadingKind::MagneticField.tag(), 10, vec![1, 2, 3]);
        let unknown = Record::opaque(7777, 20, vec![4, 5]);
        let kept = run_engine(broken_verdict(), vec![anomaly.clone(), unknown.clone()]);
        assert_eq!(kept, vec![anomaly, unknown]);
    }

    #[test]
    fn test_stats_counters() {
        let config = CorrectionConfig::default();
        let mut engine = CorrectionEngine::new(broken_verdict(), &config);
        let records = vec![
            Record::opaque(ReadingKind::SwitchState.tag(), 10, vec![1]),
            Record::triplet(ReadingKind::MagneticField, 20, 0.001, 0.002, 0.003),
            Record::triplet(ReadingKind::MagneticField, 30, 0.001, 0.004, 0.005),
            Record::scalar(ReadingKind::GeodeticHeading, 40, 0.0),
        ];
        for record in records {
            engine.apply(record);
        }

        let stats = engine.stats();
        assert_eq!(stats.records_read, 4);
        assert_eq!(stats.records_written, 1);
        assert_eq!(stats.dropped_switch_state, 1);
        assert_eq!(stats.dropped_duplicates, 1);
        assert_eq!(stats.dropped_headings, 1);
    }

    #[test]
    fn test_correct_file_orders_output_by_sample_time() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.rec");
        let output = temp_dir.path().join("out.rec");

        let mut writer = RecordWriter::create(&input).unwrap();
        writer
            .append(&Record::scalar(ReadingKind::Altitude, 300, 10.0))
            .unwrap();
        writer
            .append(&Record::scalar(ReadingKind::Altitude, 100, 11.0))
            .unwrap();
        writer
            .append(&Record::scalar(ReadingKind::Altitude, 200, 12.0))
            .unwrap();
        drop(writer);

        let stats = correct_file(
            &input,
            &output,
            Verdict::fine(),
            &CorrectionConfig::default(),
        )
        .unwrap();
        assert_eq!(stats.records_written, 3);

        let times: Vec<i64> = read_sequential(&output)
            .unwrap()
            .map(|r| r.unwrap().sample_time_us)
            .collect();
        assert_eq!(times, vec![100, 200, 300]);
    }
}
