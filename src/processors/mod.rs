//! Classification, correction, and batch orchestration.

pub mod batch;
pub mod classifier;
pub mod correction;

// Re-export key types for convenience
pub use batch::{
    check_distinct_paths, find_recordings, repair_file, repair_tree, BatchError, BatchSummary,
    FileOutcome, FileReport,
};
pub use classifier::{classify_file, ClassificationAccumulator, Verdict};
pub use correction::{correct_file, CorrectionEngine, CorrectionStats};
