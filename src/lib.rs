//! Repair pipeline for GPS/IMU sensor recordings.
//!
//! The peripheral that produced these recordings went through several
//! incompatible firmware revisions: an early one emitted non-SI units, a
//! later broken patch added a fixed numeric offset, and some revisions
//! duplicated or corrupted specific reading channels. This crate provides:
//! - Streaming readers/writers for the length-prefixed record container
//! - A statistical per-file defect classifier
//! - A two-pass correction engine (unit conversion, offset correction,
//!   channel suppression, duplicate filtering) preserving temporal order
//! - A batch driver that repairs a whole directory tree, file-for-file
//!
//! # Example
//!
//! ```no_run
//! use rec_repair::config::PipelineConfig;
//! use rec_repair::processors::repair_tree;
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let summary = repair_tree(Path::new("raw"), Path::new("fixed"), &config).unwrap();
//! println!("{} files rewritten", summary.files_rewritten);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{ClassifierConfig, CorrectionConfig, PipelineConfig};
pub use core::records::{Payload, Record, ReadingKind, RECORDING_EXTENSION};
pub use processors::{BatchSummary, CorrectionStats, Verdict};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
