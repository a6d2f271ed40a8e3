//! Core record model and container I/O.

pub mod loaders;
pub mod records;
pub mod writers;

pub use loaders::{read_ordered, read_sequential, LoaderError, RecordReader};
pub use records::{Payload, Record, ReadingKind, RECORDING_EXTENSION};
pub use writers::{encode_record, RecordWriter, WriteError};
