//! Record writer for the recording container format.
//!
//! Encoding is the exact inverse of decoding in [`super::loaders`]: each
//! record is emitted as `[u32 tag][i64 sample_time_us][u32 payload_len]`
//! followed by the payload bytes, little-endian throughout. Opaque payloads
//! are written back byte-identically, so passthrough records survive a
//! decode/encode cycle unchanged.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::records::{Payload, Record};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a record to the file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Encode one record into its container representation.
pub fn encode_record(record: &Record) -> Vec<u8> {
    let payload: Vec<u8> = match &record.payload {
        Payload::Triplet { x, y, z } => {
            let mut bytes = Vec::with_capacity(12);
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
            bytes.extend_from_slice(&z.to_le_bytes());
            bytes
        }
        Payload::Scalar(value) => value.to_le_bytes().to_vec(),
        Payload::Opaque(bytes) => bytes.clone(),
    };

    let mut out = Vec::with_capacity(16 + payload.len());
    out.extend_from_slice(&record.tag.to_le_bytes());
    out.extend_from_slice(&record.sample_time_us.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Append-only writer for one output recording.
///
/// Every [`append`](RecordWriter::append) flushes, so a failed run never
/// leaves silently buffered records behind.
pub struct RecordWriter {
    writer: BufWriter<File>,
    path: String,
}

impl RecordWriter {
    /// Create the output file, making parent directories as needed.
    pub fn create(path: &Path) -> Result<Self> {
        ensure_parent_dirs(path)?;
        let file = File::create(path).map_err(|e| WriteError::CreateFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            writer: BufWriter::with_capacity(64 * 1024, file),
            path: path.display().to_string(),
        })
    }

    /// Encode and append one record, flushing immediately.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        let bytes = encode_record(record);
        self.writer
            .write_all(&bytes)
            .and_then(|_| self.writer.flush())
            .map_err(|e| WriteError::WriteFile {
                path: self.path.clone(),
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::read_sequential;
    use crate::core::records::ReadingKind;
    use tempfile::TempDir;

    #[test]
    fn test_encode_layout() {
        let record = Record::scalar(ReadingKind::GroundSpeed, 0x0102_0304, 1.0);
        let bytes = encode_record(&record);

        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[0..4], &ReadingKind::GroundSpeed.tag().to_le_bytes());
        assert_eq!(&bytes[4..12], &0x0102_0304i64.to_le_bytes());
        assert_eq!(&bytes[12..16], &4u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_write_then_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.rec");

        let records = vec![
            Record::triplet(ReadingKind::Acceleration, 10, 0.1, -0.2, 9.8),
            Record::scalar(ReadingKind::GeodeticHeading, 20, 45.0),
            Record::opaque(ReadingKind::SwitchState.tag(), 30, vec![0x01, 0x00]),
        ];

        let mut writer = RecordWriter::create(&path).unwrap();
        for record in &records {
            writer.append(record).unwrap();
        }

        let read_back: Vec<Record> = read_sequential(&path)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(read_back, records);
    }

    #[test]
    fn test_create_makes_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("deeper").join("out.rec");

        let mut writer = RecordWriter::create(&path).unwrap();
        writer
            .append(&Record::scalar(ReadingKind::Altitude, 1, 2.0))
            .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_opaque_round_trip_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.rec");

        let record = Record::opaque(4242, -17, vec![9, 8, 7, 6, 5, 4]);
        let encoded = encode_record(&record);

        let mut writer = RecordWriter::create(&path).unwrap();
        writer.append(&record).unwrap();
        drop(writer);

        assert_eq!(std::fs::read(&path).unwrap(), encoded);
    }
}
