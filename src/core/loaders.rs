//! Record readers for the recording container format.
//!
//! The container is a flat little-endian sequence of length-prefixed records:
//!
//! ```text
//! [u32 tag][i64 sample_time_us][u32 payload_len][payload bytes]
//! ```
//!
//! Two read contracts are provided: [`read_sequential`] delivers records in
//! on-disk order and is what the classifier scans; [`read_ordered`] delivers
//! the same records re-sorted by ascending sample time, which the correction
//! engine requires.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::records::{Payload, Record, ReadingKind};

/// Upper bound on a single record payload; anything larger is corruption.
const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Errors that can occur while reading a recording.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to open recording {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error reading recording: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncated record in {path} at byte offset {offset}")]
    Truncated { path: PathBuf, offset: u64 },

    #[error("Implausible payload length {len} in {path} at byte offset {offset}")]
    OversizedPayload { path: PathBuf, offset: u64, len: usize },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Decode a raw payload for its declared tag.
///
/// Known kinds with the expected payload length decode to typed payloads;
/// everything else (unknown tag, wrong length, switch-state) stays opaque so
/// the record can be passed through byte-identically.
fn decode_payload(tag: u32, bytes: Vec<u8>) -> Payload {
    match ReadingKind::from_tag(tag) {
        Some(kind) if kind.is_triplet() && bytes.len() == 12 => {
            let mut axis = [0u8; 4];
            axis.copy_from_slice(&bytes[0..4]);
            let x = f32::from_le_bytes(axis);
            axis.copy_from_slice(&bytes[4..8]);
            let y = f32::from_le_bytes(axis);
            axis.copy_from_slice(&bytes[8..12]);
            let z = f32::from_le_bytes(axis);
            Payload::Triplet { x, y, z }
        }
        Some(kind) if kind.is_scalar() && bytes.len() == 4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes);
            Payload::Scalar(f32::from_le_bytes(buf))
        }
        _ => Payload::Opaque(bytes),
    }
}

/// Streaming reader over the records of one recording, in on-disk order.
pub struct RecordReader {
    reader: BufReader<File>,
    path: PathBuf,
    offset: u64,
}

impl RecordReader {
    /// Open a recording for sequential reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| LoaderError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            reader: BufReader::with_capacity(64 * 1024, file),
            path: path.to_path_buf(),
            offset: 0,
        })
    }

    /// Fill `buf` completely, or report a clean end of stream.
    ///
    /// Returns `Ok(false)` only when zero bytes were available, i.e. the file
    /// ended exactly at a record boundary. A partial fill is a truncation.
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(LoaderError::Truncated {
                    path: self.path.clone(),
                    offset: self.offset,
                });
            }
            filled += n;
        }
        self.offset += buf.len() as u64;
        Ok(true)
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let record_start = self.offset;

        let mut tag_buf = [0u8; 4];
        if !self.fill(&mut tag_buf)? {
            return Ok(None);
        }
        let tag = u32::from_le_bytes(tag_buf);

        let mut time_buf = [0u8; 8];
        if !self.fill(&mut time_buf)? {
            return Err(LoaderError::Truncated {
                path: self.path.clone(),
                offset: record_start,
            });
        }
        let sample_time_us = i64::from_le_bytes(time_buf);

        let mut len_buf = [0u8; 4];
        if !self.fill(&mut len_buf)? {
            return Err(LoaderError::Truncated {
                path: self.path.clone(),
                offset: record_start,
            });
        }
        let payload_len = u32::from_le_bytes(len_buf) as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(LoaderError::OversizedPayload {
                path: self.path.clone(),
                offset: record_start,
                len: payload_len,
            });
        }

        let mut payload = vec![0u8; payload_len];
        if payload_len > 0 && !self.fill(&mut payload)? {
            return Err(LoaderError::Truncated {
                path: self.path.clone(),
                offset: record_start,
            });
        }

        Ok(Some(Record {
            tag,
            sample_time_us,
            payload: decode_payload(tag, payload),
        }))
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Open a recording and iterate its records in on-disk order.
pub fn read_sequential(path: &Path) -> Result<RecordReader> {
    RecordReader::open(path)
}

/// Read all records of a recording, re-sorted by ascending sample time.
///
/// The sort is stable, so records sharing a timestamp keep their on-disk
/// relative order.
pub fn read_ordered(path: &Path) -> Result<Vec<Record>> {
    let mut records: Vec<Record> = read_sequential(path)?.collect::<Result<_>>()?;
    records.sort_by_key(|r| r.sample_time_us);
    Ok(records)
}
