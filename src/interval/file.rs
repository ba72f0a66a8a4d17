//! File-backed interval sink.
//!
//! This is the reference history file implementation behind the
//! [`IntervalSink`] trait. The format favours append speed and a trivial
//! reader over compactness:
//!
//! ```text
//! +--------------------+
//! | Magic (8 bytes)    |  "SHISTIVL"
//! +--------------------+
//! | Version (2 bytes)  |  u16 little-endian
//! +--------------------+
//! | Flags (2 bytes)    |  u16 little-endian, reserved
//! +--------------------+
//! | Count (8 bytes)    |  u64 little-endian, patched on close
//! +--------------------+
//! | Records (33 bytes) |  begin u64, end u64, node id u64,
//! |  ...               |  value tag u8, payload u64 (all LE)
//! +--------------------+
//! ```
//!
//! Integer payloads are sign-extended to 64 bits; float payloads store the
//! IEEE-754 bit pattern.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::state::{Value, ValueTag};
use crate::types::{NodeId, Quark, Time};

use super::{Interval, IntervalSink};

/// Magic bytes at the start of every history file.
pub const INTERVAL_MAGIC: &[u8; 8] = b"SHISTIVL";

/// Current file format version.
pub const INTERVAL_FILE_VERSION: u16 = 1;

/// Byte offset of the record count within the header.
const COUNT_POS: u64 = 12;

/// Size of the fixed header.
const HEADER_SIZE: usize = 20;

/// Size of one serialised record.
const RECORD_SIZE: usize = 33;

/// Errors produced by the file-backed interval sink.
#[derive(Debug, thiserror::Error)]
pub enum IntervalFileError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid magic bytes in the header.
    #[error("invalid magic bytes: not a history file")]
    InvalidMagic,

    /// Unsupported file format version.
    #[error("unsupported file version: expected <= {expected}, found {found}")]
    UnsupportedVersion {
        /// Maximum supported version.
        expected: u16,
        /// Found version.
        found: u16,
    },

    /// A record carries an unknown value tag.
    #[error("unknown value tag {0:#04x}")]
    UnknownTag(u8),

    /// A record carries a null value tag, which must never be emitted.
    #[error("null value tag in interval record")]
    NullTag,

    /// The file ends in the middle of a record or header.
    #[error("file truncated or corrupt")]
    Truncated,

    /// The sink was already closed.
    #[error("interval sink already closed")]
    AlreadyClosed,
}

impl From<IntervalFileError> for crate::error::Error {
    fn from(e: IntervalFileError) -> Self {
        Self::new(crate::error::ErrorKind::Io)
            .with_context("interval file")
            .with_source(e)
    }
}

/// Streaming writer for interval records.
///
/// Records are flushed through a buffered writer; the record count in the
/// header is patched when the sink is closed, which is also the point
/// where all buffered data reaches the file.
pub struct IntervalFileSink {
    writer: BufWriter<File>,
    count: u64,
    closed: bool,
}

impl IntervalFileSink {
    /// Creates a history file at `path`, truncating any existing file, and
    /// writes the header with a zero record count.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the header cannot
    /// be written.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, IntervalFileError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(INTERVAL_MAGIC)?;
        writer.write_all(&INTERVAL_FILE_VERSION.to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            writer,
            count: 0,
            closed: false,
        })
    }

    /// Returns the number of records appended so far.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    fn encode_payload(value: &Value) -> Result<u64, IntervalFileError> {
        match value {
            Value::I32(v) => Ok(i64::from(*v) as u64),
            Value::U32(v) => Ok(u64::from(*v)),
            Value::I64(v) => Ok(*v as u64),
            Value::U64(v) => Ok(*v),
            Value::F32(v) => Ok(u64::from(v.to_bits())),
            Value::Quark(q) => Ok(u64::from(q.as_raw())),
            Value::Null => Err(IntervalFileError::NullTag),
        }
    }
}

impl IntervalSink for IntervalFileSink {
    fn append(&mut self, interval: &Interval) -> Result<(), IntervalFileError> {
        if self.closed {
            return Err(IntervalFileError::AlreadyClosed);
        }

        let payload = Self::encode_payload(&interval.value)?;

        self.writer.write_all(&interval.begin.as_nanos().to_le_bytes())?;
        self.writer.write_all(&interval.end.as_nanos().to_le_bytes())?;
        self.writer.write_all(&interval.node_id.as_raw().to_le_bytes())?;
        self.writer.write_all(&[interval.value.tag() as u8])?;
        self.writer.write_all(&payload.to_le_bytes())?;

        self.count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), IntervalFileError> {
        if self.closed {
            return Err(IntervalFileError::AlreadyClosed);
        }

        self.closed = true;

        self.writer.flush()?;

        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(COUNT_POS))?;
        file.write_all(&self.count.to_le_bytes())?;
        file.sync_all()?;

        Ok(())
    }
}

/// Reader for history files written by [`IntervalFileSink`].
pub struct IntervalFileReader {
    reader: BufReader<File>,
    count: u64,
    read: u64,
}

impl IntervalFileReader {
    /// Opens a history file and validates its header.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, bad magic, or an unsupported
    /// version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IntervalFileError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|_| IntervalFileError::Truncated)?;

        if &header[..8] != INTERVAL_MAGIC {
            return Err(IntervalFileError::InvalidMagic);
        }

        let version = u16::from_le_bytes([header[8], header[9]]);
        if version > INTERVAL_FILE_VERSION {
            return Err(IntervalFileError::UnsupportedVersion {
                expected: INTERVAL_FILE_VERSION,
                found: version,
            });
        }

        let count = u64::from_le_bytes(header[12..20].try_into().expect("fixed slice"));

        Ok(Self {
            reader,
            count,
            read: 0,
        })
    }

    /// Returns the record count from the header.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Reads the next record, or `None` past the last one.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalFileError::Truncated`] if the file ends before
    /// the declared count is reached.
    pub fn next_interval(&mut self) -> Result<Option<Interval>, IntervalFileError> {
        if self.read == self.count {
            return Ok(None);
        }

        let mut record = [0u8; RECORD_SIZE];
        self.reader
            .read_exact(&mut record)
            .map_err(|_| IntervalFileError::Truncated)?;

        let begin = u64::from_le_bytes(record[0..8].try_into().expect("fixed slice"));
        let end = u64::from_le_bytes(record[8..16].try_into().expect("fixed slice"));
        let node_id = u64::from_le_bytes(record[16..24].try_into().expect("fixed slice"));
        let tag = record[24];
        let payload = u64::from_le_bytes(record[25..33].try_into().expect("fixed slice"));

        let value = match ValueTag::from_raw(tag) {
            Some(ValueTag::I32) => Value::I32(payload as i64 as i32),
            Some(ValueTag::U32) => Value::U32(payload as u32),
            Some(ValueTag::I64) => Value::I64(payload as i64),
            Some(ValueTag::U64) => Value::U64(payload),
            Some(ValueTag::F32) => Value::F32(f32::from_bits(payload as u32)),
            Some(ValueTag::Quark) => Value::Quark(Quark::from_raw(payload as u32)),
            Some(ValueTag::Null) => return Err(IntervalFileError::NullTag),
            None => return Err(IntervalFileError::UnknownTag(tag)),
        };

        self.read += 1;

        Ok(Some(Interval {
            begin: Time::from_nanos(begin),
            end: Time::from_nanos(end),
            node_id: NodeId::from_raw(node_id),
            value,
        }))
    }

    /// Reads all remaining records.
    ///
    /// # Errors
    ///
    /// Propagates the first record-level error.
    pub fn read_all(&mut self) -> Result<Vec<Interval>, IntervalFileError> {
        let mut intervals = Vec::new();
        while let Some(interval) = self.next_interval()? {
            intervals.push(interval);
        }
        Ok(intervals)
    }
}
