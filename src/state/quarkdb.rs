//! Quark database file format.
//!
//! A quark database is the on-disk image of one [`QuarkRegistry`] quark
//! space. It is a plain sequence of records, in interning order:
//!
//! ```text
//! +----------------------+
//! | string bytes, 0x00   |  NUL-terminated UTF-8 string
//! +----------------------+
//! | zero padding         |  to the next multiple of 4 bytes
//! +----------------------+
//! | quark (u32 LE)       |
//! +----------------------+
//! ```
//!
//! Every record starts 4-byte aligned, so the alignment is preserved by
//! construction. Readers tolerate a terminal truncated record and reject
//! it with [`QuarkDbError::Truncated`].
//!
//! [`QuarkRegistry`]: crate::state::QuarkRegistry

use std::io::{Read, Write};

use crate::types::Quark;

/// Record alignment in bytes; the width of a serialised quark.
const ALIGN: usize = 4;

/// Errors produced while reading or writing a quark database.
#[derive(Debug, thiserror::Error)]
pub enum QuarkDbError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file ends in the middle of a record.
    #[error("truncated record at offset {offset}")]
    Truncated {
        /// Byte offset of the start of the truncated record.
        offset: usize,
    },

    /// A record's string bytes are not valid UTF-8.
    #[error("invalid UTF-8 in record at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the start of the offending record.
        offset: usize,
    },
}

impl From<QuarkDbError> for crate::error::Error {
    fn from(e: QuarkDbError) -> Self {
        Self::new(crate::error::ErrorKind::Io)
            .with_context("quark database")
            .with_source(e)
    }
}

/// Writes `(string, quark)` records to `writer` in iteration order.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub fn write_records<'a, W, I>(writer: &mut W, records: I) -> Result<(), QuarkDbError>
where
    W: Write,
    I: Iterator<Item = (&'a str, Quark)>,
{
    const ZEROS: [u8; ALIGN] = [0; ALIGN];

    for (string, quark) in records {
        writer.write_all(string.as_bytes())?;

        // NUL terminator plus padding up to the next 4-byte boundary
        let pad = ALIGN - (string.len() % ALIGN);
        writer.write_all(&ZEROS[..pad])?;

        writer.write_all(&quark.as_raw().to_le_bytes())?;
    }

    Ok(())
}

/// Reads every `(string, quark)` record from `reader`.
///
/// # Errors
///
/// Returns [`QuarkDbError::Truncated`] if the stream ends mid-record and
/// [`QuarkDbError::InvalidUtf8`] for undecodable string bytes.
pub fn read_records<R: Read>(reader: &mut R) -> Result<Vec<(String, Quark)>, QuarkDbError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;

    let mut records = Vec::new();
    let mut pos = 0;

    while pos < buf.len() {
        let start = pos;

        let Some(nul) = buf[pos..].iter().position(|&b| b == 0) else {
            return Err(QuarkDbError::Truncated { offset: start });
        };

        let string = std::str::from_utf8(&buf[pos..pos + nul])
            .map_err(|_| QuarkDbError::InvalidUtf8 { offset: start })?
            .to_owned();

        // skip the string, its terminator and the alignment padding
        pos += nul + 1;
        pos += (ALIGN - (pos - start) % ALIGN) % ALIGN;

        let Some(raw) = buf.get(pos..pos + ALIGN) else {
            return Err(QuarkDbError::Truncated { offset: start });
        };

        let quark = Quark::from_raw(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]));
        pos += ALIGN;

        records.push((string, quark));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(strings: &[&str]) -> Vec<(String, Quark)> {
        let records: Vec<(&str, Quark)> = strings
            .iter()
            .enumerate()
            .map(|(i, &s)| (s, Quark::from_raw(i as u32)))
            .collect();

        let mut bytes = Vec::new();
        write_records(&mut bytes, records.into_iter()).unwrap();
        read_records(&mut bytes.as_slice()).unwrap()
    }

    #[test]
    fn empty_db_round_trips() {
        assert!(roundtrip(&[]).is_empty());
    }

    #[test]
    fn records_round_trip_in_order() {
        let got = roundtrip(&["", "α", "long-subpath/x", "z"]);
        let strings: Vec<&str> = got.iter().map(|(s, _)| s.as_str()).collect();
        let quarks: Vec<u32> = got.iter().map(|(_, q)| q.as_raw()).collect();

        assert_eq!(strings, ["", "α", "long-subpath/x", "z"]);
        assert_eq!(quarks, [0, 1, 2, 3]);
    }

    #[test]
    fn records_are_aligned() {
        let mut bytes = Vec::new();
        write_records(
            &mut bytes,
            [("ab", Quark::from_raw(0)), ("cdef", Quark::from_raw(1))].into_iter(),
        )
        .unwrap();

        // "ab\0" padded to 4, quark at 4; "cdef\0" padded to 8, quark after
        assert_eq!(bytes.len() % ALIGN, 0);
        assert_eq!(&bytes[..4], b"ab\0\0");
        assert_eq!(&bytes[4..8], &0u32.to_le_bytes());
        assert_eq!(&bytes[8..13], b"cdef\0");
    }

    #[test]
    fn truncated_tail_is_rejected() {
        let mut bytes = Vec::new();
        write_records(
            &mut bytes,
            [("x", Quark::from_raw(0)), ("yy", Quark::from_raw(1))].into_iter(),
        )
        .unwrap();

        // chop into the final quark
        let cut = bytes.len() - 2;
        let err = read_records(&mut &bytes[..cut]).unwrap_err();
        assert!(matches!(err, QuarkDbError::Truncated { offset: 8 }));
    }

    #[test]
    fn missing_terminator_is_truncated() {
        let err = read_records(&mut &b"abc"[..]).unwrap_err();
        assert!(matches!(err, QuarkDbError::Truncated { offset: 0 }));
    }
}
