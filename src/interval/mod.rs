//! State intervals and the interval sink contract.
//!
//! An interval is one closed period of a node's history: the value that was
//! in effect at a node between two timestamps. The construction engine
//! emits intervals through an [`IntervalSink`]; the file-backed
//! implementation lives in [`file`].

pub mod file;

pub use file::{IntervalFileError, IntervalFileReader, IntervalFileSink};

use core::fmt;

use crate::state::Value;
use crate::types::{NodeId, Time};

/// A closed time range together with the value in effect over it at a
/// given node.
///
/// For any node, the emitted sequence of intervals is non-overlapping and
/// sorted by `begin`, with `begin <= end` for each record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Timestamp at which the value took effect.
    pub begin: Time,
    /// Timestamp at which the value was replaced.
    pub end: Time,
    /// Node whose history this interval belongs to.
    pub node_id: NodeId,
    /// The value in effect over the range. Never `Null`: null periods are
    /// observable only as gaps between intervals.
    pub value: Value,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] node {} = {}",
            self.begin, self.end, self.node_id, self.value
        )
    }
}

/// Destination for emitted intervals.
///
/// The sink library behind this trait owns the history file format. The
/// engine guarantees a single writer and exactly one `close` call; `append`
/// after `close` is a contract violation surfaced as an error.
pub trait IntervalSink {
    /// Appends one interval record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn append(&mut self, interval: &Interval) -> Result<(), IntervalFileError>;

    /// Writes the trailer and closes the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if finalisation fails or the sink was already
    /// closed.
    fn close(&mut self) -> Result<(), IntervalFileError>;
}
