//! Build progress publishing.
//!
//! A [`ProgressPublisher`] is a playback listener that periodically
//! publishes a JSON progress message through a [`ProgressTransport`]. The
//! transport behind it is external; the crate ships a line-oriented
//! writer transport good enough for files and FIFOs.

use std::fs::File;
use std::io::Write;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::event::{Event, TraceSet};
use crate::playback::player::PlaybackListener;
use crate::types::Time;

/// Default number of events between two progress updates.
pub const DEFAULT_UPDATE_EVENTS: u64 = 2801;

/// Default minimum time between two progress updates.
pub const DEFAULT_UPDATE_PERIOD: Duration = Duration::from_millis(200);

/// One progress update, serialised as a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressUpdate {
    /// Events processed so far.
    pub events: u64,
    /// Timestamp of the last processed event, in nanoseconds.
    pub ts: Option<u64>,
    /// Completion ratio in `[0, 1]`, when the trace set bounds are
    /// known.
    pub progress: Option<f64>,
    /// True on the final update.
    pub done: bool,
}

/// Transport publishing progress payloads to interested parties.
pub trait ProgressTransport {
    /// Publishes one opaque payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be delivered.
    fn publish(&mut self, payload: &[u8]) -> Result<()>;
}

/// Line-oriented transport writing each payload to a file or FIFO.
pub struct WriterTransport {
    writer: Box<dyn Write>,
}

impl std::fmt::Debug for WriterTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterTransport").finish_non_exhaustive()
    }
}

impl WriterTransport {
    /// Binds the transport to an endpoint path.
    ///
    /// # Errors
    ///
    /// Returns an `MqBind` error if the endpoint cannot be opened for
    /// writing.
    pub fn bind(endpoint: &str) -> Result<Self> {
        let file = File::create(endpoint).map_err(|e| {
            Error::new(ErrorKind::MqBind)
                .with_context(endpoint.to_owned())
                .with_source(e)
        })?;

        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Wraps an arbitrary writer.
    #[must_use]
    pub fn from_writer(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl ProgressTransport for WriterTransport {
    fn publish(&mut self, payload: &[u8]) -> Result<()> {
        self.writer.write_all(payload)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Playback listener publishing throttled progress updates.
pub struct ProgressPublisher {
    transport: Box<dyn ProgressTransport>,
    update_events: u64,
    update_period: Duration,
    events: u64,
    last_ts: Option<Time>,
    last_update: Option<Instant>,
    span: Option<(Time, Time)>,
}

impl ProgressPublisher {
    /// Creates a publisher with the default throttling.
    #[must_use]
    pub fn new(transport: Box<dyn ProgressTransport>) -> Self {
        Self::with_throttle(transport, DEFAULT_UPDATE_EVENTS, DEFAULT_UPDATE_PERIOD)
    }

    /// Creates a publisher updating at most once per `update_events`
    /// events and per `update_period` of wall time, whichever is later.
    #[must_use]
    pub fn with_throttle(
        transport: Box<dyn ProgressTransport>,
        update_events: u64,
        update_period: Duration,
    ) -> Self {
        Self {
            transport,
            update_events: update_events.max(1),
            update_period,
            events: 0,
            last_ts: None,
            last_update: None,
            span: None,
        }
    }

    fn update(&self, done: bool) -> ProgressUpdate {
        let progress = match (self.span, self.last_ts) {
            (Some((begin, end)), Some(ts)) if end > begin => {
                let total = end.duration_since(begin) as f64;
                Some((ts.duration_since(begin) as f64 / total).clamp(0.0, 1.0))
            }
            _ => None,
        };

        ProgressUpdate {
            events: self.events,
            ts: self.last_ts.map(Time::as_nanos),
            progress,
            done,
        }
    }

    fn publish(&mut self, done: bool) -> Result<()> {
        let update = self.update(done);
        let payload = serde_json::to_vec(&update)
            .map_err(|e| Error::builder("cannot serialise progress update").with_source(e))?;
        self.transport.publish(&payload)?;
        self.last_update = Some(Instant::now());
        Ok(())
    }
}

impl PlaybackListener for ProgressPublisher {
    fn on_start(&mut self, trace_set: &TraceSet) -> Result<()> {
        self.span = match (trace_set.begin(), trace_set.end()) {
            (Some(begin), Some(end)) => Some((begin, end)),
            _ => None,
        };
        self.events = 0;
        self.last_ts = None;

        debug!(span = ?self.span, "progress publisher armed");
        self.publish(false)
    }

    fn on_event(&mut self, event: &Event) -> Result<()> {
        self.events += 1;
        self.last_ts = Some(event.ts);

        if self.events % self.update_events != 0 {
            return Ok(());
        }

        let elapsed_enough = self
            .last_update
            .map_or(true, |last| last.elapsed() >= self.update_period);
        if elapsed_enough {
            self.publish(false)?;
        }

        Ok(())
    }

    fn on_stop(&mut self) -> Result<()> {
        self.publish(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::schema::{EventSource, TraceInfo, TraceOpener};
    use crate::event::FieldValue;
    use crate::playback::player::{play, StopHandle};
    use crate::types::{EventId, TraceId};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    struct MemoryTransport(Rc<RefCell<Vec<ProgressUpdate>>>);

    impl ProgressTransport for MemoryTransport {
        fn publish(&mut self, payload: &[u8]) -> Result<()> {
            let update: ProgressUpdate = serde_json::from_slice(payload)
                .map_err(|e| Error::builder("bad payload").with_source(e))?;
            self.0.borrow_mut().push(update);
            Ok(())
        }
    }

    struct VecSource(std::vec::IntoIter<Event>);

    impl EventSource for VecSource {
        fn next_event(&mut self) -> Result<Option<Event>> {
            Ok(self.0.next())
        }
    }

    struct SpanOpener;

    impl TraceOpener for SpanOpener {
        fn open(&self, id: TraceId, path: &Path) -> Result<(TraceInfo, Box<dyn EventSource>)> {
            let events: Vec<Event> = (0..=10)
                .map(|i| Event {
                    trace_id: id,
                    id: EventId::from_raw(0),
                    name: "tick".to_owned(),
                    ts: Time::from_nanos(i * 100),
                    fields: FieldValue::Null,
                })
                .collect();

            let mut schema = BTreeMap::new();
            schema.insert("tick".to_owned(), EventId::from_raw(0));

            Ok((
                TraceInfo::new(
                    id,
                    PathBuf::from(path),
                    BTreeMap::new(),
                    schema,
                    Some(Time::from_nanos(0)),
                    Some(Time::from_nanos(1000)),
                ),
                Box::new(VecSource(events.into_iter())),
            ))
        }
    }

    #[test]
    fn publishes_throttled_updates_and_final_done() {
        let updates = Rc::new(RefCell::new(Vec::new()));
        let publisher = ProgressPublisher::with_throttle(
            Box::new(MemoryTransport(Rc::clone(&updates))),
            5,
            Duration::ZERO,
        );

        let mut set = TraceSet::new();
        set.add_trace(&SpanOpener, Path::new("t")).unwrap();

        let mut listeners: Vec<Box<dyn PlaybackListener>> = vec![Box::new(publisher)];
        play(&mut set, &mut listeners, &StopHandle::new()).unwrap();

        let updates = updates.borrow();
        // initial, after event 5, after event 10, final
        assert_eq!(updates.len(), 4);
        assert!(!updates[0].done);
        assert_eq!(updates[0].events, 0);
        assert_eq!(updates[1].events, 5);
        assert!(updates.last().unwrap().done);
        assert_eq!(updates.last().unwrap().events, 11);
        assert_eq!(updates.last().unwrap().progress, Some(1.0));
    }

    #[test]
    fn bind_failure_is_mq_bind() {
        let err = WriterTransport::bind("/nonexistent-dir/progress").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MqBind);
    }
}
