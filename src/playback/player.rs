//! Playback orchestration.
//!
//! The player drives the merged chronological event stream of a trace set
//! and ticks an ordered list of listeners: start, one call per event,
//! stop. Listeners are side-effect-only; they never produce events. The
//! whole loop is single-threaded and cooperative, so a stop request takes
//! effect between events, never inside one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::event::{Event, TraceSet};

/// A trace playback listener.
///
/// The history builder is one; progress publishing is another. Hooks run
/// in listener order for every event.
pub trait PlaybackListener {
    /// Called once before the first event, with access to the trace set.
    ///
    /// # Errors
    ///
    /// An error aborts playback before any event is delivered.
    fn on_start(&mut self, trace_set: &TraceSet) -> Result<()>;

    /// Called for each event, in chronological order.
    ///
    /// # Errors
    ///
    /// An error aborts playback; `on_stop` still runs.
    fn on_event(&mut self, event: &Event) -> Result<()>;

    /// Called once after the last event, or after a stop request.
    ///
    /// # Errors
    ///
    /// Returned errors are reported to the caller of `play`.
    fn on_stop(&mut self) -> Result<()>;
}

/// Cooperative stop signal for a running playback.
///
/// The handle can be cloned into another thread (a signal handler, a UI);
/// the playback loop polls it between events.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a fresh, unsignalled handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the playback loop to return after the current event.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true if a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of one playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Number of events delivered to the listeners.
    pub events: u64,
    /// True if the run ended on a stop request rather than end of
    /// stream.
    pub stopped_early: bool,
}

/// Plays a trace set through the given listeners.
///
/// Every listener sees every event; a stop request cleanly unwinds
/// between events. `on_stop` runs on all listeners even when an event
/// hook fails, and the first error wins.
///
/// # Errors
///
/// Propagates the first listener or stream error.
pub fn play(
    trace_set: &mut TraceSet,
    listeners: &mut [Box<dyn PlaybackListener + '_>],
    stop: &StopHandle,
) -> Result<PlaybackSummary> {
    info!(traces = trace_set.len(), "starting playback");

    for listener in listeners.iter_mut() {
        listener.on_start(trace_set)?;
    }

    let mut events: u64 = 0;
    let mut stopped_early = false;
    let mut failure = None;

    loop {
        if stop.is_stopped() {
            stopped_early = true;
            break;
        }

        let event = match trace_set.next_event() {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                failure = Some(err);
                break;
            }
        };

        events += 1;

        for listener in listeners.iter_mut() {
            if let Err(err) = listener.on_event(&event) {
                failure = Some(err);
                break;
            }
        }

        if failure.is_some() {
            break;
        }
    }

    for listener in listeners.iter_mut() {
        let result = listener.on_stop();
        if failure.is_none() {
            failure = result.err();
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }

    debug!(events, stopped_early, "playback finished");
    Ok(PlaybackSummary {
        events,
        stopped_early,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::event::schema::{EventSource, TraceInfo, TraceOpener};
    use crate::event::FieldValue;
    use crate::types::{EventId, Time, TraceId};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    struct VecSource(std::vec::IntoIter<Event>);

    impl EventSource for VecSource {
        fn next_event(&mut self) -> Result<Option<Event>> {
            Ok(self.0.next())
        }
    }

    struct CountOpener(u64);

    impl TraceOpener for CountOpener {
        fn open(&self, id: TraceId, path: &Path) -> Result<(TraceInfo, Box<dyn EventSource>)> {
            let events: Vec<Event> = (0..self.0)
                .map(|i| Event {
                    trace_id: id,
                    id: EventId::from_raw(0),
                    name: "tick".to_owned(),
                    ts: Time::from_nanos(i * 10),
                    fields: FieldValue::Null,
                })
                .collect();

            let mut schema = BTreeMap::new();
            schema.insert("tick".to_owned(), EventId::from_raw(0));

            Ok((
                TraceInfo::new(id, PathBuf::from(path), BTreeMap::new(), schema, None, None),
                Box::new(VecSource(events.into_iter())),
            ))
        }
    }

    #[derive(Default)]
    struct RecorderState {
        started: bool,
        stopped: bool,
        timestamps: Vec<u64>,
        stop_after: Option<(u64, StopHandle)>,
        fail_on_event: bool,
    }

    /// Listener whose state outlives the boxed listener list.
    #[derive(Clone, Default)]
    struct Recorder(std::rc::Rc<std::cell::RefCell<RecorderState>>);

    impl PlaybackListener for Recorder {
        fn on_start(&mut self, _trace_set: &TraceSet) -> Result<()> {
            self.0.borrow_mut().started = true;
            Ok(())
        }

        fn on_event(&mut self, event: &Event) -> Result<()> {
            let mut state = self.0.borrow_mut();
            if state.fail_on_event {
                return Err(Error::builder("listener failure"));
            }

            state.timestamps.push(event.ts.as_nanos());
            if let Some((after, stop)) = &state.stop_after {
                if state.timestamps.len() as u64 >= *after {
                    stop.stop();
                }
            }
            Ok(())
        }

        fn on_stop(&mut self) -> Result<()> {
            self.0.borrow_mut().stopped = true;
            Ok(())
        }
    }

    fn run(recorder: &Recorder, count: u64, stop: &StopHandle) -> Result<PlaybackSummary> {
        let mut set = TraceSet::new();
        set.add_trace(&CountOpener(count), Path::new("t")).unwrap();

        let mut listeners: Vec<Box<dyn PlaybackListener>> = vec![Box::new(recorder.clone())];
        play(&mut set, &mut listeners, stop)
    }

    #[test]
    fn delivers_all_events_in_order() {
        let recorder = Recorder::default();
        let summary = run(&recorder, 4, &StopHandle::new()).unwrap();

        assert_eq!(summary.events, 4);
        assert!(!summary.stopped_early);

        let state = recorder.0.borrow();
        assert!(state.started);
        assert!(state.stopped);
        assert_eq!(state.timestamps, [0, 10, 20, 30]);
    }

    #[test]
    fn stop_request_unwinds_between_events() {
        let stop = StopHandle::new();
        let recorder = Recorder::default();
        recorder.0.borrow_mut().stop_after = Some((2, stop.clone()));

        let summary = run(&recorder, 10, &stop).unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.events, 2);
    }

    #[test]
    fn listener_error_still_runs_on_stop() {
        let recorder = Recorder::default();
        recorder.0.borrow_mut().fail_on_event = true;

        assert!(run(&recorder, 3, &StopHandle::new()).is_err());
        assert!(recorder.0.borrow().stopped);
    }
}
