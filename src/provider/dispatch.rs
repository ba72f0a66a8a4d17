//! Event callback dispatch.
//!
//! Providers subscribe to events by (trace type, event name) patterns.
//! Pattern matching happens once, at registration time, against the trace
//! set's declared schema; the per-event hot path is then two integer hash
//! lookups, never a string compare or a regex scan.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::event::{Event, TraceSet};
use crate::state::CurrentState;
use crate::types::{EventId, TraceId};

/// A provider event callback.
///
/// Returns `true` to continue playback; `false` is a continuation hint
/// only, the engine never unwinds on it. Callbacks are shared handles so
/// that one callback can serve many (trace, event) slots.
pub type EventCallback = Rc<RefCell<dyn FnMut(&mut CurrentState<'_>, &Event) -> bool>>;

/// Wraps a closure into a shareable [`EventCallback`].
pub fn callback(f: impl FnMut(&mut CurrentState<'_>, &Event) -> bool + 'static) -> EventCallback {
    Rc::new(RefCell::new(f))
}

fn matches_simple(asked: &str, candidate: &str) -> bool {
    asked.is_empty() || asked == candidate
}

/// Callback table for one provider.
///
/// Slots are keyed by `(trace id, event id)` and obey first-match-wins:
/// once a slot is installed, later registrations never overwrite it, so
/// catch-all patterns must be registered after the specific ones.
#[derive(Default)]
pub struct CallbackRegistry {
    slots: HashMap<TraceId, HashMap<EventId, EventCallback>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every installed slot.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Returns the number of installed slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.values().map(HashMap::len).sum()
    }

    /// Returns true if no slot is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers `cb` for every schema pair matched literally by
    /// `(trace_type, event_name)`; an empty string matches any name in
    /// its position. Returns true if at least one free slot was
    /// installed.
    pub fn register_simple(
        &mut self,
        trace_set: &TraceSet,
        trace_type: &str,
        event_name: &str,
        cb: &EventCallback,
    ) -> bool {
        self.install_matching(
            trace_set,
            |candidate| matches_simple(trace_type, candidate),
            |candidate| matches_simple(event_name, candidate),
            cb,
        )
    }

    /// Registers `cb` for every schema pair matched by the two regular
    /// expressions (unanchored search). Returns true if at least one
    /// free slot was installed.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidArgument` error if either pattern fails to
    /// compile.
    pub fn register_regex(
        &mut self,
        trace_set: &TraceSet,
        trace_type_re: &str,
        event_name_re: &str,
        cb: &EventCallback,
    ) -> Result<bool> {
        let trace_re = Regex::new(trace_type_re).map_err(|e| {
            Error::invalid_argument(format!("bad trace type pattern \"{trace_type_re}\""))
                .with_source(e)
        })?;
        let event_re = Regex::new(event_name_re).map_err(|e| {
            Error::invalid_argument(format!("bad event name pattern \"{event_name_re}\""))
                .with_source(e)
        })?;

        Ok(self.install_matching(
            trace_set,
            |candidate| trace_re.is_match(candidate),
            |candidate| event_re.is_match(candidate),
            cb,
        ))
    }

    fn install_matching(
        &mut self,
        trace_set: &TraceSet,
        trace_matches: impl Fn(&str) -> bool,
        event_matches: impl Fn(&str) -> bool,
        cb: &EventCallback,
    ) -> bool {
        let mut installed = false;

        for trace in trace_set.traces() {
            if !trace_matches(trace.trace_type()) {
                continue;
            }

            for (event_name, &event_id) in trace.events() {
                if !event_matches(event_name) {
                    continue;
                }

                let slot = self.slots.entry(trace.id()).or_default();
                if !slot.contains_key(&event_id) {
                    slot.insert(event_id, Rc::clone(cb));
                    installed = true;
                }
            }
        }

        installed
    }

    /// Dispatches `event` to its slot, if one is installed.
    ///
    /// Returns the callback's continuation hint, or `None` when no slot
    /// matched and the event was dropped.
    pub fn dispatch(&mut self, state: &mut CurrentState<'_>, event: &Event) -> Option<bool> {
        let cb = self.slots.get(&event.trace_id)?.get(&event.id)?;
        Some((&mut *cb.borrow_mut())(state, event))
    }
}
