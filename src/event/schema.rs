//! Trace set schema and event sources.
//!
//! A [`TraceSet`] is the ordered collection of input traces playback draws
//! from. Each trace contributes its declarative schema (a [`TraceInfo`]:
//! trace type, event name to id map, environment) and a sorted stream of
//! decoded events. The set merges the per-trace streams into one
//! chronological stream for the orchestrator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::event::Event;
use crate::types::{EventId, Time, TraceId};

/// A sorted stream of decoded events for one trace.
///
/// Implementations must yield events in non-decreasing timestamp order;
/// the engine performs no reordering.
pub trait EventSource {
    /// Pulls the next event, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reader fails.
    fn next_event(&mut self) -> Result<Option<Event>>;
}

/// Opens a trace file into its schema and event stream.
///
/// This is the seam to the external trace decoder: the engine only
/// requires that someone turns a path into a ([`TraceInfo`],
/// [`EventSource`]) pair.
pub trait TraceOpener {
    /// Opens the trace at `path`, assigning it the trace id `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trace cannot be opened or its schema is
    /// malformed.
    fn open(&self, id: TraceId, path: &Path) -> Result<(TraceInfo, Box<dyn EventSource>)>;
}

/// Derives the trace type from a trace's environment map.
///
/// Only LTTng domains are recognised: `kernel` and `ust` map to
/// `lttng-kernel` and `lttng-ust`, anything else to `unknown`.
#[must_use]
pub fn trace_type_from_env(env: &BTreeMap<String, String>) -> String {
    match env.get("domain").map(String::as_str) {
        Some(domain @ ("kernel" | "ust")) => format!("lttng-{domain}"),
        _ => "unknown".to_owned(),
    }
}

/// Declarative informations about one trace.
///
/// Immutable once the trace has been added to a set; this is what
/// callback registration enumerates.
#[derive(Debug, Clone)]
pub struct TraceInfo {
    id: TraceId,
    path: PathBuf,
    trace_type: String,
    env: BTreeMap<String, String>,
    events: BTreeMap<String, EventId>,
    begin: Option<Time>,
    end: Option<Time>,
}

impl TraceInfo {
    /// Builds trace informations; the trace type is derived from the
    /// `domain` key of `env`.
    #[must_use]
    pub fn new(
        id: TraceId,
        path: PathBuf,
        env: BTreeMap<String, String>,
        events: BTreeMap<String, EventId>,
        begin: Option<Time>,
        end: Option<Time>,
    ) -> Self {
        let trace_type = trace_type_from_env(&env);
        Self {
            id,
            path,
            trace_type,
            env,
            events,
            begin,
            end,
        }
    }

    /// Returns the trace's ordinal in the playback set.
    #[must_use]
    pub const fn id(&self) -> TraceId {
        self.id
    }

    /// Returns the trace file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the derived trace type, e.g. `lttng-kernel`.
    #[must_use]
    pub fn trace_type(&self) -> &str {
        &self.trace_type
    }

    /// Returns the trace environment map.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the event name to id map.
    #[must_use]
    pub const fn events(&self) -> &BTreeMap<String, EventId> {
        &self.events
    }

    /// Returns the id of a named event, if the trace declares it.
    #[must_use]
    pub fn event_id(&self, name: &str) -> Option<EventId> {
        self.events.get(name).copied()
    }

    /// Returns the first event timestamp, if known.
    #[must_use]
    pub const fn begin(&self) -> Option<Time> {
        self.begin
    }

    /// Returns the last event timestamp, if known.
    #[must_use]
    pub const fn end(&self) -> Option<Time> {
        self.end
    }
}

/// The ordered collection of input traces for one playback.
pub struct TraceSet {
    traces: Vec<TraceInfo>,
    sources: Vec<Box<dyn EventSource>>,
    /// One buffered head per source, filled lazily on the first pull.
    heads: Option<Vec<Option<Event>>>,
}

impl TraceSet {
    /// Creates an empty trace set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            traces: Vec::new(),
            sources: Vec::new(),
            heads: None,
        }
    }

    /// Opens the trace at `path` through `opener` and appends it to the
    /// set, assigning the next ordinal as its trace id.
    ///
    /// # Errors
    ///
    /// Propagates opener failures. Adding traces after playback started
    /// pulling events is a contract violation and is rejected.
    pub fn add_trace(&mut self, opener: &dyn TraceOpener, path: &Path) -> Result<TraceId> {
        if self.heads.is_some() {
            return Err(crate::error::Error::builder(
                "cannot add a trace during playback",
            ));
        }

        let id = TraceId::from_raw(self.traces.len() as u32);
        let (info, source) = opener.open(id, path)?;

        self.traces.push(info);
        self.sources.push(source);
        Ok(id)
    }

    /// Returns the traces in ordinal order.
    #[must_use]
    pub fn traces(&self) -> &[TraceInfo] {
        &self.traces
    }

    /// Returns informations about one trace.
    #[must_use]
    pub fn trace(&self, id: TraceId) -> Option<&TraceInfo> {
        self.traces.get(id.as_raw() as usize)
    }

    /// Returns the number of traces in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Returns true if the set has no traces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Returns the earliest known begin timestamp across traces.
    #[must_use]
    pub fn begin(&self) -> Option<Time> {
        self.traces.iter().filter_map(TraceInfo::begin).min()
    }

    /// Returns the latest known end timestamp across traces.
    #[must_use]
    pub fn end(&self) -> Option<Time> {
        self.traces.iter().filter_map(TraceInfo::end).max()
    }

    /// Pulls the next event of the merged chronological stream.
    ///
    /// Per-trace streams are already sorted; this is a k-way merge that
    /// breaks timestamp ties by trace ordinal.
    ///
    /// # Errors
    ///
    /// Propagates the first source failure.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if self.heads.is_none() {
            let mut heads = Vec::with_capacity(self.sources.len());
            for source in &mut self.sources {
                heads.push(source.next_event()?);
            }
            self.heads = Some(heads);
        }

        let heads = self.heads.as_mut().expect("heads just filled");

        let next = heads
            .iter()
            .enumerate()
            .filter_map(|(i, head)| head.as_ref().map(|e| (i, e.ts)))
            .min_by_key(|&(i, ts)| (ts, i))
            .map(|(i, _)| i);

        let Some(index) = next else {
            return Ok(None);
        };

        let event = heads[index].take().expect("selected head is present");
        heads[index] = self.sources[index].next_event()?;
        Ok(Some(event))
    }
}

impl Default for TraceSet {
    fn default() -> Self {
        Self::new()
    }
}
