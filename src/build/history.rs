//! History-building playback listener.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::event::{Event, TraceSet};
use crate::playback::PlaybackListener;
use crate::provider::ProviderHost;
use crate::state::{SinkPaths, StateHistorySink};
use crate::types::Time;

/// Playback listener that owns the history sink and the provider hosts.
///
/// On start it opens a fresh sink at the trace set's begin timestamp and
/// initialises every provider; per event it advances the sink's clock and
/// dispatches to every host; on stop it finalises the providers and
/// closes the sink.
pub struct StateHistoryBuilder {
    paths: SinkPaths,
    hosts: Vec<ProviderHost>,
    sink: Option<StateHistorySink>,
    state_changes: u64,
    node_count: usize,
}

impl StateHistoryBuilder {
    /// Builds the listener; the sink is opened on playback start.
    #[must_use]
    pub fn new(paths: SinkPaths, hosts: Vec<ProviderHost>) -> Self {
        Self {
            paths,
            hosts,
            sink: None,
            state_changes: 0,
            node_count: 0,
        }
    }

    /// Returns the number of intervals emitted, final after playback.
    #[must_use]
    pub const fn state_changes(&self) -> u64 {
        self.state_changes
    }

    /// Returns the number of nodes created, final after playback.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.node_count
    }
}

impl PlaybackListener for StateHistoryBuilder {
    fn on_start(&mut self, trace_set: &TraceSet) -> Result<()> {
        let begin = trace_set.begin().unwrap_or(Time::ZERO);
        let mut sink = StateHistorySink::open(self.paths.clone(), begin)?;

        for host in &mut self.hosts {
            host.on_init(&mut sink.current_state(), trace_set);
        }

        self.sink = Some(sink);
        Ok(())
    }

    fn on_event(&mut self, event: &Event) -> Result<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| Error::builder("event before playback start"))?;

        sink.set_ts(event.ts)?;

        for host in &mut self.hosts {
            if !host.on_event(&mut sink.current_state(), event) {
                // continuation hint only; the stream keeps playing
                trace!(
                    provider = host.config().name(),
                    event = %event.name,
                    "provider callback requested stop"
                );
            }
        }

        Ok(())
    }

    fn on_stop(&mut self) -> Result<()> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };

        for host in &mut self.hosts {
            host.on_fini(&mut sink.current_state());
        }

        sink.close()?;
        self.state_changes = sink.state_changes();
        self.node_count = sink.all_node_count();

        debug!(
            state_changes = self.state_changes,
            nodes = self.node_count,
            "state history written"
        );
        Ok(())
    }
}
