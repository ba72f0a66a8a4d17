//! Current-state façade for state providers.

use crate::error::Result;
use crate::state::node::{NodeHandle, StateNode};
use crate::state::sink::StateHistorySink;
use crate::types::{NodeId, Quark, Time};

/// Narrow read-write view of a [`StateHistorySink`] handed to state
/// providers.
///
/// Providers can intern and look up quarks, navigate and mutate the state
/// tree, and read statistics, which triggers interval creation behind the
/// scenes. They can not open or close the history, nor advance its
/// timestamp. The façade is a non-owning borrow bounded by the sink's
/// lifetime; callbacks must not retain it past their return.
pub struct CurrentState<'s> {
    sink: &'s mut StateHistorySink,
}

impl<'s> CurrentState<'s> {
    pub(crate) fn new(sink: &'s mut StateHistorySink) -> Self {
        Self { sink }
    }

    /// Returns the quark for a subpath string, interning it if new.
    pub fn intern_subpath(&mut self, subpath: &str) -> Quark {
        self.sink.intern_subpath(subpath)
    }

    /// Returns the quark for a value string, interning it if new.
    pub fn intern_value_string(&mut self, value: &str) -> Quark {
        self.sink.intern_value_string(value)
    }

    /// Returns the subpath string for a quark.
    ///
    /// # Errors
    ///
    /// Returns a `WrongQuark` error for an unknown quark.
    pub fn lookup_subpath(&self, quark: Quark) -> Result<&str> {
        self.sink.lookup_subpath(quark)
    }

    /// Returns the value string for a quark.
    ///
    /// # Errors
    ///
    /// Returns a `WrongQuark` error for an unknown quark.
    pub fn lookup_value_string(&self, quark: Quark) -> Result<&str> {
        self.sink.lookup_value_string(quark)
    }

    /// Returns a mutable cursor over the root node.
    #[must_use]
    pub fn root_mut(&mut self) -> NodeHandle<'_> {
        self.sink.root_mut()
    }

    /// Returns a shared reference to a node, or `None` for an unknown id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&StateNode> {
        self.sink.node(id)
    }

    /// Returns the current history timestamp.
    #[must_use]
    pub fn ts(&self) -> Time {
        self.sink.ts()
    }

    /// Returns the number of intervals emitted so far.
    #[must_use]
    pub fn state_changes(&self) -> u64 {
        self.sink.state_changes()
    }

    /// Returns the number of live (non-`Null`) nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.sink.node_count()
    }

    /// Returns the total number of nodes ever created.
    #[must_use]
    pub fn all_node_count(&self) -> usize {
        self.sink.all_node_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SinkPaths, Value};
    use tempfile::tempdir;

    #[test]
    fn facade_mutations_reach_the_sink() {
        let dir = tempdir().unwrap();
        let mut sink = StateHistorySink::open(SinkPaths::in_dir(dir.path()), Time::ZERO).unwrap();

        {
            let mut state = sink.current_state();
            let q = state.intern_subpath("cpus");
            state.root_mut().child(q).child_int(0).set(Value::U32(1)).unwrap();
            assert_eq!(state.lookup_subpath(q).unwrap(), "cpus");
            assert_eq!(state.state_changes(), 0);
            assert_eq!(state.node_count(), 1);
            assert_eq!(state.all_node_count(), 3);
        }

        assert_eq!(sink.node_count(), 1);
        sink.close().unwrap();
    }
}
