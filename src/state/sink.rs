//! The state history sink.
//!
//! The sink owns everything the construction engine mutates: the two quark
//! registries, the node arena, the interval writer and the current
//! timestamp. All state mutations flow through it, and it is the single
//! writer of the four output files:
//!
//! - the subpath quark database
//! - the value-string quark database
//! - the node-id to path map (JSON)
//! - the interval history file

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::interval::{Interval, IntervalFileSink, IntervalSink};
use crate::state::node::{NodeHandle, ReadVisitor, StateNode, UpdateVisitor};
use crate::state::registry::QuarkRegistry;
use crate::state::{CurrentState, Value, VALUE_TAG_COUNT};
use crate::types::{NodeId, Quark, Time};

/// File name of the subpath quark database inside a state directory.
pub const SUBPATH_DB_FILE: &str = "state-paths-quarks.db";

/// File name of the value-string quark database inside a state directory.
pub const VALUE_DB_FILE: &str = "state-values-quarks.db";

/// File name of the node-id to path map inside a state directory.
pub const NODE_MAP_FILE: &str = "state-nodes.json";

/// File name of the interval history inside a state directory.
pub const HISTORY_FILE: &str = "state-history.shd";

/// Output file locations for one state history.
#[derive(Debug, Clone)]
pub struct SinkPaths {
    /// Subpath quark database path.
    pub subpath_db: PathBuf,
    /// Value-string quark database path.
    pub value_db: PathBuf,
    /// Node-id to path map path.
    pub node_map: PathBuf,
    /// Interval history file path.
    pub history: PathBuf,
}

impl SinkPaths {
    /// Returns the standard layout inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            subpath_db: dir.join(SUBPATH_DB_FILE),
            value_db: dir.join(VALUE_DB_FILE),
            node_map: dir.join(NODE_MAP_FILE),
            history: dir.join(HISTORY_FILE),
        }
    }
}

/// A per-value-variant interval builder.
///
/// The sink dispatches through a fixed table indexed by the value tag, so
/// the hot path never branches on a trait object. A slot may yield `None`,
/// in which case no interval is emitted.
type Translator = fn(&StateNode, Time) -> Option<Interval>;

fn interval_for(node: &StateNode, end: Time, value: Value) -> Option<Interval> {
    Some(Interval {
        begin: node.begin_ts(),
        end,
        node_id: node.id(),
        value,
    })
}

fn translate_i32(node: &StateNode, end: Time) -> Option<Interval> {
    let v = node.value().as_i32()?;
    interval_for(node, end, Value::I32(v))
}

fn translate_u32(node: &StateNode, end: Time) -> Option<Interval> {
    let v = node.value().as_u32()?;
    interval_for(node, end, Value::U32(v))
}

fn translate_i64(node: &StateNode, end: Time) -> Option<Interval> {
    let v = node.value().as_i64()?;
    interval_for(node, end, Value::I64(v))
}

fn translate_u64(node: &StateNode, end: Time) -> Option<Interval> {
    let v = node.value().as_u64()?;
    interval_for(node, end, Value::U64(v))
}

fn translate_f32(node: &StateNode, end: Time) -> Option<Interval> {
    let v = node.value().as_f32()?;
    interval_for(node, end, Value::F32(v))
}

fn translate_quark(node: &StateNode, end: Time) -> Option<Interval> {
    let q = node.value().as_quark()?;
    interval_for(node, end, Value::Quark(q))
}

fn translate_none(_node: &StateNode, _end: Time) -> Option<Interval> {
    None
}

/// Translator table, indexed by [`ValueTag`](crate::state::ValueTag).
const TRANSLATORS: [Translator; VALUE_TAG_COUNT] = [
    translate_i32,
    translate_u32,
    translate_i64,
    translate_u64,
    translate_f32,
    translate_quark,
    translate_none,
];

/// The state history sink.
///
/// Opens its output files on construction and writes them out on
/// [`close`](Self::close). The current timestamp only moves forward;
/// every assignment made through the node handles closes the previous
/// value into an interval ending at the current timestamp.
///
/// **Close-flush policy**: nodes still holding a non-`Null` value when the
/// sink is closed are flushed as intervals with `end_ts` equal to the
/// current timestamp, so the history covers every observed value period.
pub struct StateHistorySink {
    paths: SinkPaths,
    ts: Time,
    open: bool,
    subpaths: QuarkRegistry,
    value_strings: QuarkRegistry,
    nodes: Vec<StateNode>,
    interval_sink: Box<dyn IntervalSink>,
    state_changes: u64,
}

impl StateHistorySink {
    /// Opens a sink writing the standard file-backed history.
    ///
    /// # Errors
    ///
    /// Returns an error if the history file cannot be created.
    pub fn open(paths: SinkPaths, begin_ts: Time) -> Result<Self> {
        let interval_sink = IntervalFileSink::create(&paths.history)?;
        Ok(Self::with_interval_sink(paths, begin_ts, Box::new(interval_sink)))
    }

    /// Opens a sink emitting intervals into the provided sink
    /// implementation instead of the standard history file. The quark
    /// databases and node map still go to `paths`.
    #[must_use]
    pub fn with_interval_sink(
        paths: SinkPaths,
        begin_ts: Time,
        interval_sink: Box<dyn IntervalSink>,
    ) -> Self {
        debug!(history = %paths.history.display(), %begin_ts, "opening state history sink");

        Self {
            paths,
            ts: begin_ts,
            open: true,
            subpaths: QuarkRegistry::new(),
            value_strings: QuarkRegistry::new(),
            nodes: vec![StateNode::new(NodeId::ROOT, begin_ts)],
            interval_sink,
            state_changes: 0,
        }
    }

    /// Returns the current history timestamp.
    #[must_use]
    pub const fn ts(&self) -> Time {
        self.ts
    }

    /// Returns true if the sink has not been closed yet.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Advances the current history timestamp.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidArgument` error if `ts` is before the current
    /// timestamp; the sink state is left untouched in that case.
    pub fn set_ts(&mut self, ts: Time) -> Result<()> {
        if ts < self.ts {
            return Err(Error::invalid_argument(format!(
                "timestamp {ts} is before the current timestamp {}",
                self.ts
            )));
        }

        self.ts = ts;
        Ok(())
    }

    /// Returns the number of intervals emitted so far.
    #[must_use]
    pub const fn state_changes(&self) -> u64 {
        self.state_changes
    }

    /// Returns the number of live nodes, i.e. nodes currently holding a
    /// non-`Null` value.
    #[must_use]
    pub fn node_count(&self) -> usize {
        struct Counter(usize);

        impl ReadVisitor for Counter {
            fn enter(&mut self, _quark: Quark, node: &StateNode) {
                if !node.is_null() {
                    self.0 += 1;
                }
            }
        }

        let mut counter = Counter(0);
        self.visit_read(&mut counter);
        counter.0
    }

    /// Returns the total number of nodes ever created, root included.
    #[must_use]
    pub fn all_node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns a mutable cursor over the root node.
    #[must_use]
    pub fn root_mut(&mut self) -> NodeHandle<'_> {
        NodeHandle::new(self, NodeId::ROOT)
    }

    /// Returns a shared reference to a node, or `None` for an id this
    /// sink never allocated.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&StateNode> {
        self.nodes.get(id.as_index())
    }

    /// Returns the façade handed to state providers.
    #[must_use]
    pub fn current_state(&mut self) -> CurrentState<'_> {
        CurrentState::new(self)
    }

    /// Returns the quark for a subpath string, interning it if new.
    pub fn intern_subpath(&mut self, subpath: &str) -> Quark {
        self.subpaths.intern(subpath)
    }

    /// Returns the quark for a value string, interning it if new.
    pub fn intern_value_string(&mut self, value: &str) -> Quark {
        self.value_strings.intern(value)
    }

    /// Returns the subpath string for a quark.
    ///
    /// # Errors
    ///
    /// Returns a `WrongQuark` error for an unknown quark.
    pub fn lookup_subpath(&self, quark: Quark) -> Result<&str> {
        self.subpaths.lookup(quark)
    }

    /// Returns the value string for a quark.
    ///
    /// # Errors
    ///
    /// Returns a `WrongQuark` error for an unknown quark.
    pub fn lookup_value_string(&self, quark: Quark) -> Result<&str> {
        self.value_strings.lookup(quark)
    }

    /// Walks the tree read-only, preorder, children in ascending quark
    /// order.
    pub fn visit_read<V: ReadVisitor>(&self, visitor: &mut V) {
        self.visit_read_node(NodeId::ROOT, Quark::ROOT_SENTINEL, visitor);
    }

    fn visit_read_node<V: ReadVisitor>(&self, id: NodeId, quark: Quark, visitor: &mut V) {
        let node = &self.nodes[id.as_index()];
        visitor.enter(quark, node);

        for (child_quark, child_id) in self.children_sorted(id) {
            self.visit_read_node(child_id, child_quark, visitor);
        }

        visitor.leave(quark, &self.nodes[id.as_index()]);
    }

    /// Walks the tree with a mutating visitor, preorder, children in
    /// ascending quark order. The children of each node are snapshotted
    /// before its `enter` hook runs.
    ///
    /// # Errors
    ///
    /// Propagates the first hook error, aborting the walk.
    pub fn visit_update<V: UpdateVisitor>(&mut self, visitor: &mut V) -> Result<()> {
        self.visit_update_node(NodeId::ROOT, Quark::ROOT_SENTINEL, visitor)
    }

    fn visit_update_node<V: UpdateVisitor>(
        &mut self,
        id: NodeId,
        quark: Quark,
        visitor: &mut V,
    ) -> Result<()> {
        let edges = self.children_sorted(id);

        visitor.enter(quark, NodeHandle::new(self, id))?;

        for (child_quark, child_id) in edges {
            self.visit_update_node(child_id, child_quark, visitor)?;
        }

        visitor.leave(quark, NodeHandle::new(self, id))
    }

    /// Closes the sink: flushes pending non-`Null` values as intervals
    /// ending at the current timestamp, finalises the interval file,
    /// writes both quark databases and the node map, and marks the sink
    /// closed. Closing an already-closed sink is a no-op.
    ///
    /// # Errors
    ///
    /// Any I/O failure while finalising the output files is fatal and
    /// reported here.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }

        debug!(
            nodes = self.nodes.len(),
            state_changes = self.state_changes,
            "closing state history sink"
        );

        for index in 0..self.nodes.len() {
            self.write_interval(NodeId::from_raw(index as u64))?;
        }

        self.interval_sink.close()?;
        self.persist_registry(true)?;
        self.persist_registry(false)?;
        self.write_node_map()?;

        self.open = false;
        Ok(())
    }

    // === arena primitives used by NodeHandle ===

    pub(crate) fn node_ref(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn ensure_child(&mut self, parent: NodeId, quark: Quark) -> NodeId {
        if let Some(child) = self.nodes[parent.as_index()].child_id(quark) {
            return child;
        }

        let child = NodeId::from_raw(self.nodes.len() as u64);
        self.nodes.push(StateNode::new(child, self.ts));
        self.nodes[parent.as_index()].children.insert(quark, child);
        child
    }

    pub(crate) fn assign(&mut self, id: NodeId, value: Value) -> Result<()> {
        self.write_interval(id)?;

        let ts = self.ts;
        let node = &mut self.nodes[id.as_index()];
        node.begin_ts = ts;
        node.value = value;
        Ok(())
    }

    pub(crate) fn children_sorted(&self, id: NodeId) -> Vec<(Quark, NodeId)> {
        let mut edges: Vec<(Quark, NodeId)> = self.nodes[id.as_index()].child_edges().collect();
        edges.sort_unstable_by_key(|&(quark, _)| quark);
        edges
    }

    /// Closes the node's current value into an interval, if it has one.
    fn write_interval(&mut self, id: NodeId) -> Result<()> {
        let node = &self.nodes[id.as_index()];
        let translator = TRANSLATORS[node.value().tag() as usize];

        if let Some(interval) = translator(node, self.ts) {
            self.interval_sink.append(&interval)?;
            self.state_changes += 1;
        }

        Ok(())
    }

    fn persist_registry(&self, subpaths: bool) -> Result<()> {
        let (registry, path) = if subpaths {
            (&self.subpaths, &self.paths.subpath_db)
        } else {
            (&self.value_strings, &self.paths.value_db)
        };

        let mut writer = BufWriter::new(File::create(path)?);
        registry.persist(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn write_node_map(&self) -> Result<()> {
        let map = self.node_map_json(NodeId::ROOT)?;
        let mut writer = BufWriter::new(File::create(&self.paths.node_map)?);
        serde_json::to_writer(&mut writer, &map)
            .map_err(|e| Error::builder("cannot serialise node map").with_source(e))?;
        writer.flush()?;
        Ok(())
    }

    fn node_map_json(&self, id: NodeId) -> Result<serde_json::Value> {
        let node = &self.nodes[id.as_index()];

        let mut object = serde_json::Map::new();
        object.insert("id".to_owned(), node.id().as_raw().into());

        if node.all_child_count() > 0 {
            let mut children = serde_json::Map::new();

            for (quark, child_id) in self.children_sorted(id) {
                let subpath = self.subpaths.lookup(quark)?;
                children.insert(subpath.to_owned(), self.node_map_json(child_id)?);
            }

            object.insert("children".to_owned(), children.into());
        }

        Ok(object.into())
    }
}

impl Drop for StateHistorySink {
    /// Closes the sink if it was not closed explicitly. Errors cannot be
    /// reported from here; call [`close`](Self::close) to observe them.
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.close() {
                tracing::error!(%err, "state history sink close failed in drop");
            }
        }
    }
}
