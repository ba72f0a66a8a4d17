//! State tree nodes.
//!
//! Nodes live in an arena owned by the history sink; a [`NodeId`] is both
//! the node's identity in the emitted history and its arena index. The
//! mutation surface is [`NodeHandle`], a thin cursor borrowing the sink,
//! so that a path assignment reads as a chain:
//!
//! ```ignore
//! state.root_mut().child_str("threads").child_uint(tid).set(Value::U32(1))?;
//! ```
//!
//! Child edges are labelled by subpath quarks. A quark labels at most one
//! edge out of a given parent, but distinct parents may reuse the same
//! quark. "Removed" children stay in the map with a `Null` value; the
//! `has_child`/`live_children` accessors treat them as absent.

use std::collections::HashMap;

use crate::error::Result;
use crate::event::FieldValue;
use crate::state::sink::StateHistorySink;
use crate::state::Value;
use crate::types::{NodeId, Quark, Time};

/// One node of the state tree.
///
/// Holds the node's current value and the timestamp at which that value
/// took effect. A node is created with a `Null` value and is never
/// destroyed before sink shutdown.
#[derive(Debug)]
pub struct StateNode {
    pub(crate) id: NodeId,
    pub(crate) begin_ts: Time,
    pub(crate) value: Value,
    pub(crate) children: HashMap<Quark, NodeId>,
}

impl StateNode {
    pub(crate) fn new(id: NodeId, begin_ts: Time) -> Self {
        Self {
            id,
            begin_ts,
            value: Value::Null,
            children: HashMap::new(),
        }
    }

    /// Returns this node's id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the timestamp at which the current value took effect.
    #[must_use]
    pub const fn begin_ts(&self) -> Time {
        self.begin_ts
    }

    /// Returns the current value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Returns true if the node currently holds no value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Returns the id of the child at `quark`, if that edge exists at all
    /// (`Null` children included).
    #[must_use]
    pub fn child_id(&self, quark: Quark) -> Option<NodeId> {
        self.children.get(&quark).copied()
    }

    /// Iterates over all child edges in unspecified order.
    ///
    /// Any mutation of this node's children invalidates the iterator; use
    /// the sink-level walks for mutation during traversal.
    pub fn child_edges(&self) -> impl Iterator<Item = (Quark, NodeId)> + '_ {
        self.children.iter().map(|(&q, &id)| (q, id))
    }

    /// Returns how many children this node has, `Null` children included.
    #[must_use]
    pub fn all_child_count(&self) -> usize {
        self.children.len()
    }
}

/// Read-only visitor over the state tree.
///
/// The walk is preorder with children visited in ascending quark order;
/// the root is passed with [`Quark::ROOT_SENTINEL`] since it has no
/// subpath of its own.
pub trait ReadVisitor {
    /// Called when entering `node`, before its children.
    fn enter(&mut self, quark: Quark, node: &StateNode);

    /// Called when leaving `node`, after its children.
    fn leave(&mut self, quark: Quark, node: &StateNode) {
        let _ = (quark, node);
    }
}

/// Mutating visitor over the state tree.
///
/// Same order contract as [`ReadVisitor`]. Each hook receives a fresh
/// [`NodeHandle`]; the set of children walked under a node is snapshotted
/// before its `enter` hook runs, so children added during the visit are
/// not themselves visited.
pub trait UpdateVisitor {
    /// Called when entering `node`, before its children.
    ///
    /// # Errors
    ///
    /// An error aborts the walk.
    fn enter(&mut self, quark: Quark, node: NodeHandle<'_>) -> Result<()>;

    /// Called when leaving `node`, after its children.
    ///
    /// # Errors
    ///
    /// An error aborts the walk.
    fn leave(&mut self, quark: Quark, node: NodeHandle<'_>) -> Result<()> {
        let _ = (quark, node);
        Ok(())
    }
}

/// A mutable cursor over one node of the state tree.
///
/// The handle borrows the sink, so at most one handle is live at a time;
/// navigation consumes the handle and returns a new one for the target
/// node, which keeps path chains cheap and borrow-friendly.
pub struct NodeHandle<'s> {
    sink: &'s mut StateHistorySink,
    id: NodeId,
}

impl<'s> NodeHandle<'s> {
    pub(crate) fn new(sink: &'s mut StateHistorySink, id: NodeId) -> Self {
        Self { sink, id }
    }

    /// Returns the id of the node under the cursor.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the node's current value.
    #[must_use]
    pub fn value(&self) -> Value {
        *self.sink.node_ref(self.id).value()
    }

    /// Returns the timestamp at which the current value took effect.
    #[must_use]
    pub fn begin_ts(&self) -> Time {
        self.sink.node_ref(self.id).begin_ts()
    }

    /// Returns true if the node currently holds no value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.sink.node_ref(self.id).is_null()
    }

    // === navigation ===

    /// Returns the child at `quark`, creating it if absent.
    #[must_use]
    pub fn child(self, quark: Quark) -> NodeHandle<'s> {
        let id = self.sink.ensure_child(self.id, quark);
        NodeHandle { sink: self.sink, id }
    }

    /// Interns `key` as a subpath and returns that child, creating it if
    /// absent.
    #[must_use]
    pub fn child_str(self, key: &str) -> NodeHandle<'s> {
        let quark = self.sink.intern_subpath(key);
        self.child(quark)
    }

    /// Returns the child keyed by the canonical decimal form of `key`.
    ///
    /// Integer keys and their decimal strings address the same node:
    /// `child_int(42)` and `child_str("42")` are interchangeable.
    #[must_use]
    pub fn child_int(self, key: i64) -> NodeHandle<'s> {
        self.child_str(&key.to_string())
    }

    /// Unsigned variant of [`Self::child_int`].
    #[must_use]
    pub fn child_uint(self, key: u64) -> NodeHandle<'s> {
        self.child_str(&key.to_string())
    }

    /// Returns the child keyed by an event field value.
    ///
    /// Integer fields go through the canonical decimal form, string fields
    /// are used as-is, and any other field kind falls back to the empty
    /// key.
    #[must_use]
    pub fn child_field(self, field: &FieldValue) -> NodeHandle<'s> {
        match field {
            FieldValue::Sint(v) => self.child_int(*v),
            FieldValue::Uint(v) => self.child_uint(*v),
            FieldValue::Str(s) => {
                let quark = self.sink.intern_subpath(s);
                self.child(quark)
            }
            _ => self.child_str(""),
        }
    }

    /// Returns the child at `quark` without creating it. `Null` children
    /// are still returned; only a missing edge yields `None`.
    #[must_use]
    pub fn get_child(self, quark: Quark) -> Option<NodeHandle<'s>> {
        let id = self.sink.node_ref(self.id).child_id(quark)?;
        Some(NodeHandle { sink: self.sink, id })
    }

    // === child queries ===

    /// Returns true if a live (non-`Null`) child exists at `quark`.
    #[must_use]
    pub fn has_child(&self, quark: Quark) -> bool {
        self.sink
            .node_ref(self.id)
            .child_id(quark)
            .is_some_and(|id| !self.sink.node_ref(id).is_null())
    }

    /// Interning variant of [`Self::has_child`].
    #[must_use]
    pub fn has_child_str(&mut self, key: &str) -> bool {
        let quark = self.sink.intern_subpath(key);
        self.has_child(quark)
    }

    /// Decimal-canonical variant of [`Self::has_child`].
    #[must_use]
    pub fn has_child_int(&mut self, key: i64) -> bool {
        self.has_child_str(&key.to_string())
    }

    /// Iterates over all child edges, `Null` children included, in
    /// unspecified order.
    pub fn children(&self) -> impl Iterator<Item = (Quark, NodeId)> + '_ {
        self.sink.node_ref(self.id).child_edges()
    }

    /// Iterates over live child edges, skipping children whose current
    /// value is `Null`.
    pub fn live_children(&self) -> impl Iterator<Item = (Quark, NodeId)> + '_ {
        self.sink
            .node_ref(self.id)
            .child_edges()
            .filter(|&(_, id)| !self.sink.node_ref(id).is_null())
    }

    /// Returns how many live children this node has.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.live_children().count()
    }

    /// Returns how many children this node has, `Null` children included.
    #[must_use]
    pub fn all_child_count(&self) -> usize {
        self.sink.node_ref(self.id).all_child_count()
    }

    // === assignment ===

    /// Assigns a new value to the node.
    ///
    /// Closes the previous value into an interval `(begin_ts, now)` first
    /// (suppressed if the previous value was `Null`), then stamps the
    /// node with the sink's current timestamp and installs `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval cannot be written.
    pub fn set(&mut self, value: Value) -> Result<()> {
        self.sink.assign(self.id, value)
    }

    /// Interns `value` in the value-string space and assigns the
    /// resulting quark value.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval cannot be written.
    pub fn set_str(&mut self, value: &str) -> Result<()> {
        let quark = self.sink.intern_value_string(value);
        self.set(Value::Quark(quark))
    }

    /// Copies the current value of `other` onto this node.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval cannot be written.
    pub fn set_from(&mut self, other: NodeId) -> Result<()> {
        let value = *self.sink.node_ref(other).value();
        self.set(value)
    }

    /// Assigns an event field value: integers widen to their 64-bit state
    /// variant, floats truncate to `f32`, strings go through the
    /// value-string space, and any other field kind is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval cannot be written.
    pub fn set_field(&mut self, field: &FieldValue) -> Result<()> {
        match field {
            FieldValue::Sint(v) => self.set(Value::I64(*v)),
            FieldValue::Uint(v) => self.set(Value::U64(*v)),
            FieldValue::Float(v) => self.set(Value::F32(*v as f32)),
            FieldValue::Str(s) => {
                let quark = self.sink.intern_value_string(s);
                self.set(Value::Quark(quark))
            }
            _ => Ok(()),
        }
    }

    /// Nullifies the node's value.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval cannot be written.
    pub fn set_null(&mut self) -> Result<()> {
        self.set(Value::Null)
    }

    /// Nullifies the node and every descendant, preorder. Descendants
    /// that already hold `Null` emit no interval.
    ///
    /// # Errors
    ///
    /// Returns an error if any interval cannot be written.
    pub fn set_null_recursive(&mut self) -> Result<()> {
        let mut stack = vec![self.id];

        while let Some(id) = stack.pop() {
            self.sink.assign(id, Value::Null)?;

            let mut edges = self.sink.children_sorted(id);
            edges.reverse();
            stack.extend(edges.into_iter().map(|(_, child)| child));
        }

        Ok(())
    }

    /// Adds `delta` to an integer value, in widening 64-bit arithmetic
    /// truncated back to the variant's width. No-op on non-integer and
    /// `Null` values.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval cannot be written.
    pub fn add(&mut self, delta: i64) -> Result<()> {
        match self.sink.node_ref(self.id).value().apply_delta(delta) {
            Some(value) => self.set(value),
            None => Ok(()),
        }
    }

    /// Subtracts `delta` from an integer value. No-op on non-integer and
    /// `Null` values.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval cannot be written.
    pub fn sub(&mut self, delta: i64) -> Result<()> {
        self.add(delta.wrapping_neg())
    }
}
