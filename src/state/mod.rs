//! State tree, interning and the history sink.
//!
//! This is the construction core: the [`StateHistorySink`] owns the node
//! tree, both quark registries and the interval writer; state providers
//! mutate it through the [`CurrentState`] façade, and every mutation closes
//! the previous value of a node into an interval.

pub mod current;
pub mod node;
pub mod quarkdb;
pub mod registry;
pub mod sink;
pub mod value;

pub use current::CurrentState;
pub use node::{NodeHandle, ReadVisitor, StateNode, UpdateVisitor};
pub use registry::QuarkRegistry;
pub use sink::{SinkPaths, StateHistorySink};
pub use value::{Value, ValueTag, VALUE_TAG_COUNT};
