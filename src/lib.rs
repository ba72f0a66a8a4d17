//! Statehist: a state-history construction engine for trace analysis.
//!
//! # Overview
//!
//! Statehist ingests chronologically-ordered kernel and user-space trace
//! events and materialises a persistent record of how a logical state tree
//! evolved over the trace: which thread ran on which CPU, which system
//! call a thread was in, anything a state provider chooses to model.
//! Downstream tools can then answer "what was the state of path P at time
//! T?" without replaying events.
//!
//! # How it fits together
//!
//! - Playback ([`playback`]) drives the merged chronological event stream
//!   of a trace set and ticks its listeners.
//! - The history builder ([`build`]) is the main listener: it advances the
//!   sink's clock and hands each event to the provider hosts.
//! - Providers ([`provider`]) register callbacks by (trace type, event
//!   name) pattern at init time; dispatch at event time is two integer
//!   hash lookups.
//! - Callbacks mutate the state tree through the current-state façade
//!   ([`state::CurrentState`]); every assignment closes the previous value
//!   of a node into an interval written to the history file
//!   ([`interval`]).
//! - Path segments and string values are interned into quarks
//!   ([`state::QuarkRegistry`]); both quark databases and a node-id to
//!   path map are written when the sink closes.
//!
//! # Example
//!
//! ```no_run
//! use statehist::build::{BuildArgs, Builder};
//! use statehist::event::JsonTraceOpener;
//! use statehist::provider::HostFactories;
//!
//! fn main() -> statehist::Result<()> {
//!     let builder = Builder::new(BuildArgs {
//!         traces: vec!["kernel-trace.jsonl".into()],
//!         providers: vec!["builtin:linux".into()],
//!         ..BuildArgs::default()
//!     })?;
//!
//!     let summary = builder.run(&JsonTraceOpener, &HostFactories::with_defaults())?;
//!     println!("{} events replayed", summary.events);
//!     Ok(())
//! }
//! ```
//!
//! # Module Structure
//!
//! - [`types`]: quarks, node/trace/event ids, timestamps
//! - [`state`]: value sum type, interning, state tree, history sink
//! - [`interval`]: interval records and the history file sink
//! - [`event`]: decoded events, trace set schema, JSONL reference reader
//! - [`provider`]: provider contract, hosts, callback dispatch
//! - [`playback`]: orchestration, stop handling, progress publishing
//! - [`build`]: argument validation and the end-to-end build
//! - [`error`]: error kinds and the crate result alias
//! - [`cli`]: exit codes and logging setup for the binary

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod build;
pub mod cli;
pub mod error;
pub mod event;
pub mod interval;
pub mod playback;
pub mod provider;
pub mod state;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use event::{Event, FieldValue, TraceSet};
pub use interval::{Interval, IntervalSink};
pub use state::{CurrentState, SinkPaths, StateHistorySink, Value};
pub use types::{EventId, NodeId, Quark, Time, TraceId};
