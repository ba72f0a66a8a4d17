//! Core identifier and time types.
//!
//! These are small copy types used throughout the engine: interned string
//! identifiers ([`Quark`]), dense node identifiers ([`NodeId`]), trace and
//! event identifiers ([`TraceId`], [`EventId`]) and the nanosecond
//! timestamp type ([`Time`]).

pub mod id;
pub mod quark;
pub mod time;

pub use id::{EventId, NodeId, TraceId};
pub use quark::Quark;
pub use time::Time;
