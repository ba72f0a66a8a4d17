//! String interning registry.

use std::collections::HashMap;
use std::io::Write;

use crate::error::{Error, Result};
use crate::state::quarkdb;
use crate::types::Quark;

/// A bidirectional string to quark registry for one quark space.
///
/// Allocation is monotonic: a new string gets the next free id, an
/// already-present string returns its existing id. The mapping is stable
/// for the lifetime of the owning sink, and the dense id range `[0, N)`
/// makes the reverse direction a plain vector lookup.
#[derive(Debug, Default)]
pub struct QuarkRegistry {
    strings: Vec<String>,
    quarks: HashMap<String, Quark>,
}

impl QuarkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the quark for `s`, interning it first if unknown.
    pub fn intern(&mut self, s: &str) -> Quark {
        if let Some(&quark) = self.quarks.get(s) {
            return quark;
        }

        let quark = Quark::from_raw(self.strings.len() as u32);
        self.strings.push(s.to_owned());
        self.quarks.insert(s.to_owned(), quark);
        quark
    }

    /// Returns the string previously interned for `quark`.
    ///
    /// # Errors
    ///
    /// Returns a `WrongQuark` error if `quark` was never allocated by this
    /// registry.
    pub fn lookup(&self, quark: Quark) -> Result<&str> {
        self.strings
            .get(quark.as_raw() as usize)
            .map(String::as_str)
            .ok_or_else(|| Error::wrong_quark(quark))
    }

    /// Returns the number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterates over `(string, quark)` pairs in interning order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Quark)> + '_ {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), Quark::from_raw(i as u32)))
    }

    /// Writes every `(string, quark)` pair to `writer` in interning order,
    /// using the quark database record format.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn persist<W: Write>(&self, writer: &mut W) -> std::result::Result<(), quarkdb::QuarkDbError> {
        quarkdb::write_records(writer, self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn intern_is_idempotent() {
        let mut reg = QuarkRegistry::new();
        let a = reg.intern("alpha");
        let b = reg.intern("beta");
        assert_ne!(a, b);
        assert_eq!(reg.intern("alpha"), a);
        assert_eq!(reg.intern("beta"), b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn quarks_are_dense_from_zero() {
        let mut reg = QuarkRegistry::new();
        assert_eq!(reg.intern("").as_raw(), 0);
        assert_eq!(reg.intern("x").as_raw(), 1);
        assert_eq!(reg.intern("y").as_raw(), 2);
    }

    #[test]
    fn lookup_round_trips() {
        let mut reg = QuarkRegistry::new();
        let q = reg.intern("sched/current");
        assert_eq!(reg.lookup(q).unwrap(), "sched/current");
    }

    #[test]
    fn lookup_unknown_is_wrong_quark() {
        let reg = QuarkRegistry::new();
        let err = reg.lookup(Quark::from_raw(7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongQuark(7));
    }

    #[test]
    fn iter_preserves_interning_order() {
        let mut reg = QuarkRegistry::new();
        reg.intern("b");
        reg.intern("a");
        reg.intern("c");

        let order: Vec<&str> = reg.iter().map(|(s, _)| s).collect();
        assert_eq!(order, ["b", "a", "c"]);
    }
}
