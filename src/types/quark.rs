//! Quarks: interned string identifiers.

use core::fmt;

/// An opaque 32-bit identifier interned from a string.
///
/// A quark compresses an arbitrary string key to a fixed-width word so that
/// hot-loop comparisons and child lookups become integer operations. The
/// engine maintains two independent quark spaces (subpaths and value
/// strings); a quark is only meaningful within the space that allocated it.
///
/// Quarks within one space form a bijection with a dense integer range
/// `[0, N)`: interning the same string always returns the same quark, and
/// every allocated quark maps back to exactly one string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quark(u32);

impl Quark {
    /// Sentinel quark passed to visitors when entering the root node,
    /// which has no subpath of its own.
    pub const ROOT_SENTINEL: Self = Self(u32::MAX);

    /// Creates a quark from its raw integer value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Quark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quark({})", self.0)
    }
}

impl fmt::Display for Quark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
