//! Typed state values.
//!
//! All value kinds live in a single tagged union that is copied by value,
//! so a state assignment never allocates. A [`Value::Null`] denotes "no
//! current value" and suppresses interval emission when it is replaced.

use core::fmt;

use crate::types::Quark;

/// Number of distinct value tags, sized for the translator table.
pub const VALUE_TAG_COUNT: usize = 7;

/// Dense discriminant of a [`Value`] variant.
///
/// Used to index the sink's translator table so that interval construction
/// never goes through dynamic dispatch on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueTag {
    /// 32-bit signed integer.
    I32 = 0,
    /// 32-bit unsigned integer.
    U32 = 1,
    /// 64-bit signed integer.
    I64 = 2,
    /// 64-bit unsigned integer.
    U64 = 3,
    /// Single-precision floating point number.
    F32 = 4,
    /// Interned value string.
    Quark = 5,
    /// No current value.
    Null = 6,
}

impl ValueTag {
    /// Creates a tag from its raw discriminant, if valid.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::I32),
            1 => Some(Self::U32),
            2 => Some(Self::I64),
            3 => Some(Self::U64),
            4 => Some(Self::F32),
            5 => Some(Self::Quark),
            6 => Some(Self::Null),
            _ => None,
        }
    }
}

/// A typed state value.
///
/// Equality is variant plus payload equality; `Null` compares equal only to
/// `Null`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 32-bit signed integer.
    I32(i32),
    /// 32-bit unsigned integer.
    U32(u32),
    /// 64-bit signed integer.
    I64(i64),
    /// 64-bit unsigned integer.
    U64(u64),
    /// Single-precision floating point number.
    F32(f32),
    /// Interned value string (value-string quark space, not subpaths).
    Quark(Quark),
    /// No current value.
    Null,
}

impl Value {
    /// Returns the dense discriminant of this value.
    #[must_use]
    pub const fn tag(&self) -> ValueTag {
        match self {
            Self::I32(_) => ValueTag::I32,
            Self::U32(_) => ValueTag::U32,
            Self::I64(_) => ValueTag::I64,
            Self::U64(_) => ValueTag::U64,
            Self::F32(_) => ValueTag::F32,
            Self::Quark(_) => ValueTag::Quark,
            Self::Null => ValueTag::Null,
        }
    }

    /// Returns true if this is a 32-bit signed integer.
    #[must_use]
    pub const fn is_i32(&self) -> bool {
        matches!(self, Self::I32(_))
    }

    /// Returns true if this is a 32-bit unsigned integer.
    #[must_use]
    pub const fn is_u32(&self) -> bool {
        matches!(self, Self::U32(_))
    }

    /// Returns true if this is a 64-bit signed integer.
    #[must_use]
    pub const fn is_i64(&self) -> bool {
        matches!(self, Self::I64(_))
    }

    /// Returns true if this is a 64-bit unsigned integer.
    #[must_use]
    pub const fn is_u64(&self) -> bool {
        matches!(self, Self::U64(_))
    }

    /// Returns true if this is a floating point number.
    #[must_use]
    pub const fn is_f32(&self) -> bool {
        matches!(self, Self::F32(_))
    }

    /// Returns true if this is an interned value string.
    #[must_use]
    pub const fn is_quark(&self) -> bool {
        matches!(self, Self::Quark(_))
    }

    /// Returns true if this value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if this is any of the four integer variants.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I32(_) | Self::U32(_) | Self::I64(_) | Self::U64(_)
        )
    }

    /// Returns the payload as `i32`, or `None` if the variant differs.
    #[must_use]
    pub const fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload as `u32`, or `None` if the variant differs.
    #[must_use]
    pub const fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload as `i64`, or `None` if the variant differs.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload as `u64`, or `None` if the variant differs.
    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload as `f32`, or `None` if the variant differs.
    #[must_use]
    pub const fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload quark, or `None` if the variant differs.
    #[must_use]
    pub const fn as_quark(&self) -> Option<Quark> {
        match self {
            Self::Quark(q) => Some(*q),
            _ => None,
        }
    }

    /// Applies a signed delta to an integer value.
    ///
    /// The delta is applied in signed 64-bit arithmetic and the result is
    /// truncated back to the variant's width, wrapping on overflow. Returns
    /// `None` for non-integer variants and `Null`, in which case the caller
    /// must leave the value untouched.
    #[must_use]
    pub const fn apply_delta(&self, delta: i64) -> Option<Self> {
        match self {
            Self::I32(v) => Some(Self::I32((*v as i64).wrapping_add(delta) as i32)),
            Self::U32(v) => Some(Self::U32((*v as i64).wrapping_add(delta) as u32)),
            Self::I64(v) => Some(Self::I64(v.wrapping_add(delta))),
            Self::U64(v) => Some(Self::U64(v.wrapping_add(delta as u64))),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}i32"),
            Self::U32(v) => write!(f, "{v}u32"),
            Self::I64(v) => write!(f, "{v}i64"),
            Self::U64(v) => write!(f, "{v}u64"),
            Self::F32(v) => write!(f, "{v}f32"),
            Self::Quark(q) => write!(f, "quark:{q}"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}
