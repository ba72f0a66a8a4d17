//! Provider configuration and typed parameters.

use std::collections::BTreeMap;

/// A provider parameter value.
///
/// Parameters reach a provider as strings; this wrapper adds the typed
/// accessors. Failed numeric parses yield `None` rather than a sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamValue(String);

impl ParamValue {
    /// Wraps a raw parameter string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the parameter as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the parameter as a signed integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Parses the parameter as an unsigned integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Parses the parameter as a floating point number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }

    /// Parses the parameter as a boolean.
    ///
    /// Accepts the case-insensitive literals `true` and `false`;
    /// otherwise delegates to unsigned integer parsing, where any
    /// non-zero value is true.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if self.0.eq_ignore_ascii_case("true") {
            return Some(true);
        }
        if self.0.eq_ignore_ascii_case("false") {
            return Some(false);
        }
        self.as_u64().map(|v| v != 0)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Immutable configuration of one state provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    name: String,
    instance: Option<String>,
    params: BTreeMap<String, ParamValue>,
}

impl ProviderConfig {
    /// Builds a provider configuration.
    ///
    /// `name` is the provider file path (or a `builtin:` key); the
    /// optional `instance` label distinguishes multiple uses of the same
    /// provider.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        instance: Option<String>,
        params: BTreeMap<String, ParamValue>,
    ) -> Self {
        Self {
            name: name.into(),
            instance: instance.filter(|s| !s.is_empty()),
            params,
        }
    }

    /// Returns the provider name (file path or `builtin:` key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the instance label, if any.
    #[must_use]
    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// Returns one parameter, if present.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Returns all parameters.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        assert_eq!(ParamValue::new("42").as_u64(), Some(42));
        assert_eq!(ParamValue::new("-7").as_i64(), Some(-7));
        assert_eq!(ParamValue::new("-7").as_u64(), None);
        assert_eq!(ParamValue::new("2.5").as_f64(), Some(2.5));
        assert_eq!(ParamValue::new("nope").as_i64(), None);
    }

    #[test]
    fn bool_literals_then_uint_fallback() {
        assert_eq!(ParamValue::new("true").as_bool(), Some(true));
        assert_eq!(ParamValue::new("FALSE").as_bool(), Some(false));
        assert_eq!(ParamValue::new("TrUe").as_bool(), Some(true));
        assert_eq!(ParamValue::new("0").as_bool(), Some(false));
        assert_eq!(ParamValue::new("3").as_bool(), Some(true));
        assert_eq!(ParamValue::new("yes").as_bool(), None);
    }

    #[test]
    fn empty_instance_is_none() {
        let config = ProviderConfig::new("p.so", Some(String::new()), BTreeMap::new());
        assert_eq!(config.instance(), None);

        let config = ProviderConfig::new("p.so", Some("sched".to_owned()), BTreeMap::new());
        assert_eq!(config.instance(), Some("sched"));
    }
}
