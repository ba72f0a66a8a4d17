//! Error types and error handling strategy.
//!
//! The engine uses one central error type with a small set of kinds. Error
//! handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - File-format modules carry their own precise error enums and are
//!   converted to a central kind at the sink boundary
//! - Provider callbacks never unwind the engine; they signal failure
//!   through their boolean return value

use core::fmt;
use std::sync::Arc;

use crate::types::Quark;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A user-supplied value failed validation (missing trace, duplicate
    /// provider instance name, malformed parameter expression).
    InvalidArgument,
    /// The referenced provider file is inaccessible or of a kind the host
    /// cannot handle.
    WrongStateProvider,
    /// The provider file extension does not map to a known host.
    UnknownStateProviderType,
    /// The provider file does not exist at all.
    StateProviderNotFound,
    /// The progress transport could not bind to its endpoint.
    MqBind,
    /// A quark id was looked up that was never interned. Indicates a
    /// programmer error or file corruption.
    WrongQuark(u32),
    /// Unexpected failure during trace add or playback.
    Builder,
    /// An underlying I/O failure.
    Io,
}

impl ErrorKind {
    /// Stable, grep-friendly name for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::WrongStateProvider => "wrong state provider",
            Self::UnknownStateProviderType => "unknown state provider type",
            Self::StateProviderNotFound => "state provider not found",
            Self::MqBind => "progress transport bind error",
            Self::WrongQuark(_) => "wrong quark",
            Self::Builder => "build error",
            Self::Io => "I/O error",
        }
    }
}

/// The main error type for state-history operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Creates an `InvalidArgument` error with context text.
    #[must_use]
    pub fn invalid_argument(ctx: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_context(ctx)
    }

    /// Creates a `WrongStateProvider` error with context text.
    #[must_use]
    pub fn wrong_state_provider(ctx: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrongStateProvider).with_context(ctx)
    }

    /// Creates a `WrongQuark` error for the offending quark.
    #[must_use]
    pub fn wrong_quark(quark: Quark) -> Self {
        Self::new(ErrorKind::WrongQuark(quark.as_raw()))
    }

    /// Creates a `Builder` error with context text.
    #[must_use]
    pub fn builder(ctx: impl Into<String>) -> Self {
        Self::new(ErrorKind::Builder).with_context(ctx)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the context text, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Adds context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::WrongQuark(q) => write!(f, "wrong quark: {q}")?,
            kind => write!(f, "{}", kind.as_str())?,
        }

        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io).with_source(e)
    }
}

/// Result alias using the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_context() {
        let err = Error::invalid_argument("trace \"a\" does not exist");
        assert_eq!(
            err.to_string(),
            "invalid argument: trace \"a\" does not exist"
        );
    }

    #[test]
    fn wrong_quark_displays_id() {
        let err = Error::wrong_quark(Quark::from_raw(9));
        assert_eq!(err.to_string(), "wrong quark: 9");
        assert_eq!(err.kind(), ErrorKind::WrongQuark(9));
    }

    #[test]
    fn io_conversion_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io);
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
