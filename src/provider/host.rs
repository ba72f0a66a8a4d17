//! Provider hosts.
//!
//! A state provider is any object satisfying the [`StateProvider`]
//! capability set. How its code gets into the process is a host concern:
//! native dynamic libraries and embedded scripts are resolved by file
//! extension, and in-process providers (tests, demos, anything linked
//! into the binary) use the `builtin:` name scheme. The OS-level loading
//! machinery itself sits behind [`HostFactories`]; the engine only
//! validates the provider file and routes to the registered factory.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::event::{Event, TraceSet};
use crate::provider::config::ProviderConfig;
use crate::provider::dispatch::{callback, CallbackRegistry, EventCallback};
use crate::state::CurrentState;

/// Name prefix selecting an in-process provider instead of a file.
pub const BUILTIN_SCHEME: &str = "builtin:";

/// Registration façade handed to a provider during its init hook.
///
/// This is the only surface through which a provider can subscribe to
/// events; it also exposes the provider's own configuration.
pub struct Registrar<'a> {
    trace_set: &'a TraceSet,
    registry: &'a mut CallbackRegistry,
    config: &'a ProviderConfig,
}

impl Registrar<'_> {
    /// Registers a callback for every schema pair matched literally by
    /// `(trace_type, event_name)`; empty strings are wildcards. Returns
    /// true if at least one free slot was installed.
    pub fn register(
        &mut self,
        trace_type: &str,
        event_name: &str,
        cb: impl FnMut(&mut CurrentState<'_>, &Event) -> bool + 'static,
    ) -> bool {
        let cb = callback(cb);
        self.register_shared(trace_type, event_name, &cb)
    }

    /// Like [`Self::register`], but with a pre-wrapped shared callback,
    /// for providers that route several subscriptions into one closure.
    pub fn register_shared(
        &mut self,
        trace_type: &str,
        event_name: &str,
        cb: &EventCallback,
    ) -> bool {
        self.registry
            .register_simple(self.trace_set, trace_type, event_name, cb)
    }

    /// Registers a callback for every schema pair matched by the two
    /// regular expressions. Returns true if at least one free slot was
    /// installed.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidArgument` error if either pattern fails to
    /// compile.
    pub fn register_regex(
        &mut self,
        trace_type_re: &str,
        event_name_re: &str,
        cb: impl FnMut(&mut CurrentState<'_>, &Event) -> bool + 'static,
    ) -> Result<bool> {
        let cb = callback(cb);
        self.register_regex_shared(trace_type_re, event_name_re, &cb)
    }

    /// Shared-callback variant of [`Self::register_regex`].
    ///
    /// # Errors
    ///
    /// Returns an `InvalidArgument` error if either pattern fails to
    /// compile.
    pub fn register_regex_shared(
        &mut self,
        trace_type_re: &str,
        event_name_re: &str,
        cb: &EventCallback,
    ) -> Result<bool> {
        self.registry
            .register_regex(self.trace_set, trace_type_re, event_name_re, cb)
    }

    /// Returns the provider's instance label, if it has one.
    #[must_use]
    pub fn instance_name(&self) -> Option<&str> {
        self.config.instance()
    }

    /// Returns the provider's configuration.
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        self.config
    }
}

/// The provider capability set.
///
/// `on_init` runs before any event and is where the provider registers
/// its event callbacks; `on_fini` runs after the last event. Event
/// handling itself flows through the registered callbacks.
pub trait StateProvider {
    /// Called before processing any event.
    fn on_init(
        &mut self,
        state: &mut CurrentState<'_>,
        trace_set: &TraceSet,
        registrar: &mut Registrar<'_>,
    );

    /// Called after having processed all events.
    fn on_fini(&mut self, state: &mut CurrentState<'_>) {
        let _ = state;
    }
}

/// The kind of host a provider runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    /// Natively compiled code in a dynamic library (`so`, `dll`,
    /// `dylib`).
    NativeLibrary,
    /// Embedded-interpreter script (`py`).
    Script,
    /// Code linked into the running binary, selected by the `builtin:`
    /// name scheme.
    InProcess,
}

impl HostKind {
    /// Resolves the host kind for a provider file.
    ///
    /// # Errors
    ///
    /// - `StateProviderNotFound` if the file does not exist
    /// - `WrongStateProvider` if the path is a directory
    /// - `UnknownStateProviderType` if the extension maps to no host
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::new(ErrorKind::StateProviderNotFound)
                .with_context(path.display().to_string()));
        }

        if path.is_dir() {
            return Err(
                Error::wrong_state_provider(format!("{} is a directory", path.display()))
            );
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("so" | "dll" | "dylib") => Ok(Self::NativeLibrary),
            Some("py") => Ok(Self::Script),
            _ => Err(Error::new(ErrorKind::UnknownStateProviderType)
                .with_context(path.display().to_string())),
        }
    }

    /// Stable name of this host kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NativeLibrary => "native-library",
            Self::Script => "script",
            Self::InProcess => "in-process",
        }
    }
}

/// Factory producing a provider object from its configuration.
pub type ProviderFactory = Box<dyn Fn(&ProviderConfig) -> Result<Box<dyn StateProvider>>>;

/// Registry of provider loaders.
///
/// The native-library and script slots are the seams to the OS-level
/// loading machinery; builtins are keyed by the part after `builtin:` in
/// the provider name.
#[derive(Default)]
pub struct HostFactories {
    native: Option<ProviderFactory>,
    script: Option<ProviderFactory>,
    builtins: HashMap<String, ProviderFactory>,
}

impl HostFactories {
    /// Creates an empty factory registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the providers shipped in this crate.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut factories = Self::new();
        factories.register_builtin("linux", |config| {
            Ok(Box::new(crate::provider::builtin::LinuxSchedProvider::new(
                config,
            )))
        });
        factories
    }

    /// Installs the native-library loader.
    pub fn set_native(&mut self, factory: impl Fn(&ProviderConfig) -> Result<Box<dyn StateProvider>> + 'static) {
        self.native = Some(Box::new(factory));
    }

    /// Installs the script loader.
    pub fn set_script(&mut self, factory: impl Fn(&ProviderConfig) -> Result<Box<dyn StateProvider>> + 'static) {
        self.script = Some(Box::new(factory));
    }

    /// Installs an in-process provider under `builtin:<key>`.
    pub fn register_builtin(
        &mut self,
        key: impl Into<String>,
        factory: impl Fn(&ProviderConfig) -> Result<Box<dyn StateProvider>> + 'static,
    ) {
        self.builtins.insert(key.into(), Box::new(factory));
    }

    fn resolve(&self, config: &ProviderConfig) -> Result<(HostKind, Box<dyn StateProvider>)> {
        if let Some(key) = config.name().strip_prefix(BUILTIN_SCHEME) {
            let factory = self.builtins.get(key).ok_or_else(|| {
                Error::new(ErrorKind::StateProviderNotFound)
                    .with_context(format!("no builtin provider \"{key}\""))
            })?;
            return Ok((HostKind::InProcess, factory(config)?));
        }

        let kind = HostKind::from_path(Path::new(config.name()))?;
        let factory = match kind {
            HostKind::NativeLibrary => self.native.as_ref(),
            HostKind::Script => self.script.as_ref(),
            HostKind::InProcess => None,
        };

        let factory = factory.ok_or_else(|| {
            Error::wrong_state_provider(format!(
                "no {} loader installed for {}",
                kind.as_str(),
                config.name()
            ))
        })?;

        Ok((kind, factory(config)?))
    }
}

/// A loaded provider together with its callback table.
///
/// This is the engine-facing object: the init hook clears and refills the
/// callback table, the event hook is the two-lookup dispatch, the fini
/// hook tears the table down.
pub struct ProviderHost {
    kind: HostKind,
    config: ProviderConfig,
    provider: Box<dyn StateProvider>,
    registry: CallbackRegistry,
}

impl std::fmt::Debug for ProviderHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHost")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProviderHost {
    /// Resolves and loads the provider described by `config`.
    ///
    /// # Errors
    ///
    /// Propagates resolution and loading failures; see
    /// [`HostKind::from_path`] for the error kinds.
    pub fn from_config(config: ProviderConfig, factories: &HostFactories) -> Result<Self> {
        let (kind, provider) = factories.resolve(&config)?;
        debug!(name = config.name(), kind = kind.as_str(), "loaded state provider");

        Ok(Self {
            kind,
            config,
            provider,
            registry: CallbackRegistry::new(),
        })
    }

    /// Wraps an already-constructed provider object.
    #[must_use]
    pub fn in_process(config: ProviderConfig, provider: Box<dyn StateProvider>) -> Self {
        Self {
            kind: HostKind::InProcess,
            config,
            provider,
            registry: CallbackRegistry::new(),
        }
    }

    /// Returns the host kind.
    #[must_use]
    pub const fn kind(&self) -> HostKind {
        self.kind
    }

    /// Returns the provider configuration.
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Runs the provider's init hook, rebuilding the callback table.
    pub fn on_init(&mut self, state: &mut CurrentState<'_>, trace_set: &TraceSet) {
        self.registry.clear();

        let mut registrar = Registrar {
            trace_set,
            registry: &mut self.registry,
            config: &self.config,
        };
        self.provider.on_init(state, trace_set, &mut registrar);
    }

    /// Dispatches one event through the callback table.
    ///
    /// Events with no installed slot are dropped; the returned boolean is
    /// the callback's continuation hint, `true` when nothing ran.
    pub fn on_event(&mut self, state: &mut CurrentState<'_>, event: &Event) -> bool {
        self.registry.dispatch(state, event).unwrap_or(true)
    }

    /// Runs the provider's fini hook and drops the callback table.
    pub fn on_fini(&mut self, state: &mut CurrentState<'_>) {
        self.provider.on_fini(state);
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn config(name: &str) -> ProviderConfig {
        ProviderConfig::new(name, None, BTreeMap::new())
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = HostKind::from_path(Path::new("/nonexistent/p.so")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateProviderNotFound);
    }

    #[test]
    fn directory_is_wrong_provider() {
        let dir = tempdir().unwrap();
        let err = HostKind::from_path(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongStateProvider);
    }

    #[test]
    fn extension_resolution() {
        let dir = tempdir().unwrap();

        for (name, expected) in [
            ("p.so", HostKind::NativeLibrary),
            ("p.dll", HostKind::NativeLibrary),
            ("p.dylib", HostKind::NativeLibrary),
            ("p.py", HostKind::Script),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"").unwrap();
            assert_eq!(HostKind::from_path(&path).unwrap(), expected);
        }

        let path = dir.path().join("p.txt");
        std::fs::write(&path, b"").unwrap();
        let err = HostKind::from_path(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownStateProviderType);
    }

    #[test]
    fn native_provider_without_loader_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.so");
        std::fs::write(&path, b"").unwrap();

        let factories = HostFactories::with_defaults();
        let err =
            ProviderHost::from_config(config(path.to_str().unwrap()), &factories).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongStateProvider);
    }

    #[test]
    fn unknown_builtin_is_not_found() {
        let factories = HostFactories::with_defaults();
        let err = ProviderHost::from_config(config("builtin:nope"), &factories).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateProviderNotFound);
    }

    #[test]
    fn builtin_linux_resolves_in_process() {
        let factories = HostFactories::with_defaults();
        let host = ProviderHost::from_config(config("builtin:linux"), &factories).unwrap();
        assert_eq!(host.kind(), HostKind::InProcess);
    }
}
