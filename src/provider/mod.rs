//! State providers: contract, configuration, hosting and dispatch.
//!
//! Providers are externally supplied pieces of code that observe events
//! and issue state mutations through the current-state façade. The engine
//! sees them behind the [`StateProvider`] capability set, whatever host
//! loaded them.

pub mod builtin;
pub mod config;
pub mod dispatch;
pub mod host;

pub use builtin::LinuxSchedProvider;
pub use config::{ParamValue, ProviderConfig};
pub use dispatch::{callback, CallbackRegistry, EventCallback};
pub use host::{
    HostFactories, HostKind, ProviderFactory, ProviderHost, Registrar, StateProvider,
    BUILTIN_SCHEME,
};
