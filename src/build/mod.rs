//! Build front: argument validation and the end-to-end build run.
//!
//! [`Builder`] validates everything user-supplied as early as possible
//! (traces, output directory, provider specifications, parameters), lays
//! out the database directory and then runs playback with the history
//! builder and optional progress publisher as listeners.

pub mod history;

pub use history::StateHistoryBuilder;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::info;

use crate::error::{Error, Result};
use crate::event::{TraceOpener, TraceSet};
use crate::playback::{self, PlaybackListener, PlaybackSummary, ProgressPublisher, StopHandle, WriterTransport};
use crate::provider::{HostFactories, ParamValue, ProviderConfig, ProviderHost, BUILTIN_SCHEME};
use crate::state::SinkPaths;

/// Name of the trace symlink directory inside the database directory.
pub const TRACES_DIR: &str = "traces";

/// Default database directory when none is given.
pub const DEFAULT_DB_DIR: &str = "statehist";

/// Raw, unvalidated build arguments, straight from the CLI surface.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    /// Input trace paths, at least one.
    pub traces: Vec<PathBuf>,
    /// Output database directory; defaults to `./statehist`.
    pub db_dir: Option<PathBuf>,
    /// Overwrite an existing database directory.
    pub force: bool,
    /// Provider specifications, each `path` or `instance:path`.
    pub providers: Vec<String>,
    /// Provider parameters, each `key=value` or `instance:key=value`.
    pub params: Vec<String>,
    /// Optional progress publisher endpoint.
    pub bind_progress: Option<String>,
}

struct ProviderSpec {
    name: String,
    instance: Option<String>,
    params: BTreeMap<String, ParamValue>,
}

/// A validated build, ready to run.
#[derive(Debug)]
pub struct Builder {
    traces: Vec<PathBuf>,
    db_dir: PathBuf,
    configs: Vec<ProviderConfig>,
    bind_progress: Option<String>,
    stop: StopHandle,
}

impl Builder {
    /// Validates `args` and prepares the database directory.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidArgument` error for a missing trace, an
    /// existing output directory without `force`, a malformed provider
    /// or parameter expression, a parameter scoped to an unknown
    /// instance, or a duplicate instance name.
    pub fn new(args: BuildArgs) -> Result<Self> {
        if args.traces.is_empty() {
            return Err(Error::invalid_argument(
                "need at least one trace to work with",
            ));
        }

        for trace in &args.traces {
            if !trace.exists() {
                return Err(Error::invalid_argument(format!(
                    "trace {} does not exist",
                    trace.display()
                )));
            }
        }

        if args.providers.is_empty() {
            return Err(Error::invalid_argument(
                "need at least one state provider to work with",
            ));
        }

        let db_dir = args
            .db_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_DIR));

        if db_dir.exists() {
            if !args.force {
                return Err(Error::invalid_argument(format!(
                    "the database directory {} exists already (use --force to overwrite)",
                    db_dir.display()
                )));
            }
            if !db_dir.is_dir() {
                return Err(Error::invalid_argument(
                    "the database directory has to be a directory",
                ));
            }
        }

        let mut specs = parse_provider_specs(&args.providers)?;
        apply_params(&mut specs, &args.params)?;

        let configs = specs
            .into_iter()
            .map(|spec| ProviderConfig::new(spec.name, spec.instance, spec.params))
            .collect();

        std::fs::create_dir_all(&db_dir)?;
        link_traces(&db_dir, &args.traces)?;

        Ok(Self {
            traces: args.traces,
            db_dir,
            configs,
            bind_progress: args.bind_progress,
            stop: StopHandle::new(),
        })
    }

    /// Returns the database directory the build writes into.
    #[must_use]
    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// Returns the validated provider configurations, in specification
    /// order.
    #[must_use]
    pub fn provider_configs(&self) -> &[ProviderConfig] {
        &self.configs
    }

    /// Returns a handle that cancels the build between two events.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Opens the traces, loads the providers and plays the whole set.
    ///
    /// # Errors
    ///
    /// Propagates trace-open, provider-load, transport-bind and playback
    /// failures.
    pub fn run(
        &self,
        opener: &dyn TraceOpener,
        factories: &HostFactories,
    ) -> Result<PlaybackSummary> {
        let mut trace_set = TraceSet::new();
        for trace in &self.traces {
            trace_set.add_trace(opener, trace)?;
        }

        let mut hosts = Vec::with_capacity(self.configs.len());
        for config in &self.configs {
            hosts.push(ProviderHost::from_config(config.clone(), factories)?);
        }

        let history = StateHistoryBuilder::new(SinkPaths::in_dir(&self.db_dir), hosts);

        let mut listeners: Vec<Box<dyn PlaybackListener>> = vec![Box::new(history)];

        if let Some(endpoint) = &self.bind_progress {
            let transport = WriterTransport::bind(endpoint)?;
            listeners.push(Box::new(ProgressPublisher::new(Box::new(transport))));
        }

        info!(
            db_dir = %self.db_dir.display(),
            traces = self.traces.len(),
            providers = self.configs.len(),
            "building state history"
        );

        playback::play(&mut trace_set, &mut listeners, &self.stop)
    }
}

fn instance_spec_regex() -> Regex {
    Regex::new("^([A-Za-z0-9_][A-Za-z0-9_-]*):(.+)$").expect("static pattern")
}

fn parse_provider_specs(providers: &[String]) -> Result<Vec<ProviderSpec>> {
    let re = instance_spec_regex();
    let mut specs = Vec::with_capacity(providers.len());
    let mut seen = HashSet::new();

    for raw in providers {
        // a bare "builtin:linux" is a name, not an instance prefix
        let (instance, name) = match re.captures(raw) {
            Some(caps) if !raw.starts_with(BUILTIN_SCHEME) => (
                Some(caps[1].to_owned()),
                caps[2].to_owned(),
            ),
            _ => (None, raw.clone()),
        };

        if let Some(instance) = &instance {
            if !seen.insert(instance.clone()) {
                return Err(Error::invalid_argument(format!(
                    "duplicate state provider instance name: \"{instance}\""
                )));
            }
        }

        specs.push(ProviderSpec {
            name,
            instance,
            params: BTreeMap::new(),
        });
    }

    Ok(specs)
}

fn apply_params(specs: &mut [ProviderSpec], params: &[String]) -> Result<()> {
    let re = Regex::new("^(?:([A-Za-z0-9_][A-Za-z0-9_-]*):)?([A-Za-z0-9_][A-Za-z0-9_.-]*)=(.*)$")
        .expect("static pattern");

    for raw in params {
        let caps = re.captures(raw).ok_or_else(|| {
            Error::invalid_argument(format!("malformed parameter expression \"{raw}\""))
        })?;

        let instance = caps.get(1).map(|m| m.as_str());
        let key = caps[2].to_owned();
        let value = ParamValue::new(&caps[3]);

        match instance {
            None => {
                for spec in specs.iter_mut() {
                    spec.params.insert(key.clone(), value.clone());
                }
            }
            Some(instance) => {
                let spec = specs
                    .iter_mut()
                    .find(|spec| spec.instance.as_deref() == Some(instance))
                    .ok_or_else(|| {
                        Error::invalid_argument(format!(
                            "parameter for unknown provider instance \"{instance}\""
                        ))
                    })?;
                spec.params.insert(key.clone(), value);
            }
        }
    }

    Ok(())
}

/// Creates `traces/` inside the database directory with numeric symlinks
/// `0`, `1`, ... to the input traces.
fn link_traces(db_dir: &Path, traces: &[PathBuf]) -> Result<()> {
    let traces_dir = db_dir.join(TRACES_DIR);
    std::fs::create_dir_all(&traces_dir)?;

    for (ordinal, trace) in traces.iter().enumerate() {
        let link = traces_dir.join(ordinal.to_string());

        if link.symlink_metadata().is_ok() {
            std::fs::remove_file(&link)?;
        }

        let target = trace.canonicalize()?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &link)?;
        #[cfg(not(unix))]
        let _ = target;
    }

    Ok(())
}
