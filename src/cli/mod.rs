//! CLI support: exit codes and logging setup.

pub mod exit;

pub use exit::ExitCode;

use tracing_subscriber::EnvFilter;

/// Initialises the global `tracing` subscriber for a CLI run.
///
/// The filter honours `RUST_LOG` when set; otherwise `verbose` selects
/// between `info` and `debug`. Output goes to stderr so that stdout stays
/// machine-readable.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "statehist=debug" } else { "statehist=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
