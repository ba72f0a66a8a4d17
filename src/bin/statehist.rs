//! State history builder CLI.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use statehist::build::{BuildArgs, Builder};
use statehist::cli::{self, ExitCode};
use statehist::event::JsonTraceOpener;
use statehist::provider::HostFactories;

#[derive(Parser, Debug)]
#[command(
    name = "statehist",
    version,
    about = "Build a queryable state history from trace files"
)]
struct Cli {
    /// Trace paths (at least one)
    #[arg(required = true, value_name = "TRACE")]
    traces: Vec<PathBuf>,

    /// Write the database in this directory
    #[arg(short = 'd', long = "db-dir", value_name = "PATH")]
    db_dir: Option<PathBuf>,

    /// Overwrite files even if the output directory already exists
    #[arg(short = 'f', long = "force")]
    force: bool,

    /// State provider, "path" or "instance:path" (repeatable, at least one)
    #[arg(
        short = 's',
        long = "stateprov",
        required = true,
        value_name = "PROVIDER"
    )]
    stateprov: Vec<String>,

    /// Provider parameter, "key=value" or "instance:key=value" (repeatable)
    #[arg(short = 'P', long = "param", value_name = "PARAM")]
    params: Vec<String>,

    /// Bind address for build progress publishing
    #[arg(short = 'b', long = "bind-progress", value_name = "ENDPOINT")]
    bind_progress: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn run(cli: Cli) -> statehist::Result<()> {
    let builder = Builder::new(BuildArgs {
        traces: cli.traces,
        db_dir: cli.db_dir,
        force: cli.force,
        providers: cli.stateprov,
        params: cli.params,
        bind_progress: cli.bind_progress,
    })?;

    let summary = builder.run(&JsonTraceOpener, &HostFactories::with_defaults())?;

    tracing::info!(
        events = summary.events,
        stopped_early = summary.stopped_early,
        db_dir = %builder.db_dir().display(),
        "done"
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => process::exit(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(ExitCode::ERROR);
        }
    }
}
