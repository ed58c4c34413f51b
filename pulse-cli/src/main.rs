mod cli;
mod config;
mod driver;
mod error;
mod output;

use std::io::{self, IsTerminal};
use std::path::Path;
use std::process;

use chat_pulse::{ParticleField, PulseSession};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::Args,
    config::{apply_overrides, load_catalogs, load_config},
    driver::DriverOptions,
    error::Result,
    output::OutputManager,
};

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(args)) {
        error!("Application error: {}", e);
        #[cfg(feature = "colored-output")]
        {
            eprintln!("{} {}", "Error:".red().bold(), e);
        }
        #[cfg(not(feature = "colored-output"))]
        {
            eprintln!("Error: {}", e);
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args)?;
    debug!(?config, "Effective configuration");

    let catalogs = load_catalogs(&args.catalogs);
    let mut session = match args.seed {
        Some(seed) => {
            let field = ParticleField::with_seed(config.particles.clone(), seed);
            PulseSession::with_field(config, catalogs, field)
        }
        None => PulseSession::new(config, catalogs),
    };

    let stdout = io::stdout();
    let colored = stdout.is_terminal();
    let mut output = OutputManager::new(stdout.lock(), args.format, colored);
    let options = DriverOptions {
        show_chat: args.show_chat,
        particles: args.particles,
    };

    let reader = open_input(args.input.as_deref()).await?;
    driver::run(&mut session, reader, &mut output, options).await?;
    Ok(())
}

async fn open_input(path: Option<&Path>) -> Result<Box<dyn AsyncBufRead + Unpin>> {
    match path {
        Some(path) if path != Path::new("-") => {
            debug!("Reading chat from {}", path.display());
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => {
            debug!("Reading chat from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // Logs go to stderr; stdout carries the statistics.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}
