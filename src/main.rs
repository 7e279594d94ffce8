#![deny(missing_docs)]

//! Command line entry point for the media integrity monitor.
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mediamon::catalog::CatalogStore;
use mediamon::clock::SystemClock;
use mediamon::config::{self, MonitorConfig};
use mediamon::logging;
use mediamon::pipeline;
use mediamon::report::{HtmlReportWriter, LogReporter, Reporters, WebhookReporter};

/// Exit status when another live instance holds the run lock (EX_TEMPFAIL).
const EXIT_ALREADY_RUNNING: u8 = 75;

#[derive(Parser, Debug)]
#[clap(
    name = "mediamon",
    version = env!("CARGO_PKG_VERSION"),
    about = "Checksums media files, validates changed ones with an external tool, and reports corrupt files."
)]
struct Cli {
    /// Config file to use instead of the one in the application directory.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one monitoring pass (default)
    Run,
    /// Print files whose last validation failed, one per line
    Invalid,
    /// Print catalog counts
    Stats,
    /// Write a default config file
    InitConfig {
        /// Replace an existing file
        #[clap(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => return run(cli.config),
        Command::Invalid => print_invalid(cli.config),
        Command::Stats => print_stats(cli.config),
        Command::InitConfig { force } => init_config(cli.config, force),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mediamon: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<PathBuf>) -> ExitCode {
    let config = match config::load_or_default(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            logging::init_stderr_only();
            tracing::error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = logging::init(&config.logging) {
        logging::init_stderr_only();
        tracing::warn!("File logging disabled: {err}");
    }

    let mut reporters = build_reporters(&config);
    match pipeline::run_guarded(&config, &SystemClock, &mut reporters) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) if err.is_already_running() => {
            tracing::warn!("{err}");
            ExitCode::from(EXIT_ALREADY_RUNNING)
        }
        Err(err) => {
            tracing::error!("Run aborted: {err}");
            ExitCode::FAILURE
        }
    }
}

fn build_reporters(config: &MonitorConfig) -> Reporters {
    let mut reporters = Reporters::new();
    reporters.push(Box::new(LogReporter::new()));
    if let Some(url) = &config.notify.webhook_url {
        reporters.push(Box::new(WebhookReporter::new(url.clone())));
    }
    if let Some(path) = &config.report.html_path {
        reporters.push(Box::new(HtmlReportWriter::new(path.clone())));
    }
    reporters
}

fn open_catalog(config_path: Option<PathBuf>) -> Result<CatalogStore, Box<dyn std::error::Error>> {
    logging::init_stderr_only();
    let config = config::load_or_default(config_path.as_deref())?;
    let store = CatalogStore::open(config.database_path()?, &config.catalog.table)?;
    Ok(store)
}

fn print_invalid(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_catalog(config_path)?;
    for filename in store.invalid_filenames()? {
        println!("{filename}");
    }
    Ok(())
}

fn print_stats(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let stats = open_catalog(config_path)?.stats()?;
    println!("total:   {}", stats.total);
    println!("pending: {}", stats.pending);
    println!("valid:   {}", stats.valid);
    println!("invalid: {}", stats.invalid);
    Ok(())
}

fn init_config(config_path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = match config_path {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    config::save_to_path(&MonitorConfig::default(), &path, force)?;
    println!("{}", path.display());
    Ok(())
}
