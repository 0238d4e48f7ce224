//! hpc-notebook CLI
//!
//! Starts a Jupyter notebook server as a SLURM batch job, forwards a local
//! port to it over SSH and opens it in the browser.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hpc_notebook::commands::{self, SessionOptions};
use hpc_notebook::output::print_error;

#[derive(Parser)]
#[command(name = "hpc-notebook")]
#[command(author, version, about = "Run a Jupyter notebook on a SLURM cluster")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Scheduler partition (overrides HPCNB_PARTITION)
    #[arg(short, long, global = true)]
    partition: Option<String>,

    /// Wall-clock limit, e.g. 3:00:00 (overrides HPCNB_TIME_LIMIT)
    #[arg(short, long, global = true)]
    time: Option<String>,

    /// Give up if the server has not started after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Leave the job running when the tunnel exits
    #[arg(long, global = true)]
    keep_job: bool,

    /// Print the notebook URL instead of opening a browser
    #[arg(long, global = true)]
    no_browser: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit the notebook job and connect to it (default)
    Start,

    /// Print the batch script that would be submitted
    Script,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective settings
    Show,
    /// Show config file path
    Path,
    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            partition: self.partition.clone(),
            time_limit: self.time.clone(),
            timeout_secs: self.timeout,
            keep_job: self.keep_job,
            no_browser: self.no_browser,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let options = cli.session_options();
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => commands::start_command(&options, config_path).await,
        Commands::Script => {
            commands::script_command(&options, config_path)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => commands::config_show(config_path)?,
                ConfigAction::Path => commands::config_path(config_path)?,
                ConfigAction::Init { force } => commands::config_init(config_path, force)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
