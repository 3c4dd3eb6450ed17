//! steprunner - detect, validate, compile and run YAML tests
//!
//! Thin shell over the library: parses arguments, loads configuration,
//! initializes logging and dispatches the command.

use clap::Parser;
use std::path::PathBuf;
use steprunner::cli;
use steprunner::commands::Commands;
use steprunner::common::config::Config;
use steprunner::common::logging;

#[derive(Parser)]
#[command(name = "steprunner", about = "Multi-dialect YAML test runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let log_file = cli.log_file.clone().or_else(|| config.logging.file.clone());
    let guard = logging::init_cli(log_file.as_deref());

    let code = match cli::dispatch(cli.command, &config).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    // Flush the file writer before exiting
    drop(guard);
    std::process::exit(code);
}
