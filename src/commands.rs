//! CLI command definitions
//!
//! Defines the clap commands for the steprunner CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the format of a test file
    Detect {
        /// YAML test file
        file: PathBuf,

        /// Print the full detection result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a test file for errors and best-practice warnings
    Validate {
        /// YAML test file
        file: PathBuf,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile a test file into canonical steps
    Compile {
        /// YAML test file
        file: PathBuf,

        /// Print the compiled test as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rewrite a test file in another format
    Convert {
        /// YAML test file
        file: PathBuf,

        /// Target format: compact or simplified
        #[arg(long)]
        to: String,

        /// Write the converted test here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Validate, compile and send test files to the platform
    Run {
        /// YAML test files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Record steps in memory instead of calling the platform
        #[arg(long)]
        dry_run: bool,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Number of files processed concurrently
        #[arg(long, short)]
        workers: Option<usize>,

        /// Report format: text, json or html
        #[arg(long)]
        report: Option<String>,

        /// Directory receiving the report file
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Start from the saved session instead of an empty one
        #[arg(long)]
        use_session: bool,

        /// Save the session after a single-file run
        #[arg(long)]
        save_session: bool,
    },

    /// Inspect or change the saved session
    #[command(subcommand)]
    Session(SessionCommands),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Print the saved session
    Show,

    /// Select a project; clears goal, journey and checkpoint
    SetProject { id: u64 },

    /// Select a goal; clears journey and checkpoint
    SetGoal {
        id: u64,

        /// Snapshot of the goal
        #[arg(long)]
        snapshot: Option<u64>,
    },

    /// Select a journey; clears checkpoint
    SetJourney { id: u64 },

    /// Select the checkpoint steps are added to
    SetCheckpoint { id: u64 },

    /// Override the position of the next step
    SetPosition { position: u32 },

    /// Forget every identifier
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the configuration file location
    Path,

    /// Print the effective configuration
    Show,
}
