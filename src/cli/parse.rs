//! CLI parse: clap types for glacierdir. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Glacierdir CLI - inspect per-glacier directories of a working directory
#[derive(Parser, Debug)]
#[command(name = "glacierdir")]
#[command(about = "Inspect task statuses and diagnostics of per-glacier directories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Working directory holding per_glacier/
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Single configuration file, replacing the layered user/workspace files
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Shorthand for --log-level debug
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file, used with --log-output file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the status log of one glacier
    Status {
        /// Glacier identifier, e.g. RGI50-11.00897
        id: String,
        /// Only show the last outcome of these tasks
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
    /// Compile the last status of tasks over all glaciers into task_log{suffix}.csv
    TaskLog {
        /// Tasks to report
        #[arg(long = "task", required = true)]
        tasks: Vec<String>,
        /// Suffix of the output file
        #[arg(long, default_value = "")]
        filesuffix: String,
        /// Overwrite an existing task log instead of joining onto it
        #[arg(long)]
        no_append: bool,
    },
    /// Show the diagnostics of one glacier
    Diagnostics {
        /// Glacier identifier
        id: String,
    },
    /// Show the description of one glacier
    Summary {
        /// Glacier identifier
        id: String,
    },
    /// Show the working directory, parameters and registered basenames
    Info,
}
