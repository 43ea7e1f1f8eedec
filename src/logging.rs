//! Logging System
//!
//! Structured logging with the `tracing` crate. Level, format and destination
//! come from [`LoggingConfig`]; `GLACIERDIR_LOG`, `GLACIERDIR_LOG_MODULES`,
//! `GLACIERDIR_LOG_FORMAT` and `GLACIERDIR_LOG_OUTPUT` take precedence.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "GLACIERDIR_LOG";
const ENV_MODULES: &str = "GLACIERDIR_LOG_MODULES";
const ENV_FORMAT: &str = "GLACIERDIR_LOG_FORMAT";
const ENV_OUTPUT: &str = "GLACIERDIR_LOG_OUTPUT";

/// Logging configuration, the `[logging]` table of the workflow config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error or off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr or file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file, used when `output` is `file`
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// ANSI colors for text output on a terminal stream
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `glacierdir::task = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("glacierdir.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Stdout,
    Stderr,
    File,
}

/// Install the global subscriber.
///
/// Fails if the configuration is invalid or a subscriber is already set.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), WorkflowError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = build_env_filter(config)?;
    let format = env_override(ENV_FORMAT)
        .and_then(|f| parse_format(&f).ok())
        .map_or_else(|| parse_format(&config.format), Ok)?;
    let output = match env_override(ENV_OUTPUT) {
        Some(o) => parse_output(&o)?,
        None => parse_output(&config.output)?,
    };

    let writer = match output {
        Output::Stdout => BoxMakeWriter::new(std::io::stdout),
        Output::Stderr => BoxMakeWriter::new(std::io::stderr),
        Output::File => BoxMakeWriter::new(Mutex::new(open_log_file(&config.file)?)),
    };
    let layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);

    let registry = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Text => registry
            .with(layer.with_ansi(config.color && output != Output::File))
            .try_init(),
    };
    installed.map_err(|e| WorkflowError::Config(format!("Failed to install log subscriber: {}", e)))
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn open_log_file(path: &Path) -> Result<File, WorkflowError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| WorkflowError::Config(format!("Failed to create log directory {:?}: {}", parent, e)))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| WorkflowError::Config(format!("Failed to open log file {:?}: {}", path, e)))
}

/// `GLACIERDIR_LOG` replaces the configured filter entirely; module levels
/// from the config and `GLACIERDIR_LOG_MODULES` are layered on the base level.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, WorkflowError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level))
        .collect();
    if let Some(modules) = env_override(ENV_MODULES) {
        directives.extend(
            modules
                .split(',')
                .filter_map(|entry| entry.split_once('='))
                .map(|(module, level)| format!("{}={}", module.trim(), level.trim())),
        );
    }

    let mut filter = EnvFilter::new(&config.level);
    for directive in directives {
        let parsed = directive
            .parse()
            .map_err(|e| WorkflowError::Config(format!("Invalid log directive {:?}: {}", directive, e)))?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

fn parse_format(format: &str) -> Result<LogFormat, WorkflowError> {
    match format {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(WorkflowError::Config(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

fn parse_output(output: &str) -> Result<Output, WorkflowError> {
    match output {
        "stdout" => Ok(Output::Stdout),
        "stderr" => Ok(Output::Stderr),
        "file" => Ok(Output::File),
        other => Err(WorkflowError::Config(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            other
        ))),
    }
}
