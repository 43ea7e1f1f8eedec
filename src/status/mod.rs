//! Task status log
//!
//! Every entity directory carries an append-only `log.txt` with one line per
//! task invocation:
//!
//! ```text
//! 2018-05-14T10:12:01;define_glacier_region;SUCCESS
//! 2018-05-14T10:12:03;compute_centerlines;MissingPrerequisiteError: ...
//! ```
//!
//! The last line for a task name decides whether that task must run again.
//! Lines are never rewritten or compacted.

pub mod mirror;

pub use mirror::ErrorMirror;

use crate::error::WorkflowError;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Outcome marker of a successful task
pub const SUCCESS: &str = "SUCCESS";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Local timestamp in the log's format.
pub fn timestamp() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

/// One parsed log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub timestamp: String,
    pub task_name: String,
    /// `SUCCESS` or `<ErrorClass>: <message>`
    pub outcome: String,
}

impl StatusRecord {
    pub fn is_success(&self) -> bool {
        self.outcome == SUCCESS
    }

    /// Render as a log line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{};{};{}", self.timestamp, self.task_name, self.outcome)
    }

    /// Parse a log line. The outcome may itself contain `;`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.splitn(3, ';');
        let timestamp = fields.next()?;
        let task_name = fields.next()?;
        let outcome = fields.next()?;
        if timestamp.is_empty() || task_name.is_empty() {
            return None;
        }
        Some(Self {
            timestamp: timestamp.to_string(),
            task_name: task_name.to_string(),
            outcome: outcome.to_string(),
        })
    }
}

/// Failure description written to the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub class: String,
    pub message: String,
}

impl TaskFailure {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// `<ErrorClass>: <message>`, flattened to a single line.
    pub fn outcome(&self) -> String {
        format!("{}: {}", self.class, single_line(&self.message))
    }
}

/// Task names become a `;`-separated field; they must not break the line format.
pub fn validate_task_name(task_name: &str) -> Result<(), WorkflowError> {
    if task_name.is_empty() || task_name.contains([';', '\n', '\r']) {
        return Err(WorkflowError::InvalidTaskName(task_name.to_string()));
    }
    Ok(())
}

pub(crate) fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Append-only status log of one entity
#[derive(Debug, Clone)]
pub struct StatusLog {
    path: PathBuf,
}

impl StatusLog {
    pub const FILE_NAME: &'static str = "log.txt";

    /// Log living in the entity directory `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line for `task_name`; `failure` is `None` for a success.
    ///
    /// The file is opened in append mode for every write. Concurrent writers
    /// for the same entity are not coordinated.
    pub fn append(&self, task_name: &str, failure: Option<&TaskFailure>) -> Result<StatusRecord, WorkflowError> {
        validate_task_name(task_name)?;
        let record = StatusRecord {
            timestamp: timestamp(),
            task_name: task_name.to_string(),
            outcome: match failure {
                None => SUCCESS.to_string(),
                Some(f) => f.outcome(),
            },
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| WorkflowError::io_context(&self.path, "open", e))?;
        writeln!(file, "{}", record.to_line()).map_err(|e| WorkflowError::io_context(&self.path, "append to", e))?;
        Ok(record)
    }

    /// All parseable records in file order.
    pub fn records(&self) -> Result<Vec<StatusRecord>, WorkflowError> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| WorkflowError::io_context(&self.path, "read", e))?;
        let mut records = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match StatusRecord::parse(line) {
                Some(record) => records.push(record),
                None => warn!(
                    log = %self.path.display(),
                    line = lineno + 1,
                    "Skipping malformed status line"
                ),
            }
        }
        Ok(records)
    }

    /// Outcome of the last invocation of exactly `task_name`, `None` if it never ran.
    pub fn last_status(&self, task_name: &str) -> Result<Option<String>, WorkflowError> {
        Ok(self
            .records()?
            .into_iter()
            .rev()
            .find(|r| r.task_name == task_name)
            .map(|r| r.outcome))
    }

    /// Whether the last invocation of `task_name` succeeded.
    pub fn succeeded(&self, task_name: &str) -> Result<bool, WorkflowError> {
        Ok(self.last_status(task_name)?.as_deref() == Some(SUCCESS))
    }
}
