//! Error types for the glacier directory store and task runner.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Store- and framework-level errors
///
/// `UnknownKey` and `MalformedBasename` signal configuration mistakes and are
/// never recovered by the task runner.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0} not in the basename registry")]
    UnknownKey(String),

    #[error("Malformed basename for key {key}: {file_name} (expected exactly one extension)")]
    MalformedBasename { key: String, file_name: String },

    #[error("Missing prerequisite {artifact:?} for {attribute}: {hint}")]
    MissingPrerequisite {
        attribute: String,
        artifact: PathBuf,
        hint: String,
    },

    #[error("Not a reference glacier: {0}")]
    NotAReferenceEntity(String),

    #[error("Basename {key} is registered as {registered}, not {requested}")]
    FormatMismatch {
        key: String,
        registered: String,
        requested: String,
    },

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Invalid task name: {0:?}")]
    InvalidTaskName(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Class name written to status logs when this error fails a task.
    pub fn class_name(&self) -> &'static str {
        match self {
            WorkflowError::UnknownKey(_) => "UnknownKeyError",
            WorkflowError::MalformedBasename { .. } => "MalformedBasenameError",
            WorkflowError::MissingPrerequisite { .. } => "MissingPrerequisiteError",
            WorkflowError::NotAReferenceEntity(_) => "NotAReferenceEntityError",
            WorkflowError::FormatMismatch { .. } => "FormatMismatchError",
            WorkflowError::InvalidEntity(_) => "InvalidEntityError",
            WorkflowError::InvalidTaskName(_) => "InvalidTaskNameError",
            WorkflowError::Serialization(_) => "SerializationError",
            WorkflowError::Config(_) => "ConfigError",
            WorkflowError::Io(_) => "IoError",
        }
    }

    pub(crate) fn io_context(path: &std::path::Path, action: &str, err: std::io::Error) -> Self {
        WorkflowError::Io(std::io::Error::new(
            err.kind(),
            format!("Failed to {} {:?}: {}", action, path, err),
        ))
    }
}

impl From<config::ConfigError> for WorkflowError {
    fn from(err: config::ConfigError) -> Self {
        WorkflowError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for WorkflowError {
    fn from(err: bincode::Error) -> Self {
        WorkflowError::Serialization(err.to_string())
    }
}

/// Outcome of a task invocation that did not produce a value
///
/// `Failed` carries the task's own error unchanged (fail-fast policy);
/// `Workflow` is raised by the framework itself, e.g. when the status log
/// cannot be written or a declared artifact is not registered.
#[derive(Debug, Error)]
pub enum TaskError<E>
where
    E: fmt::Debug + fmt::Display + 'static,
{
    #[error("{class} occurred during task {task} on {entity}: {error}")]
    Failed {
        task: String,
        entity: String,
        class: String,
        error: E,
    },

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl<E> TaskError<E>
where
    E: fmt::Debug + fmt::Display + 'static,
{
    /// The task's own error, if this is a task failure.
    pub fn task_error(&self) -> Option<&E> {
        match self {
            TaskError::Failed { error, .. } => Some(error),
            TaskError::Workflow(_) => None,
        }
    }

    pub fn into_task_error(self) -> Option<E> {
        match self {
            TaskError::Failed { error, .. } => Some(error),
            TaskError::Workflow(_) => None,
        }
    }
}
