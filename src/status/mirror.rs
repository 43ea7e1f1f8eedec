//! Working-directory mirror of task failures
//!
//! Failures are additionally appended to `{working_dir}/log/{entity}.ERROR`
//! so that a large run can be inspected without walking every entity
//! directory. Successes are not mirrored.

use crate::error::WorkflowError;
use crate::status::{single_line, timestamp, TaskFailure};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const SEP: &str = "; ";

#[derive(Debug, Clone)]
pub struct ErrorMirror {
    dir: PathBuf,
}

impl ErrorMirror {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            dir: working_dir.join("log"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.dir.join(format!("{}.ERROR", entity))
    }

    /// Append `time; task; ErrorClass; message`.
    pub fn record(&self, entity: &str, task_name: &str, failure: &TaskFailure) -> Result<(), WorkflowError> {
        fs::create_dir_all(&self.dir).map_err(|e| WorkflowError::io_context(&self.dir, "create", e))?;
        let path = self.path_for(entity);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WorkflowError::io_context(&path, "open", e))?;
        writeln!(
            file,
            "{}{SEP}{}{SEP}{}{SEP}{}",
            timestamp(),
            task_name,
            failure.class,
            single_line(&failure.message)
        )
        .map_err(|e| WorkflowError::io_context(&path, "append to", e))
    }
}
