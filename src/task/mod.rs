//! Task runner
//!
//! Wraps a processing function for one entity with the status bookkeeping
//! that makes re-runs idempotent: a task whose last recorded outcome is
//! `SUCCESS` is skipped unless a reset is requested, and every invocation
//! that actually runs leaves one line in the entity's status log.

pub mod execute;

pub use execute::execute_entity_task;

use crate::basenames::BasenameRegistry;
use crate::error::{TaskError, WorkflowError};
use crate::status::{validate_task_name, TaskFailure};
use crate::store::GlacierDirectory;
use std::any::{type_name, Any};
use std::fmt;
use tracing::{debug, error, info};

/// Per-invocation options
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Force (`Some(true)`) or allow skipping (`Some(false)`); `None` follows
    /// the workspace's `auto_skip_task`
    pub reset: Option<bool>,
    /// Appended to the task name in the status log
    pub filesuffix: String,
    /// Emit an info event when the task runs
    pub print_log: bool,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            reset: None,
            filesuffix: String::new(),
            print_log: true,
        }
    }
}

impl TaskOptions {
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = Some(reset);
        self
    }

    pub fn with_filesuffix(mut self, filesuffix: impl Into<String>) -> Self {
        self.filesuffix = filesuffix.into();
        self
    }

    pub fn quiet(mut self) -> Self {
        self.print_log = false;
        self
    }
}

/// A named operation on one entity, with the artifacts it writes
#[derive(Debug, Clone)]
pub struct EntityTask {
    name: String,
    writes: Vec<String>,
}

impl EntityTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writes: Vec::new(),
        }
    }

    /// Declare the artifact keys this task writes.
    pub fn writes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writes.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_writes(&self) -> &[String] {
        &self.writes
    }

    /// Check the task name and that every declared artifact is registered.
    pub fn validate(&self, registry: &BasenameRegistry) -> Result<(), WorkflowError> {
        validate_task_name(&self.name)?;
        for key in &self.writes {
            registry.get(key)?;
        }
        Ok(())
    }

    /// Listing of the declared artifacts with their registry docs.
    pub fn io_doc(&self, registry: &BasenameRegistry) -> Result<String, WorkflowError> {
        let mut doc = String::from("Files written to the glacier directory:\n");
        for key in &self.writes {
            doc.push_str(&registry.doc_str(key)?);
            doc.push('\n');
        }
        Ok(doc)
    }

    /// Run `f` on `gdir` unless its last recorded outcome is a success.
    ///
    /// Returns `Ok(None)` when the task was skipped, or failed under
    /// `continue_on_error`.
    pub fn run<T, E, F>(
        &self,
        gdir: &GlacierDirectory,
        options: &TaskOptions,
        f: F,
    ) -> Result<Option<T>, TaskError<E>>
    where
        F: FnOnce(&GlacierDirectory) -> Result<T, E>,
        E: fmt::Debug + fmt::Display + 'static,
    {
        let workspace = gdir.workspace();
        self.validate(workspace.basenames())?;
        let task_name = format!("{}{}", self.name, options.filesuffix);
        validate_task_name(&task_name)?;

        let reset = options.reset.unwrap_or(!workspace.params().auto_skip_task);
        if !reset && gdir.status_log().succeeded(&task_name)? {
            debug!(entity = %gdir.id(), task = %task_name, "Task already succeeded, skipping");
            return Ok(None);
        }

        if options.print_log {
            info!(entity = %gdir.id(), task = %task_name, "Running task");
        }

        match f(gdir) {
            Ok(value) => {
                gdir.log(&task_name, None)?;
                Ok(Some(value))
            }
            Err(err) => {
                let class = error_class(&err);
                let failure = TaskFailure::new(class.clone(), err.to_string());
                error!(
                    entity = %gdir.id(),
                    task = %task_name,
                    class = %class,
                    "{} occurred during task {} on {}: {}",
                    class,
                    task_name,
                    gdir.id(),
                    failure.message
                );
                gdir.log(&task_name, Some(&failure))?;
                if workspace.params().continue_on_error {
                    return Ok(None);
                }
                Err(TaskError::Failed {
                    task: task_name,
                    entity: gdir.id().to_string(),
                    class,
                    error: err,
                })
            }
        }
    }
}

/// A task over all entities at once, without status bookkeeping
#[derive(Debug, Clone)]
pub struct GlobalTask {
    name: String,
}

impl GlobalTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run<T, F>(&self, gdirs: &[GlacierDirectory], f: F) -> T
    where
        F: FnOnce(&[GlacierDirectory]) -> T,
    {
        info!(task = %self.name, entities = gdirs.len(), "Running global task");
        f(gdirs)
    }
}

/// Class name recorded for a task error.
///
/// Crate errors report their own class, also when wrapped in
/// `anyhow::Error`; anything else reports its short type name.
pub fn error_class<E: 'static>(err: &E) -> String {
    let any = err as &dyn Any;
    if let Some(e) = any.downcast_ref::<WorkflowError>() {
        return e.class_name().to_string();
    }
    if any.is::<std::io::Error>() {
        return "IoError".to_string();
    }
    if let Some(e) = any.downcast_ref::<anyhow::Error>() {
        if let Some(inner) = e.downcast_ref::<WorkflowError>() {
            return inner.class_name().to_string();
        }
        if e.is::<std::io::Error>() {
            return "IoError".to_string();
        }
        return "Error".to_string();
    }
    short_type_name(type_name::<E>())
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
