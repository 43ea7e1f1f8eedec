//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::aggregate::{compile_task_log, task_log_path, write_task_log};
use crate::cli::parse::Commands;
use crate::cli::presentation;
use crate::config::ConfigLoader;
use crate::error::WorkflowError;
use crate::store::GlacierDirectory;
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runtime context for CLI execution: the workspace built from configuration.
pub struct RunContext {
    workspace: Arc<Workspace>,
}

impl RunContext {
    /// Create run context from the working directory and optional config path.
    pub fn new(working_dir: PathBuf, config_path: Option<PathBuf>) -> Result<Self, WorkflowError> {
        let mut config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&working_dir)?,
        };
        if config.working_dir.is_none() {
            config.working_dir = Some(working_dir);
        }
        Ok(Self {
            workspace: Workspace::from_config(&config)?.shared(),
        })
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn execute(&self, command: &Commands) -> Result<String, WorkflowError> {
        debug!(?command, "Dispatching command");
        match command {
            Commands::Status { id, tasks } => self.handle_status(id, tasks),
            Commands::TaskLog {
                tasks,
                filesuffix,
                no_append,
            } => self.handle_task_log(tasks, filesuffix, !*no_append),
            Commands::Diagnostics { id } => {
                let gdir = self.open(id)?;
                let diagnostics = if gdir.has_file(crate::store::DIAGNOSTICS, "")? {
                    gdir.get_diagnostics()?
                } else {
                    serde_json::Map::new()
                };
                Ok(presentation::format_diagnostics(id, &diagnostics))
            }
            Commands::Summary { id } => Ok(self.open(id)?.summary()),
            Commands::Info => {
                let entities = self.workspace.entity_ids(&self.workspace.base_dir())?.len();
                Ok(presentation::format_info(
                    self.workspace.working_dir(),
                    entities,
                    self.workspace.params(),
                    self.workspace.basenames(),
                ))
            }
        }
    }

    fn open(&self, id: &str) -> Result<GlacierDirectory, WorkflowError> {
        GlacierDirectory::open(Arc::clone(&self.workspace), id)
    }

    fn handle_status(&self, id: &str, tasks: &[String]) -> Result<String, WorkflowError> {
        let gdir = self.open(id)?;
        if tasks.is_empty() {
            let records = gdir.status_log().records()?;
            return Ok(presentation::format_status_records(id, &records));
        }
        let statuses = tasks
            .iter()
            .map(|task| Ok((task.clone(), gdir.get_task_status(task)?)))
            .collect::<Result<Vec<_>, WorkflowError>>()?;
        Ok(presentation::format_last_statuses(id, &statuses))
    }

    fn handle_task_log(&self, tasks: &[String], filesuffix: &str, append: bool) -> Result<String, WorkflowError> {
        let base_dir = self.workspace.base_dir();
        let mut gdirs = Vec::new();
        for id in self.workspace.entity_ids(&base_dir)? {
            match GlacierDirectory::open_in(Arc::clone(&self.workspace), id.as_str(), &base_dir) {
                Ok(gdir) => gdirs.push(gdir),
                Err(e) => warn!(entity = %id, error = %e, "Skipping unreadable glacier directory"),
            }
        }
        let task_names: Vec<&str> = tasks.iter().map(String::as_str).collect();
        let path = task_log_path(self.workspace.working_dir(), filesuffix);
        let table = write_task_log(compile_task_log(&gdirs, &task_names), &path, append)?;
        Ok(presentation::format_task_log(&table, &path))
    }
}
