//! Configuration System
//!
//! Layered configuration for a glacier workflow: built-in defaults, a user
//! config file, workspace config files and environment overrides, merged with
//! the `config` crate and validated before use.

use crate::basenames::{Basename, BasenameRegistry};
use crate::error::WorkflowError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod merge;
mod sources;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Working directory holding `per_glacier/`, `log/` and compiled outputs
    pub working_dir: Option<PathBuf>,

    /// Run-time parameters
    #[serde(default)]
    pub params: Params,

    /// Additional or overriding basename registrations
    #[serde(default)]
    pub basenames: BTreeMap<String, Basename>,

    /// Reference mass-balance catalog directory
    #[serde(default)]
    pub reference_dir: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Process-wide switches, passed explicitly to every workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Skip tasks whose last recorded outcome is a success
    #[serde(default)]
    pub auto_skip_task: bool,

    /// Log and swallow task errors instead of propagating them
    #[serde(default)]
    pub continue_on_error: bool,

    /// gzip pickles and tar archives
    #[serde(default = "default_true")]
    pub use_compression: bool,

    /// Pack shapefile component sets into a single tar archive
    #[serde(default = "default_true")]
    pub use_tar_shapefiles: bool,

    /// Capacity of the temporary file cache
    #[serde(default = "default_lru_maxsize")]
    pub lru_maxsize: usize,

    /// Worker threads used when executing a task over many entities
    #[serde(default = "default_mp_processes")]
    pub mp_processes: usize,
}

fn default_true() -> bool {
    true
}

fn default_lru_maxsize() -> usize {
    100
}

fn default_mp_processes() -> usize {
    1
}

impl Default for Params {
    fn default() -> Self {
        Self {
            auto_skip_task: false,
            continue_on_error: false,
            use_compression: default_true(),
            use_tar_shapefiles: default_true(),
            lru_maxsize: default_lru_maxsize(),
            mp_processes: default_mp_processes(),
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), String> {
        if self.lru_maxsize == 0 {
            return Err("lru_maxsize must be at least 1".to_string());
        }
        if self.mp_processes == 0 {
            return Err("mp_processes must be at least 1".to_string());
        }
        Ok(())
    }
}

impl WorkflowConfig {
    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.params.validate() {
            errors.push(format!("params: {}", e));
        }

        for (key, basename) in &self.basenames {
            if let Err(e) = basename.split(key) {
                errors.push(format!("basenames: {}", e));
            }
        }

        if let Some(dir) = &self.working_dir {
            if dir.as_os_str().is_empty() {
                errors.push("working_dir cannot be empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Default registry extended with the configured basenames.
    pub fn registry(&self) -> Result<BasenameRegistry, WorkflowError> {
        let mut registry = BasenameRegistry::default();
        registry.extend(&self.basenames)?;
        Ok(registry)
    }
}

/// Loads [`WorkflowConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a working directory.
    ///
    /// Precedence (lowest to highest): defaults, `~/.config/glacierdir/config.toml`,
    /// `{working_dir}/config/config.toml`, `{working_dir}/config/{GLACIERDIR_ENV}.toml`,
    /// `GLACIERDIR__*` environment variables.
    pub fn load(working_dir: &Path) -> Result<WorkflowConfig, WorkflowError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, working_dir)?;
        let builder = sources::environment::add_to_builder(builder);

        let mut config: WorkflowConfig = builder.build()?.try_deserialize()?;
        if config.working_dir.is_none() {
            config.working_dir = Some(working_dir.to_path_buf());
        }
        Self::checked(config)
    }

    /// Load configuration from a single file plus environment overrides.
    pub fn load_from_file(path: &Path) -> Result<WorkflowConfig, WorkflowError> {
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path.to_path_buf()).required(true));
        let builder = sources::environment::add_to_builder(builder);
        let config: WorkflowConfig = builder.build()?.try_deserialize()?;
        Self::checked(config)
    }

    fn checked(config: WorkflowConfig) -> Result<WorkflowConfig, WorkflowError> {
        config.validate().map_err(|errors| {
            WorkflowError::Config(format!("Configuration validation failed:\n{}", errors.join("\n")))
        })?;
        Ok(config)
    }
}
