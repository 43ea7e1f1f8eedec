//! Workspace: the explicit configuration every directory handle carries
//!
//! Instead of reading ambient global state, handles and task runners get an
//! `Arc<Workspace>` at construction. Tests can therefore run several
//! workspaces with different policies side by side.

use crate::basenames::BasenameRegistry;
use crate::cache::{LruFileCache, SharedFileCache};
use crate::config::{Params, WorkflowConfig};
use crate::entity::EntityId;
use crate::error::WorkflowError;
use crate::status::ErrorMirror;
use crate::store::reference::ReferenceCatalog;
use crate::store::shapefile::{JsonShapeCodec, ShapefileCodec};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Directory below the working directory holding all entity directories
pub const PER_GLACIER: &str = "per_glacier";

pub struct Workspace {
    working_dir: PathBuf,
    params: Params,
    basenames: BasenameRegistry,
    codec: Arc<dyn ShapefileCodec>,
    reference_dir: Option<PathBuf>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("working_dir", &self.working_dir)
            .field("params", &self.params)
            .field("basenames", &self.basenames.len())
            .finish()
    }
}

impl Workspace {
    /// Workspace with default params and registry.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            params: Params::default(),
            basenames: BasenameRegistry::default(),
            codec: Arc::new(JsonShapeCodec),
            reference_dir: None,
        }
    }

    /// Workspace described by a loaded configuration.
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, WorkflowError> {
        let working_dir = config
            .working_dir
            .clone()
            .ok_or_else(|| WorkflowError::Config("Need a valid working_dir".to_string()))?;
        Ok(Self {
            working_dir,
            params: config.params.clone(),
            basenames: config.registry()?,
            codec: Arc::new(JsonShapeCodec),
            reference_dir: config.reference_dir.clone(),
        })
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_basenames(mut self, basenames: BasenameRegistry) -> Self {
        self.basenames = basenames;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn ShapefileCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_reference_dir(mut self, dir: PathBuf) -> Self {
        self.reference_dir = Some(dir);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn basenames(&self) -> &BasenameRegistry {
        &self.basenames
    }

    pub fn codec(&self) -> &dyn ShapefileCodec {
        self.codec.as_ref()
    }

    pub fn reference_dir(&self) -> Option<&Path> {
        self.reference_dir.as_deref()
    }

    /// Open the reference catalog under the configured `reference_dir`.
    pub fn reference_catalog(&self) -> Result<ReferenceCatalog, WorkflowError> {
        let dir = self
            .reference_dir
            .as_deref()
            .ok_or_else(|| WorkflowError::Config("No reference_dir configured".to_string()))?;
        ReferenceCatalog::open(dir)
    }

    /// File cache over `dir`, bounded by `lru_maxsize`.
    ///
    /// Files already in `dir` are tracked oldest first by modification time,
    /// so the bound applies to leftovers of earlier runs too.
    pub fn file_cache(&self, dir: &Path) -> Result<SharedFileCache, WorkflowError> {
        fs::create_dir_all(dir).map_err(|e| WorkflowError::io_context(dir, "create", e))?;
        let mut existing = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| WorkflowError::io_context(dir, "read", e))? {
            let entry = entry.map_err(|e| WorkflowError::io_context(dir, "read", e))?;
            let metadata = entry.metadata().map_err(|e| WorkflowError::io_context(&entry.path(), "stat", e))?;
            if metadata.is_file() {
                existing.push((metadata.modified().ok(), entry.path()));
            }
        }
        existing.sort();
        let initial = existing.into_iter().map(|(_, path)| path).collect();
        Ok(LruFileCache::new(initial, self.params.lru_maxsize).shared())
    }

    /// Default base for entity directories: `{working_dir}/per_glacier`.
    pub fn base_dir(&self) -> PathBuf {
        self.working_dir.join(PER_GLACIER)
    }

    pub fn error_mirror(&self) -> ErrorMirror {
        ErrorMirror::new(&self.working_dir)
    }

    /// Identifiers of every entity directory under `base_dir`, sorted.
    ///
    /// Entity directories sit exactly three levels below the base.
    pub fn entity_ids(&self, base_dir: &Path) -> Result<Vec<EntityId>, WorkflowError> {
        if !base_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in WalkDir::new(base_dir).min_depth(3).max_depth(3) {
            let entry = entry.map_err(|e| WorkflowError::Io(std::io::Error::other(e.to_string())))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(id) = EntityId::new(name) {
                    if id.dir_under(base_dir) == entry.path() {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove every entity directory and the error mirror.
    pub fn reset(&self) -> Result<(), WorkflowError> {
        for dir in [self.base_dir(), self.error_mirror().dir().to_path_buf()] {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| WorkflowError::io_context(&dir, "remove", e))?;
            }
        }
        Ok(())
    }
}
