//! Entity identifiers and their sharded directory layout

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Length of the outer shard prefix (e.g. `RGI50-11`)
pub const OUTER_SHARD_LEN: usize = 8;
/// Length of the inner shard prefix (e.g. `RGI50-11.00`)
pub const INNER_SHARD_LEN: usize = 11;

const SUPPORTED_VERSIONS: [&str; 3] = ["50", "60", "61"];

/// Globally unique glacier identifier, e.g. `RGI50-11.00897`
///
/// Maps to `{root}/{id[..8]}/{id[..11]}/{id}`, which bounds the fan-out of
/// any single directory for collections of hundreds of thousands of entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Result<Self, WorkflowError> {
        let id = id.into();
        if !id.is_ascii() || id.len() < INNER_SHARD_LEN {
            return Err(WorkflowError::InvalidEntity(format!(
                "identifier {:?} must be at least {} ASCII characters",
                id, INNER_SHARD_LEN
            )));
        }
        if id.contains(['/', '\\']) || id.contains("..") || id.chars().any(char::is_whitespace) {
            return Err(WorkflowError::InvalidEntity(format!(
                "identifier {:?} contains path separators or whitespace",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn outer_shard(&self) -> &str {
        &self.0[..OUTER_SHARD_LEN]
    }

    pub fn inner_shard(&self) -> &str {
        &self.0[..INNER_SHARD_LEN]
    }

    /// Leaf directory for this entity under `root`.
    pub fn dir_under(&self, root: &Path) -> PathBuf {
        root.join(self.outer_shard())
            .join(self.inner_shard())
            .join(&self.0)
    }

    /// Two-digit inventory version, e.g. `50` for `RGI50-11.00897`.
    pub fn version(&self) -> &str {
        let head = self.0.split('-').next().unwrap_or("");
        if head.len() >= 2 {
            &head[head.len() - 2..]
        } else {
            head
        }
    }

    /// Fails unless the inventory version is one the store understands.
    pub fn check_version(&self) -> Result<(), WorkflowError> {
        let version = self.version();
        if SUPPORTED_VERSIONS.contains(&version) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidEntity(format!(
                "inventory version not supported: {}",
                version
            )))
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityId {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EntityId::new(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
