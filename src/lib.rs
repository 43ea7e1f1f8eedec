//! Glacierdir: per-glacier directory store and idempotent task runner
//!
//! Every glacier of a large inventory gets its own directory of typed
//! artifacts. Processing steps run as tasks that record their outcome in the
//! directory's status log, so an interrupted batch can be restarted and only
//! the missing work is redone.

pub mod aggregate;
pub mod basenames;
pub mod cache;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod logging;
pub mod paths;
pub mod status;
pub mod store;
pub mod tabular;
pub mod task;
pub mod workspace;

pub use error::{TaskError, WorkflowError};
pub use store::GlacierDirectory;
pub use task::{EntityTask, GlobalTask, TaskOptions};
pub use workspace::Workspace;
