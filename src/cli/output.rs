//! CLI output: error mapping from domain errors to the CLI surface.

use crate::error::WorkflowError;

/// Map domain errors to a string for CLI output, prefixed by their class.
pub fn map_error(e: &WorkflowError) -> String {
    format!("{}: {}", e.class_name(), e)
}
