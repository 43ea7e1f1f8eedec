//! Aggregation over many entity directories
//!
//! Read-only collection of task statuses and diagnostics across a batch.
//! A missing or unreadable per-entity file never aborts the collection: the
//! entity simply contributes an empty value.

use crate::error::WorkflowError;
use crate::store::{GlacierDirectory, DIAGNOSTICS};
use crate::tabular::{join_record, split_record};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the index column in task log tables
pub const INDEX_COLUMN: &str = "rgi_id";

/// Last task statuses, one row per entity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskLogTable {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<String>)>,
}

impl TaskLogTable {
    pub fn get(&self, id: &str, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|(row_id, _)| row_id == id)
            .map(|(_, values)| values[idx].as_str())
    }

    pub fn to_csv(&self) -> String {
        let mut out = join_record(std::iter::once(INDEX_COLUMN).chain(self.columns.iter().map(String::as_str)));
        out.push('\n');
        for (id, values) in &self.rows {
            out.push_str(&join_record(std::iter::once(id.as_str()).chain(values.iter().map(String::as_str))));
            out.push('\n');
        }
        out
    }

    pub fn from_csv(text: &str) -> Result<Self, WorkflowError> {
        let mut lines = text.lines().filter(|l| !l.is_empty());
        let header = lines
            .next()
            .ok_or_else(|| WorkflowError::Serialization("empty task log".to_string()))?;
        let columns: Vec<String> = split_record(header).into_iter().skip(1).collect();
        let mut rows = Vec::new();
        for line in lines {
            let mut fields = split_record(line).into_iter();
            let id = fields.next().unwrap_or_default();
            let mut values: Vec<String> = fields.collect();
            values.resize(columns.len(), String::new());
            rows.push((id, values));
        }
        Ok(Self { columns, rows })
    }

    /// Join `other` onto this table by entity id.
    ///
    /// Columns of `other` that already exist here get a `_n` suffix. Rows
    /// only present in `other` are appended after the existing ones.
    pub fn join(mut self, other: &TaskLogTable) -> Self {
        let existing: BTreeSet<String> = self.columns.iter().cloned().collect();
        let renamed: Vec<String> = other
            .columns
            .iter()
            .map(|c| if existing.contains(c) { format!("{}_n", c) } else { c.clone() })
            .collect();
        let width = self.columns.len();
        self.columns.extend(renamed);

        let lookup: BTreeMap<&str, &Vec<String>> = other.rows.iter().map(|(id, v)| (id.as_str(), v)).collect();
        let blank = vec![String::new(); other.columns.len()];
        for (id, values) in &mut self.rows {
            values.extend(lookup.get(id.as_str()).copied().unwrap_or(&blank).iter().cloned());
        }

        let known: BTreeSet<String> = self.rows.iter().map(|(id, _)| id.clone()).collect();
        for (id, values) in &other.rows {
            if known.contains(id) {
                continue;
            }
            let mut row = vec![String::new(); width];
            row.extend(values.iter().cloned());
            self.rows.push((id.clone(), row));
        }
        self
    }
}

/// Last status of each task for each entity.
///
/// Tasks that never ran yield an empty string; commas in outcomes become spaces.
pub fn compile_task_log(gdirs: &[GlacierDirectory], task_names: &[&str]) -> TaskLogTable {
    let mut table = TaskLogTable {
        columns: task_names.iter().map(|t| t.to_string()).collect(),
        rows: Vec::with_capacity(gdirs.len()),
    };
    for gdir in gdirs {
        let values = task_names
            .iter()
            .map(|task| match gdir.get_task_status(task) {
                Ok(status) => status.unwrap_or_default().replace(',', " "),
                Err(e) => {
                    warn!(entity = %gdir.id(), task = %task, error = %e, "Unreadable status log");
                    String::new()
                }
            })
            .collect();
        table.rows.push((gdir.id().to_string(), values));
    }
    table
}

/// `{working_dir}/task_log{filesuffix}.csv`
pub fn task_log_path(working_dir: &Path, filesuffix: &str) -> PathBuf {
    working_dir.join(format!("task_log{}.csv", filesuffix))
}

/// Write `table` to `path`, joined onto an existing file when `append`.
pub fn write_task_log(table: TaskLogTable, path: &Path, append: bool) -> Result<TaskLogTable, WorkflowError> {
    let out = if append && path.is_file() {
        let text = fs::read_to_string(path).map_err(|e| WorkflowError::io_context(path, "read", e))?;
        TaskLogTable::from_csv(&text)?.join(&table)
    } else {
        table
    };
    fs::write(path, out.to_csv()).map_err(|e| WorkflowError::io_context(path, "write", e))?;
    info!(path = %path.display(), entities = out.rows.len(), "Wrote task log");
    Ok(out)
}

/// Diagnostics values per entity; `None` marks missing data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagnosticsTable {
    pub keys: Vec<String>,
    pub rows: Vec<(String, Vec<Option<serde_json::Value>>)>,
}

/// Collect diagnostics values for `keys`, or for every key found when `keys` is empty.
///
/// Never creates diagnostics files.
pub fn compile_diagnostics(gdirs: &[GlacierDirectory], keys: &[&str]) -> DiagnosticsTable {
    let maps: Vec<(String, Option<serde_json::Map<String, serde_json::Value>>)> = gdirs
        .iter()
        .map(|gdir| (gdir.id().to_string(), read_diagnostics(gdir)))
        .collect();

    let keys: Vec<String> = if keys.is_empty() {
        let all: BTreeSet<&String> = maps.iter().filter_map(|(_, m)| m.as_ref()).flat_map(|m| m.keys()).collect();
        all.into_iter().cloned().collect()
    } else {
        keys.iter().map(|k| k.to_string()).collect()
    };

    let rows = maps
        .into_iter()
        .map(|(id, map)| {
            let values = keys
                .iter()
                .map(|k| map.as_ref().and_then(|m| m.get(k)).cloned())
                .collect();
            (id, values)
        })
        .collect();
    DiagnosticsTable { keys, rows }
}

fn read_diagnostics(gdir: &GlacierDirectory) -> Option<serde_json::Map<String, serde_json::Value>> {
    match gdir.has_file(DIAGNOSTICS, "") {
        Ok(true) => {}
        _ => return None,
    }
    match gdir.read_json(DIAGNOSTICS, "") {
        Ok(map) => Some(map),
        Err(e) => {
            warn!(entity = %gdir.id(), error = %e, "Unreadable diagnostics");
            None
        }
    }
}
