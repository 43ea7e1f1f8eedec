//! CLI presentation: table rendering of domain results.

use crate::aggregate::TaskLogTable;
use crate::basenames::BasenameRegistry;
use crate::config::Params;
use crate::status::StatusRecord;
use comfy_table::{presets::UTF8_FULL, Table};
use std::path::Path;

fn table_with_header(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    table
}

pub fn format_status_records(id: &str, records: &[StatusRecord]) -> String {
    if records.is_empty() {
        return format!("{}: no task has run yet", id);
    }
    let mut table = table_with_header(vec!["Time", "Task", "Outcome"]);
    for record in records {
        table.add_row(vec![&record.timestamp, &record.task_name, &record.outcome]);
    }
    format!("{}\n{}", id, table)
}

pub fn format_last_statuses(id: &str, statuses: &[(String, Option<String>)]) -> String {
    let mut table = table_with_header(vec!["Task", "Last outcome"]);
    for (task, status) in statuses {
        table.add_row(vec![task.as_str(), status.as_deref().unwrap_or("-")]);
    }
    format!("{}\n{}", id, table)
}

pub fn format_task_log(table_data: &TaskLogTable, path: &Path) -> String {
    let mut header = vec!["rgi_id"];
    header.extend(table_data.columns.iter().map(String::as_str));
    let mut table = table_with_header(header);
    for (id, values) in &table_data.rows {
        let mut row = vec![id.as_str()];
        row.extend(values.iter().map(String::as_str));
        table.add_row(row);
    }
    format!("{}\nWritten to {}", table, path.display())
}

pub fn format_diagnostics(id: &str, diagnostics: &serde_json::Map<String, serde_json::Value>) -> String {
    if diagnostics.is_empty() {
        return format!("{}: no diagnostics", id);
    }
    let mut table = table_with_header(vec!["Key", "Value"]);
    for (key, value) in diagnostics {
        table.add_row(vec![key.clone(), value.to_string()]);
    }
    format!("{}\n{}", id, table)
}

pub fn format_info(working_dir: &Path, entities: usize, params: &Params, registry: &BasenameRegistry) -> String {
    let mut out = String::new();
    out.push_str(&format!("Working directory: {}\n", working_dir.display()));
    out.push_str(&format!("Glacier directories: {}\n", entities));
    out.push_str(&format!(
        "Params: auto_skip_task={} continue_on_error={} use_compression={} use_tar_shapefiles={} lru_maxsize={} mp_processes={}\n",
        params.auto_skip_task,
        params.continue_on_error,
        params.use_compression,
        params.use_tar_shapefiles,
        params.lru_maxsize,
        params.mp_processes
    ));

    let mut table = table_with_header(vec!["Key", "File", "Format", "Description"]);
    for key in registry.keys() {
        if let Ok(basename) = registry.get(key) {
            table.add_row(vec![
                key.to_string(),
                basename.file_name.clone(),
                basename.format.to_string(),
                basename.doc.clone(),
            ]);
        }
    }
    out.push_str(&table.to_string());
    out
}
