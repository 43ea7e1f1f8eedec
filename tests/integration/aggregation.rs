//! Integration tests for aggregation over many glacier directories

use crate::integration::test_utils::{init_glaciers, workspace};
use glacierdir::aggregate::{compile_diagnostics, compile_task_log, task_log_path, write_task_log, TaskLogTable};
use glacierdir::config::Params;
use glacierdir::status::TaskFailure;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_compile_task_log() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 3);

    gdirs[0].log("define_glacier_region", None).unwrap();
    gdirs[1]
        .log(
            "define_glacier_region",
            Some(&TaskFailure::new("ValueError", "dem missing, try again")),
        )
        .unwrap();

    let table = compile_task_log(&gdirs, &["define_glacier_region", "glacier_masks"]);
    assert_eq!(table.get("RGI60-11.00001", "define_glacier_region"), Some("SUCCESS"));
    assert_eq!(
        table.get("RGI60-11.00002", "define_glacier_region"),
        Some("ValueError: dem missing  try again")
    );
    assert_eq!(table.get("RGI60-11.00003", "define_glacier_region"), Some(""));
    assert_eq!(table.get("RGI60-11.00001", "glacier_masks"), Some(""));
}

#[test]
fn test_write_task_log_appends_with_suffixed_columns() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 2);
    let path = task_log_path(ws.working_dir(), "_test");
    assert_eq!(path, dir.path().join("task_log_test.csv"));

    gdirs[0].log("glacier_masks", None).unwrap();
    write_task_log(compile_task_log(&gdirs, &["glacier_masks"]), &path, true).unwrap();

    gdirs[1].log("glacier_masks", None).unwrap();
    let joined = write_task_log(compile_task_log(&gdirs, &["glacier_masks"]), &path, true).unwrap();
    assert_eq!(joined.columns, vec!["glacier_masks", "glacier_masks_n"]);
    assert_eq!(joined.get("RGI60-11.00002", "glacier_masks"), Some(""));
    assert_eq!(joined.get("RGI60-11.00002", "glacier_masks_n"), Some("SUCCESS"));

    let on_disk = TaskLogTable::from_csv(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk, joined);

    let replaced = write_task_log(compile_task_log(&gdirs, &["glacier_masks"]), &path, false).unwrap();
    assert_eq!(replaced.columns, vec!["glacier_masks"]);
    assert!(fs::read_to_string(&path).unwrap().starts_with("rgi_id,glacier_masks\n"));
}

#[test]
fn test_compile_diagnostics_tolerates_missing_data() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 3);

    gdirs[0].add_to_diagnostics("dem_source", "SRTM").unwrap();
    gdirs[0].add_to_diagnostics("n_orig_centerlines", 4).unwrap();
    gdirs[1].add_to_diagnostics("dem_source", "GIMP").unwrap();
    fs::write(gdirs[2].get_filepath("diagnostics", "").unwrap(), "{not json").unwrap();

    let table = compile_diagnostics(&gdirs, &[]);
    assert_eq!(table.keys, vec!["dem_source", "n_orig_centerlines"]);
    assert_eq!(table.rows[0].1, vec![Some(json!("SRTM")), Some(json!(4))]);
    assert_eq!(table.rows[1].1, vec![Some(json!("GIMP")), None]);
    assert_eq!(table.rows[2].1, vec![None, None]);

    let only = compile_diagnostics(&gdirs[1..], &["n_orig_centerlines"]);
    assert_eq!(only.rows[0].1, vec![None]);
}

#[test]
fn test_aggregation_does_not_create_files() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 1);
    compile_diagnostics(&gdirs, &["dem_source"]);
    compile_task_log(&gdirs, &["anything"]);
    assert!(!gdirs[0].has_file("diagnostics", "").unwrap());
    assert!(!gdirs[0].status_log().path().exists());
}

#[test]
fn test_task_names_with_commas_keep_their_column() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 1);
    gdirs[0].log("run,v2", None).unwrap();

    let path = task_log_path(ws.working_dir(), "");
    write_task_log(compile_task_log(&gdirs, &["run,v2"]), &path, false).unwrap();
    let back = TaskLogTable::from_csv(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(back.columns, vec!["run,v2"]);
    assert_eq!(back.get("RGI60-11.00001", "run,v2"), Some("SUCCESS"));
}
