//! Integration tests for CLI command routing

use crate::integration::test_utils::{init_glaciers, with_env, workspace};
use glacierdir::cli::{Commands, RunContext};
use glacierdir::config::Params;
use glacierdir::status::TaskFailure;
use tempfile::TempDir;

fn context(dir: &TempDir) -> RunContext {
    with_env(&[], || RunContext::new(dir.path().to_path_buf(), None).unwrap())
}

#[test]
fn test_status_command() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 1);
    gdirs[0].log("define_glacier_region", None).unwrap();
    gdirs[0]
        .log("compute_centerlines", Some(&TaskFailure::new("ValueError", "no lines")))
        .unwrap();

    let ctx = context(&dir);
    let all = ctx
        .execute(&Commands::Status {
            id: "RGI60-11.00001".to_string(),
            tasks: vec![],
        })
        .unwrap();
    assert!(all.contains("define_glacier_region"));
    assert!(all.contains("ValueError: no lines"));

    let selected = ctx
        .execute(&Commands::Status {
            id: "RGI60-11.00001".to_string(),
            tasks: vec!["glacier_masks".to_string()],
        })
        .unwrap();
    assert!(selected.contains("glacier_masks"));
    assert!(!selected.contains("define_glacier_region"));
}

#[test]
fn test_task_log_command_writes_csv() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 2);
    gdirs[1].log("glacier_masks", None).unwrap();

    let ctx = context(&dir);
    let output = ctx
        .execute(&Commands::TaskLog {
            tasks: vec!["glacier_masks".to_string()],
            filesuffix: String::new(),
            no_append: true,
        })
        .unwrap();
    assert!(output.contains("RGI60-11.00002"));
    let csv = std::fs::read_to_string(dir.path().join("task_log.csv")).unwrap();
    assert_eq!(csv, "rgi_id,glacier_masks\nRGI60-11.00001,\nRGI60-11.00002,SUCCESS\n");
}

#[test]
fn test_diagnostics_and_info_commands() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 2);
    gdirs[0].add_to_diagnostics("dem_source", "SRTM").unwrap();

    let ctx = context(&dir);
    let diag = ctx
        .execute(&Commands::Diagnostics {
            id: "RGI60-11.00001".to_string(),
        })
        .unwrap();
    assert!(diag.contains("dem_source"));
    assert!(diag.contains("\"SRTM\""));

    let info = ctx.execute(&Commands::Info).unwrap();
    assert!(info.contains("Glacier directories: 2"));
    assert!(info.contains("outlines.shp"));

    let summary = ctx
        .execute(&Commands::Summary {
            id: "RGI60-11.00002".to_string(),
        })
        .unwrap();
    assert!(summary.contains("Area: 8.036 km2"));
}

#[test]
fn test_unknown_glacier_is_an_error() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    assert!(ctx
        .execute(&Commands::Summary {
            id: "RGI60-11.99999".to_string(),
        })
        .is_err());
}
