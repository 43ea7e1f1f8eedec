//! Integration tests for the task runner and status log

use crate::integration::test_utils::{init_glacier, init_glaciers, workspace};
use glacierdir::config::Params;
use glacierdir::status::{StatusRecord, SUCCESS};
use glacierdir::task::execute_entity_task;
use glacierdir::{EntityTask, GlobalTask, TaskError, TaskOptions, WorkflowError};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[test]
fn test_auto_skip_after_success() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(
        &dir,
        Params {
            auto_skip_task: true,
            ..Params::default()
        },
    );
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    let task = EntityTask::new("define_glacier_region").writes(["glacier_grid", "dem_source"]);
    let calls = AtomicUsize::new(0);
    let body = |g: &glacierdir::GlacierDirectory| -> anyhow::Result<usize> {
        g.write_text("SRTM", "dem_source", "")?;
        Ok(calls.fetch_add(1, Ordering::SeqCst))
    };

    assert_eq!(task.run(&gdir, &TaskOptions::default(), body).unwrap(), Some(0));
    assert_eq!(task.run(&gdir, &TaskOptions::default(), body).unwrap(), None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(gdir.status_log().records().unwrap().len(), 1);

    // forced re-run executes and appends a second record
    let forced = TaskOptions::default().with_reset(true);
    assert_eq!(task.run(&gdir, &forced, body).unwrap(), Some(1));
    let records = gdir.status_log().records().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(StatusRecord::is_success));
}

#[test]
fn test_default_policy_always_runs() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    let task = EntityTask::new("glacier_masks");
    for _ in 0..3 {
        let ran = task
            .run(&gdir, &TaskOptions::default().quiet(), |_| Ok::<_, anyhow::Error>(()))
            .unwrap();
        assert!(ran.is_some());
    }
    assert_eq!(gdir.status_log().records().unwrap().len(), 3);
}

#[test]
fn test_failed_task_runs_again() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(
        &dir,
        Params {
            auto_skip_task: true,
            continue_on_error: true,
            ..Params::default()
        },
    );
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    let task = EntityTask::new("compute_centerlines");

    let failed = task
        .run(&gdir, &TaskOptions::default(), |_| -> anyhow::Result<()> {
            anyhow::bail!("no ice, no lines")
        })
        .unwrap();
    assert_eq!(failed, None);

    let ran = task
        .run(&gdir, &TaskOptions::default(), |_| Ok::<_, anyhow::Error>(42))
        .unwrap();
    assert_eq!(ran, Some(42));
    assert_eq!(gdir.get_task_status("compute_centerlines").unwrap().as_deref(), Some(SUCCESS));
}

#[test]
fn test_filesuffix_is_part_of_task_name() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(
        &dir,
        Params {
            auto_skip_task: true,
            ..Params::default()
        },
    );
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    let task = EntityTask::new("run_random_climate");

    let options = TaskOptions::default().with_filesuffix("_seed1");
    task.run(&gdir, &options, |_| Ok::<_, anyhow::Error>(())).unwrap();

    assert_eq!(gdir.get_task_status("run_random_climate_seed1").unwrap().as_deref(), Some(SUCCESS));
    assert_eq!(gdir.get_task_status("run_random_climate").unwrap(), None);
    assert_eq!(gdir.get_task_status("run_random").unwrap(), None);

    let other = TaskOptions::default().with_filesuffix("_seed2");
    let ran = task.run(&gdir, &other, |_| Ok::<_, anyhow::Error>(2)).unwrap();
    assert_eq!(ran, Some(2));
}

#[test]
fn test_failure_isolation_under_continue_on_error() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(
        &dir,
        Params {
            continue_on_error: true,
            ..Params::default()
        },
    );
    let gdirs = init_glaciers(&ws, 3);
    let bad = gdirs[1].id().clone();
    let task = EntityTask::new("mass_balance");

    let results = execute_entity_task(&task, &gdirs, &TaskOptions::default(), |g| {
        if g.id() == &bad {
            Err(WorkflowError::NotAReferenceEntity(g.id().to_string()))
        } else {
            Ok(g.id().to_string())
        }
    })
    .unwrap();

    assert_eq!(results[0].as_deref(), Some("RGI60-11.00001"));
    assert_eq!(results[1], None);
    assert_eq!(results[2].as_deref(), Some("RGI60-11.00003"));

    let status = gdirs[1].get_task_status("mass_balance").unwrap().unwrap();
    assert!(status.starts_with("NotAReferenceEntityError: "));

    let mirror = ws.error_mirror();
    let mirrored = fs::read_to_string(mirror.path_for("RGI60-11.00002")).unwrap();
    assert!(mirrored.contains("; mass_balance; NotAReferenceEntityError; "));
    assert!(!mirror.path_for("RGI60-11.00001").exists());
    assert!(!mirror.path_for("RGI60-11.00003").exists());
}

#[test]
fn test_fail_fast_propagates_task_error() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    let task = EntityTask::new("local_t_star");

    let err = task
        .run(&gdir, &TaskOptions::default(), |g| -> Result<(), WorkflowError> {
            g.climate_info().map(|_| ())
        })
        .unwrap_err();

    match &err {
        TaskError::Failed { task, entity, class, error } => {
            assert_eq!(task, "local_t_star");
            assert_eq!(entity, "RGI50-11.00897");
            assert_eq!(class, "MissingPrerequisiteError");
            assert!(matches!(error, WorkflowError::MissingPrerequisite { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
    let status = gdir.get_task_status("local_t_star").unwrap().unwrap();
    assert!(status.starts_with("MissingPrerequisiteError: "));
    assert!(ws.error_mirror().path_for("RGI50-11.00897").exists());
}

#[test]
fn test_status_line_format_on_disk() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    let task = EntityTask::new("filter_inversion_output");
    task.run(&gdir, &TaskOptions::default(), |_| Ok::<_, anyhow::Error>(()))
        .unwrap();
    let _ = task.run(&gdir, &TaskOptions::default(), |_| -> anyhow::Result<()> {
        Err(anyhow::anyhow!("thickness\nnegative, somewhere; bad"))
    });

    let text = fs::read_to_string(gdir.dir().join("log.txt")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(";filter_inversion_output;SUCCESS"));
    assert!(lines[1].ends_with(";filter_inversion_output;Error: thickness negative, somewhere; bad"));
    let ts = lines[0].split(';').next().unwrap();
    assert!(chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S").is_ok());
}

#[test]
fn test_global_task_sees_all_entities() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdirs = init_glaciers(&ws, 4);
    let total = GlobalTask::new("compile_glacier_statistics").run(&gdirs, |all| {
        all.iter().map(|g| g.area_km2().unwrap()).sum::<f64>()
    });
    assert!((total - 4.0 * 8.036).abs() < 1e-9);
    assert!(gdirs.iter().all(|g| !g.status_log().path().exists()));
}
