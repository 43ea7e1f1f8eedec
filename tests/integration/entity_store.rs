//! Integration tests for the entity store

use crate::integration::test_utils::{attributes, init_glacier, workspace};
use glacierdir::basenames::{ArtifactFormat, Basename, BasenameRegistry};
use glacierdir::config::Params;
use glacierdir::entity::EntityId;
use glacierdir::store::{copy_to_basedir, CopySetup};
use glacierdir::{GlacierDirectory, Workspace, WorkflowError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Flowline {
    order: u32,
    heights: Vec<f64>,
    tributary: Option<String>,
}

fn flowlines() -> Vec<Flowline> {
    vec![
        Flowline {
            order: 0,
            heights: vec![3700.0, 3400.5, 2900.25],
            tributary: None,
        },
        Flowline {
            order: 1,
            heights: vec![3300.0, 3000.0],
            tributary: Some("east".to_string()),
        },
    ]
}

#[test]
fn test_same_id_maps_to_same_directory() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    gdir.write_text("SRTM", "dem_source", "").unwrap();

    let again = GlacierDirectory::create(Arc::clone(&ws), attributes("RGI50-11.00897")).unwrap();
    assert_eq!(again.dir(), gdir.dir());
    assert_eq!(again.read_text("dem_source", "").unwrap(), "SRTM");
    assert_eq!(
        gdir.dir(),
        dir.path()
            .join("per_glacier")
            .join("RGI50-11")
            .join("RGI50-11.00")
            .join("RGI50-11.00897")
    );
}

#[test]
fn test_reset_creation_clears_directory() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    gdir.write_text("SRTM", "dem_source", "").unwrap();

    let fresh =
        GlacierDirectory::create_in(Arc::clone(&ws), attributes("RGI50-11.00897"), &ws.base_dir(), true).unwrap();
    assert!(fresh.dir().is_dir());
    assert!(!fresh.has_file("dem_source", "").unwrap());
}

#[test]
fn test_invalid_entities_are_rejected() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());

    assert!(EntityId::new("RGI50-11").is_err());
    assert!(EntityId::new("RGI50-11.0/897").is_err());

    let err = GlacierDirectory::create(Arc::clone(&ws), attributes("RGI40-11.00897")).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidEntity(_)));

    let mut bad_code = attributes("RGI50-11.00897");
    bad_code.term_type = "7".to_string();
    assert!(matches!(
        GlacierDirectory::create(ws, bad_code),
        Err(WorkflowError::InvalidEntity(_))
    ));
}

#[test]
fn test_round_trip_preserves_values() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");

    gdir.write_pickle(&flowlines(), "inversion_flowlines", "", None).unwrap();
    let back: Vec<Flowline> = gdir.read_pickle("inversion_flowlines", "", None).unwrap();
    assert_eq!(back, flowlines());

    gdir.write_pickle(&flowlines(), "inversion_flowlines", "_run1", Some(false)).unwrap();
    let back: Vec<Flowline> = gdir.read_pickle("inversion_flowlines", "_run1", Some(false)).unwrap();
    assert_eq!(back, flowlines());
    assert!(gdir.dir().join("inversion_flowlines_run1.pkl").is_file());

    gdir.write_json(&serde_json::json!({"mu_star": 185.2, "bias": -3.1}), "local_mustar", "").unwrap();
    let mustar: serde_json::Value = gdir.read_json("local_mustar", "").unwrap();
    assert_eq!(mustar["mu_star"], 185.2);
}

#[test]
fn test_archival_packaging_is_transparent() {
    let outlines_for = |params: Params| {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir, params);
        let gdir = init_glacier(&ws, "RGI50-11.00897");
        let collection = gdir.read_shapefile("outlines", "").unwrap();
        let files: Vec<String> = fs::read_dir(gdir.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        (collection, files)
    };

    let (loose, loose_files) = outlines_for(Params {
        use_tar_shapefiles: false,
        ..Params::default()
    });
    let (tarred, tar_files) = outlines_for(Params {
        use_compression: false,
        ..Params::default()
    });
    let (gzipped, gz_files) = outlines_for(Params::default());

    assert_eq!(loose, tarred);
    assert_eq!(loose, gzipped);
    assert!(loose_files.iter().any(|f| f == "outlines.shp"));
    assert_eq!(tar_files, vec!["outlines.tar"]);
    assert_eq!(gz_files, vec!["outlines.tar.gz"]);
}

#[test]
fn test_rewriting_shapefile_replaces_archive() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");

    let mut collection = gdir.read_shapefile("outlines", "").unwrap();
    collection.crs = None;
    gdir.write_shapefile(&collection, "outlines", "").unwrap();

    assert_eq!(gdir.read_shapefile("outlines", "").unwrap(), collection);
    let entries = fs::read_dir(gdir.dir()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn test_unknown_key_is_rejected_without_side_effect() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    let before = fs::read_dir(gdir.dir()).unwrap().count();

    assert!(matches!(
        gdir.write_text("x", "not_registered", ""),
        Err(WorkflowError::UnknownKey(_))
    ));
    assert!(matches!(
        gdir.read_pickle::<Vec<u8>>("not_registered", "", None),
        Err(WorkflowError::UnknownKey(_))
    ));
    assert!(matches!(gdir.has_file("not_registered", ""), Err(WorkflowError::UnknownKey(_))));
    assert_eq!(fs::read_dir(gdir.dir()).unwrap().count(), before);
}

#[test]
fn test_malformed_basenames_never_enter_registry() {
    let mut registry = BasenameRegistry::default();
    let err = registry
        .insert("archive", Basename::new("archive.tar.gz", ArtifactFormat::Pickle, "Packed data"))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MalformedBasename { .. }));
    assert!(registry
        .insert("no_ext", Basename::new("noext", ArtifactFormat::Text, ""))
        .is_err());

    registry
        .insert("my_output", Basename::new("my_output.json", ArtifactFormat::Json, "Custom output"))
        .unwrap();
    let dir = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path()).with_basenames(registry).shared();
    let gdir = GlacierDirectory::create(ws, attributes("RGI60-11.00897")).unwrap();
    gdir.write_json(&[1, 2, 3], "my_output", "").unwrap();
    assert!(gdir.dir().join("my_output.json").is_file());
}

#[test]
fn test_lazy_attributes() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = GlacierDirectory::create(Arc::clone(&ws), attributes("RGI50-11.00897")).unwrap();

    match gdir.grid() {
        Err(WorkflowError::MissingPrerequisite { artifact, .. }) => {
            assert_eq!(artifact, gdir.dir().join("glacier_grid.json"))
        }
        other => panic!("expected missing prerequisite, got {:?}", other),
    }

    let gdir = init_glacier(&ws, "RGI50-11.00897");
    assert_eq!(gdir.area_km2().unwrap(), 8.036);
    assert!((gdir.area_m2().unwrap() - 8.036e6).abs() < 1e-3);

    // memoized for the handle's lifetime
    let mut shrunk = gdir.read_shapefile("outlines", "").unwrap();
    shrunk.features[0]
        .properties
        .insert("Area".to_string(), serde_json::json!(1.0));
    gdir.write_shapefile(&shrunk, "outlines", "").unwrap();
    assert_eq!(gdir.area_km2().unwrap(), 8.036);
    let reopened = GlacierDirectory::open(ws, "RGI50-11.00897").unwrap();
    assert_eq!(reopened.area_km2().unwrap(), 1.0);
}

#[test]
fn test_classification_and_summary() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let mut attrs = attributes("RGI60-01.10689");
    attrs.o1_region = "1".to_string();
    attrs.o2_region = "5".to_string();
    attrs.term_type = "1".to_string();
    attrs.cen_lat = 60.1;
    let gdir = GlacierDirectory::create(ws, attrs).unwrap();

    assert!(gdir.is_tidewater());
    assert!(!gdir.is_icecap());
    assert_eq!(gdir.classification().subregion, "01-05");
    let summary = gdir.summary();
    assert!(summary.contains("RGI id: RGI60-01.10689"));
    assert!(summary.contains("Terminus type: Marine-terminating"));
}

#[test]
fn test_copy_inversion_setup() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    let gdir = init_glacier(&ws, "RGI50-11.00897");
    gdir.write_pickle(&flowlines(), "inversion_flowlines", "", None).unwrap();
    gdir.write_pickle(&flowlines(), "model_flowlines", "", None).unwrap();
    gdir.log("compute_centerlines", None).unwrap();
    fs::write(gdir.get_filepath("gridded_data", "").unwrap(), b"nc").unwrap();
    fs::create_dir_all(gdir.dir().join("divides")).unwrap();
    fs::write(gdir.dir().join("divides").join("outlines.shp"), b"x").unwrap();

    let copy = copy_to_basedir(&gdir, &dir.path().join("inversion_base"), CopySetup::Inversion).unwrap();
    assert!(copy.has_file("inversion_flowlines", "").unwrap());
    assert!(copy.has_file("gridded_data", "").unwrap());
    assert!(!copy.dir().join("divides").exists());
    assert!(copy.has_file("outlines", "").unwrap());
    assert!(!copy.has_file("model_flowlines", "").unwrap());
    assert!(!copy.status_log().path().exists());

    let all = copy_to_basedir(&gdir, &dir.path().join("all_base"), CopySetup::All).unwrap();
    assert!(all.has_file("model_flowlines", "").unwrap());
    assert!(all.has_file("gridded_data", "").unwrap());
    assert!(all.dir().join("divides").join("outlines.shp").is_file());
    assert_eq!(all.get_task_status("compute_centerlines").unwrap().as_deref(), Some("SUCCESS"));
}

#[test]
fn test_open_requires_outlines() {
    let dir = TempDir::new().unwrap();
    let ws = workspace(&dir, Params::default());
    GlacierDirectory::create(Arc::clone(&ws), attributes("RGI50-11.00897")).unwrap();
    assert!(matches!(
        GlacierDirectory::open(Arc::clone(&ws), "RGI50-11.00897"),
        Err(WorkflowError::MissingPrerequisite { .. })
    ));
    assert!(matches!(
        GlacierDirectory::open(ws, "RGI50-11.00001"),
        Err(WorkflowError::InvalidEntity(_))
    ));
}
