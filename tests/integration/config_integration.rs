//! Integration tests for the configuration system

use crate::integration::test_utils::with_env;
use glacierdir::basenames::ArtifactFormat;
use glacierdir::config::ConfigLoader;
use glacierdir::{GlacierDirectory, Workspace, WorkflowError};
use std::fs;
use tempfile::TempDir;

fn write_workspace_config(dir: &TempDir, name: &str, content: &str) {
    let config_dir = dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join(name), content).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let dir = TempDir::new().unwrap();
    let config = with_env(&[], || ConfigLoader::load(dir.path()).unwrap());
    assert_eq!(config.working_dir.as_deref(), Some(dir.path()));
    assert!(!config.params.auto_skip_task);
    assert!(config.params.use_tar_shapefiles);
    assert_eq!(config.params.mp_processes, 1);
}

#[test]
fn test_workspace_file_and_env_precedence() {
    let dir = TempDir::new().unwrap();
    write_workspace_config(
        &dir,
        "config.toml",
        r#"
[params]
auto_skip_task = true
continue_on_error = false
mp_processes = 2

[basenames.velocity]
file_name = "velocity.nc"
format = "netcdf"
doc = "Surface velocity on the glacier grid"
"#,
    );
    write_workspace_config(&dir, "production.toml", "[params]\ncontinue_on_error = true\n");

    let config = with_env(
        &[
            ("GLACIERDIR_ENV", "production"),
            ("GLACIERDIR__PARAMS__MP_PROCESSES", "8"),
        ],
        || ConfigLoader::load(dir.path()).unwrap(),
    );
    assert!(config.params.auto_skip_task);
    assert!(config.params.continue_on_error);
    assert_eq!(config.params.mp_processes, 8);

    let ws = Workspace::from_config(&config).unwrap();
    assert_eq!(ws.basenames().get("velocity").unwrap().format, ArtifactFormat::Netcdf);
    assert_eq!(ws.working_dir(), dir.path());
}

#[test]
fn test_user_config_file_is_layered_below_workspace() {
    let dir = TempDir::new().unwrap();
    write_workspace_config(&dir, "config.toml", "[params]\nuse_compression = false\n");

    let config = with_env(&[], || {
        let home = std::env::var("XDG_CONFIG_HOME").unwrap();
        let user_dir = std::path::Path::new(&home).join("glacierdir");
        fs::create_dir_all(&user_dir).unwrap();
        fs::write(
            user_dir.join("config.toml"),
            "[params]\nuse_compression = true\nlru_maxsize = 7\n",
        )
        .unwrap();
        ConfigLoader::load(dir.path()).unwrap()
    });
    assert!(!config.params.use_compression);
    assert_eq!(config.params.lru_maxsize, 7);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_workspace_config(
        &dir,
        "config.toml",
        r#"
[params]
mp_processes = 0

[basenames.broken]
file_name = "broken.tar.gz"
format = "pickle"
"#,
    );
    let err = with_env(&[], || ConfigLoader::load(dir.path()).unwrap_err());
    match err {
        WorkflowError::Config(msg) => {
            assert!(msg.contains("mp_processes"));
            assert!(msg.contains("broken"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_configured_workspace_drives_store() {
    let dir = TempDir::new().unwrap();
    write_workspace_config(&dir, "config.toml", "[params]\nuse_tar_shapefiles = false\n");
    let config = with_env(&[], || ConfigLoader::load(dir.path()).unwrap());
    let ws = Workspace::from_config(&config).unwrap().shared();

    let gdir = GlacierDirectory::create(ws, crate::integration::test_utils::attributes("RGI60-11.00897")).unwrap();
    let outlines = gdir.attributes().to_feature_collection(None, None).unwrap();
    gdir.write_shapefile(&outlines, "outlines", "").unwrap();
    assert!(gdir.dir().join("outlines.shp").is_file());
    assert!(!gdir.dir().join("outlines.tar.gz").exists());
}
