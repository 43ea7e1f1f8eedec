//! Entity store
//!
//! A [`GlacierDirectory`] is a handle on the directory of one glacier:
//! `{base}/{id[..8]}/{id[..11]}/{id}/`. Every file in it is addressed by a
//! basename key from the registry plus an optional suffix, and read or
//! written through the typed operations of the key's format.

mod codec;
pub mod copy;
pub mod gridded;
pub mod reference;
pub mod shapefile;

pub use copy::{copy_to_basedir, CopySetup};

use crate::basenames::{ArtifactFormat, Basename};
use crate::entity::{filter_name, Classification, EntityAttributes, EntityId};
use crate::error::WorkflowError;
use crate::status::{StatusLog, TaskFailure};
use crate::workspace::Workspace;
use gridded::{GriddedDataset, Grid, Projector};
use reference::{ClimateInfo, MassBalanceProfile, ReferenceCatalog, YearTable, ANNUAL_BALANCE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shapefile::FeatureCollection;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Key of the outlines artifact, written at creation and read on reopen
pub const OUTLINES: &str = "outlines";
/// Key of the georeferencing grid artifact
pub const GLACIER_GRID: &str = "glacier_grid";
/// Key of the diagnostics artifact
pub const DIAGNOSTICS: &str = "diagnostics";
/// Key of the climate baseline artifact
pub const CLIMATE_INFO: &str = "climate_info";

/// Handle on one glacier's directory
///
/// The handle does not own the directory: several handles may point at the
/// same one. Lazily computed attributes are memoized per handle.
#[derive(Debug, Clone)]
pub struct GlacierDirectory {
    workspace: Arc<Workspace>,
    attrs: EntityAttributes,
    classification: Classification,
    name: String,
    base_dir: PathBuf,
    dir: PathBuf,
    status_log: StatusLog,
    grid: OnceLock<Grid>,
    area_km2: OnceLock<f64>,
    ref_mb: OnceLock<YearTable>,
    ref_profile: OnceLock<Option<MassBalanceProfile>>,
}

impl GlacierDirectory {
    /// Create (or reuse) the directory for `attrs` under the workspace's base.
    pub fn create(workspace: Arc<Workspace>, attrs: EntityAttributes) -> Result<Self, WorkflowError> {
        let base_dir = workspace.base_dir();
        Self::create_in(workspace, attrs, &base_dir, false)
    }

    /// Create the directory for `attrs` under `base_dir`.
    ///
    /// Creation is idempotent; with `reset` any existing content is removed
    /// first.
    pub fn create_in(
        workspace: Arc<Workspace>,
        attrs: EntityAttributes,
        base_dir: &Path,
        reset: bool,
    ) -> Result<Self, WorkflowError> {
        let handle = Self::from_attributes(workspace, attrs, base_dir)?;
        if reset && handle.dir.exists() {
            fs::remove_dir_all(&handle.dir).map_err(|e| WorkflowError::io_context(&handle.dir, "reset", e))?;
        }
        fs::create_dir_all(&handle.dir).map_err(|e| WorkflowError::io_context(&handle.dir, "create", e))?;
        debug!(entity = %handle.id(), dir = %handle.dir.display(), "Glacier directory ready");
        Ok(handle)
    }

    /// Reopen an existing directory from its `outlines` artifact.
    pub fn open(workspace: Arc<Workspace>, id: &str) -> Result<Self, WorkflowError> {
        let base_dir = workspace.base_dir();
        Self::open_in(workspace, id, &base_dir)
    }

    pub fn open_in(workspace: Arc<Workspace>, id: &str, base_dir: &Path) -> Result<Self, WorkflowError> {
        let id = EntityId::new(id)?;
        let dir = id.dir_under(base_dir);
        if !dir.is_dir() {
            return Err(WorkflowError::InvalidEntity(format!(
                "no glacier directory for {} under {:?}",
                id, base_dir
            )));
        }
        let outlines = resolve_in(&workspace, &dir, OUTLINES, "", Some(ArtifactFormat::Shapefile))?;
        if !artifact_exists(&workspace, &outlines, ArtifactFormat::Shapefile) {
            return Err(WorkflowError::MissingPrerequisite {
                attribute: "attributes".to_string(),
                artifact: outlines,
                hint: "the directory was never initialized with outlines".to_string(),
            });
        }
        let collection = read_shapefile_at(&workspace, &outlines)?;
        let attrs = EntityAttributes::from_feature_collection(&collection)?;
        if attrs.rgi_id != id {
            return Err(WorkflowError::InvalidEntity(format!(
                "outlines in {:?} belong to {}",
                dir, attrs.rgi_id
            )));
        }
        Self::from_attributes(workspace, attrs, base_dir)
    }

    fn from_attributes(
        workspace: Arc<Workspace>,
        attrs: EntityAttributes,
        base_dir: &Path,
    ) -> Result<Self, WorkflowError> {
        attrs.rgi_id.check_version()?;
        let classification = Classification::decode(&attrs)?;
        let name = attrs.name.as_deref().map(filter_name).unwrap_or_default();
        let dir = attrs.rgi_id.dir_under(base_dir);
        Ok(Self {
            status_log: StatusLog::in_dir(&dir),
            workspace,
            attrs,
            classification,
            name,
            base_dir: base_dir.to_path_buf(),
            dir,
            grid: OnceLock::new(),
            area_km2: OnceLock::new(),
            ref_mb: OnceLock::new(),
            ref_profile: OnceLock::new(),
        })
    }

    pub fn id(&self) -> &EntityId {
        &self.attrs.rgi_id
    }

    pub fn attributes(&self) -> &EntityAttributes {
        &self.attrs
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Inventory name, cleaned of control characters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn cenlon(&self) -> f64 {
        self.attrs.cen_lon
    }

    pub fn cenlat(&self) -> f64 {
        self.attrs.cen_lat
    }

    pub fn is_tidewater(&self) -> bool {
        self.classification.is_tidewater()
    }

    pub fn is_nominal(&self) -> bool {
        self.classification.is_nominal()
    }

    pub fn is_icecap(&self) -> bool {
        self.classification.is_icecap()
    }

    // Paths

    /// Path of the artifact `key` with `suffix` spliced before the extension.
    pub fn get_filepath(&self, key: &str, suffix: &str) -> Result<PathBuf, WorkflowError> {
        resolve_in(&self.workspace, &self.dir, key, suffix, None)
    }

    /// Like [`get_filepath`](Self::get_filepath), deleting any existing file first.
    pub fn get_filepath_delete(&self, key: &str, suffix: &str) -> Result<PathBuf, WorkflowError> {
        let path = self.get_filepath(key, suffix)?;
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| WorkflowError::io_context(&path, "remove", e))?;
        }
        Ok(path)
    }

    /// Whether the artifact exists; archived shapefiles are looked up as archives.
    pub fn has_file(&self, key: &str, suffix: &str) -> Result<bool, WorkflowError> {
        let basename = self.workspace.basenames().get(key)?;
        let path = self.get_filepath(key, suffix)?;
        Ok(artifact_exists(&self.workspace, &path, basename.format))
    }

    fn typed_path(&self, key: &str, suffix: &str, format: ArtifactFormat) -> Result<PathBuf, WorkflowError> {
        resolve_in(&self.workspace, &self.dir, key, suffix, Some(format))
    }

    // Typed I/O

    /// Read a binary-serialized object; `use_compression` overrides the workspace default.
    pub fn read_pickle<T: DeserializeOwned>(
        &self,
        key: &str,
        suffix: &str,
        use_compression: Option<bool>,
    ) -> Result<T, WorkflowError> {
        let path = self.typed_path(key, suffix, ArtifactFormat::Pickle)?;
        codec::read_pickle(&path, self.compression(use_compression))
    }

    pub fn write_pickle<T: Serialize + ?Sized>(
        &self,
        value: &T,
        key: &str,
        suffix: &str,
        use_compression: Option<bool>,
    ) -> Result<(), WorkflowError> {
        let path = self.typed_path(key, suffix, ArtifactFormat::Pickle)?;
        codec::write_pickle(&path, value, self.compression(use_compression))
    }

    fn compression(&self, use_compression: Option<bool>) -> bool {
        use_compression.unwrap_or(self.workspace.params().use_compression)
    }

    pub fn read_json<T: DeserializeOwned>(&self, key: &str, suffix: &str) -> Result<T, WorkflowError> {
        codec::read_json(&self.typed_path(key, suffix, ArtifactFormat::Json)?)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T, key: &str, suffix: &str) -> Result<(), WorkflowError> {
        codec::write_json(&self.typed_path(key, suffix, ArtifactFormat::Json)?, value)
    }

    pub fn read_text(&self, key: &str, suffix: &str) -> Result<String, WorkflowError> {
        codec::read_text(&self.typed_path(key, suffix, ArtifactFormat::Text)?)
    }

    pub fn write_text(&self, text: &str, key: &str, suffix: &str) -> Result<(), WorkflowError> {
        codec::write_text(&self.typed_path(key, suffix, ArtifactFormat::Text)?, text)
    }

    pub fn read_shapefile(&self, key: &str, suffix: &str) -> Result<FeatureCollection, WorkflowError> {
        let path = self.typed_path(key, suffix, ArtifactFormat::Shapefile)?;
        read_shapefile_at(&self.workspace, &path)
    }

    /// Write a vector dataset.
    ///
    /// With archival packaging the previous archives are removed, the loose
    /// component set is written, packed into one archive and deleted.
    pub fn write_shapefile(&self, collection: &FeatureCollection, key: &str, suffix: &str) -> Result<(), WorkflowError> {
        let path = self.typed_path(key, suffix, ArtifactFormat::Shapefile)?;
        let components = self.workspace.codec().encode(collection)?;

        remove_files(&shapefile::loose_siblings(&path)?)?;
        if !self.workspace.params().use_tar_shapefiles {
            shapefile::write_loose(&path, &components)?;
            return Ok(());
        }

        for compressed in [false, true] {
            let archive = shapefile::archive_path(&path, compressed);
            if archive.exists() {
                fs::remove_file(&archive).map_err(|e| WorkflowError::io_context(&archive, "remove", e))?;
            }
        }
        shapefile::write_loose(&path, &components)?;
        let files = shapefile::loose_siblings(&path)?;
        let compressed = self.workspace.params().use_compression;
        shapefile::pack(&shapefile::archive_path(&path, compressed), &files, compressed)?;
        remove_files(&files)
    }

    /// Empty gridded dataset over this glacier's grid, to be filled and saved.
    ///
    /// Any existing file for `key` is removed.
    pub fn create_grid_template(&self, key: &str, projector: &dyn Projector) -> Result<GriddedDataset, WorkflowError> {
        let grid = self.grid()?;
        let path = self.typed_path(key, "", ArtifactFormat::Netcdf)?;
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| WorkflowError::io_context(&path, "remove", e))?;
        }
        Ok(GriddedDataset::template(path, grid, projector))
    }

    pub fn read_gridded(&self, key: &str, suffix: &str) -> Result<GriddedDataset, WorkflowError> {
        GriddedDataset::load(&self.typed_path(key, suffix, ArtifactFormat::Netcdf)?)
    }

    // Lazy attributes

    /// Georeferencing grid, read once from the `glacier_grid` artifact.
    pub fn grid(&self) -> Result<&Grid, WorkflowError> {
        if let Some(grid) = self.grid.get() {
            return Ok(grid);
        }
        self.require(GLACIER_GRID, "grid", "run the task defining the glacier region first")?;
        let grid: Grid = self.read_json(GLACIER_GRID, "")?;
        Ok(self.grid.get_or_init(|| grid))
    }

    /// Glacier area in km2, rounded to three decimals.
    pub fn area_km2(&self) -> Result<f64, WorkflowError> {
        if let Some(area) = self.area_km2.get() {
            return Ok(*area);
        }
        self.require(OUTLINES, "area_km2", "write the outlines first")?;
        let outlines = self.read_shapefile(OUTLINES, "")?;
        let area = outlines
            .first_f64("Area")
            .ok_or_else(|| WorkflowError::Serialization("outlines carry no numeric Area property".to_string()))?;
        Ok(*self.area_km2.get_or_init(|| (area * 1000.0).round() / 1000.0))
    }

    pub fn area_m2(&self) -> Result<f64, WorkflowError> {
        Ok(self.area_km2()? * 1e6)
    }

    fn require(&self, key: &str, attribute: &str, hint: &str) -> Result<(), WorkflowError> {
        if self.has_file(key, "")? {
            return Ok(());
        }
        Err(WorkflowError::MissingPrerequisite {
            attribute: attribute.to_string(),
            artifact: self.get_filepath(key, "")?,
            hint: hint.to_string(),
        })
    }

    // Diagnostics

    /// Diagnostics map, created empty on first access.
    ///
    /// Read-modify-write is not locked: concurrent writers on the same
    /// directory may lose updates.
    pub fn get_diagnostics(&self) -> Result<serde_json::Map<String, serde_json::Value>, WorkflowError> {
        if !self.has_file(DIAGNOSTICS, "")? {
            let empty = serde_json::Map::new();
            self.write_json(&empty, DIAGNOSTICS, "")?;
            return Ok(empty);
        }
        self.read_json(DIAGNOSTICS, "")
    }

    pub fn add_to_diagnostics<V: Serialize>(&self, key: &str, value: V) -> Result<(), WorkflowError> {
        let mut diagnostics = self.get_diagnostics()?;
        diagnostics.insert(key.to_string(), serde_json::to_value(value)?);
        self.write_json(&diagnostics, DIAGNOSTICS, "")
    }

    // Reference data

    pub fn climate_info(&self) -> Result<ClimateInfo, WorkflowError> {
        self.require(CLIMATE_INFO, "climate_info", "process the climate data first")?;
        self.read_json(CLIMATE_INFO, "")
    }

    /// Reference mass-balance series within the baseline hydrological years.
    pub fn get_ref_mb_data(&self, catalog: &ReferenceCatalog) -> Result<YearTable, WorkflowError> {
        let table = match self.ref_mb.get() {
            Some(table) => table,
            None => {
                let series = catalog.load_mb_series(catalog.wgms_id(self.id())?)?;
                self.ref_mb.get_or_init(|| series)
            }
        };
        let info = self.climate_info()?;
        Ok(table
            .clone()
            .period(info.baseline_hydro_yr_0, info.baseline_hydro_yr_1)
            .drop_missing(ANNUAL_BALANCE))
    }

    /// Reference mass-balance profile, `None` when none was measured.
    pub fn get_ref_mb_profile(&self, catalog: &ReferenceCatalog) -> Result<Option<MassBalanceProfile>, WorkflowError> {
        let profile = match self.ref_profile.get() {
            Some(profile) => profile,
            None => {
                let loaded = catalog.load_mb_profile(catalog.wgms_id(self.id())?)?;
                self.ref_profile.get_or_init(|| loaded)
            }
        };
        let Some(profile) = profile else {
            return Ok(None);
        };
        let info = self.climate_info()?;
        let table = profile
            .table
            .clone()
            .period(info.baseline_hydro_yr_0, info.baseline_hydro_yr_1)
            .drop_empty();
        MassBalanceProfile::from_table(table).map(Some)
    }

    // Status

    pub fn status_log(&self) -> &StatusLog {
        &self.status_log
    }

    /// Record a task outcome; failures are mirrored to the working directory.
    pub fn log(&self, task_name: &str, failure: Option<&TaskFailure>) -> Result<(), WorkflowError> {
        self.status_log.append(task_name, failure)?;
        if let Some(failure) = failure {
            self.workspace
                .error_mirror()
                .record(self.id().as_str(), task_name, failure)?;
        }
        Ok(())
    }

    /// Last recorded outcome of exactly `task_name`.
    pub fn get_task_status(&self, task_name: &str) -> Result<Option<String>, WorkflowError> {
        self.status_log.last_status(task_name)
    }

    /// Human-readable description of the glacier.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GlacierDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<glacierdir.GlacierDirectory>")?;
        writeln!(f, "  RGI id: {}", self.id())?;
        writeln!(f, "  Region: {}", self.classification.region)?;
        writeln!(f, "  Subregion: {}", self.classification.subregion)?;
        if !self.name.is_empty() {
            writeln!(f, "  Name: {}", self.name)?;
        }
        writeln!(f, "  Glacier type: {}", self.classification.glacier_type)?;
        writeln!(f, "  Terminus type: {}", self.classification.terminus_type)?;
        writeln!(f, "  Status: {}", self.classification.status)?;
        match self.area_km2() {
            Ok(area) => writeln!(f, "  Area: {} km2", area)?,
            Err(_) => writeln!(f, "  Area: {} km2 (inventory)", self.attrs.area_km2)?,
        }
        writeln!(f, "  Lon, Lat: ({}, {})", self.attrs.cen_lon, self.attrs.cen_lat)?;
        if let Ok(grid) = self.grid() {
            writeln!(f, "  Grid (nx, ny): ({}, {})", grid.nx(), grid.ny())?;
            writeln!(f, "  Grid (dx, dy): ({}, {})", grid.dx(), grid.dy())?;
        }
        Ok(())
    }
}

/// Resolve `key` + `suffix` inside `dir`, checking the format when requested.
fn resolve_in(
    workspace: &Workspace,
    dir: &Path,
    key: &str,
    suffix: &str,
    format: Option<ArtifactFormat>,
) -> Result<PathBuf, WorkflowError> {
    let basename: &Basename = workspace.basenames().get(key)?;
    if let Some(requested) = format {
        if basename.format != requested {
            return Err(WorkflowError::FormatMismatch {
                key: key.to_string(),
                registered: basename.format.to_string(),
                requested: requested.to_string(),
            });
        }
    }
    let (stem, ext) = basename.split(key)?;
    Ok(dir.join(format!("{}{}.{}", stem, suffix, ext)))
}

fn artifact_exists(workspace: &Workspace, path: &Path, format: ArtifactFormat) -> bool {
    if format == ArtifactFormat::Shapefile && workspace.params().use_tar_shapefiles {
        shapefile::archive_path(path, workspace.params().use_compression).exists()
    } else {
        path.exists()
    }
}

fn read_shapefile_at(workspace: &Workspace, path: &Path) -> Result<FeatureCollection, WorkflowError> {
    let params = workspace.params();
    let components = if params.use_tar_shapefiles {
        shapefile::unpack(
            &shapefile::archive_path(path, params.use_compression),
            params.use_compression,
        )?
    } else {
        shapefile::read_loose(path)?
    };
    workspace.codec().decode(&components)
}

fn remove_files(files: &[PathBuf]) -> Result<(), WorkflowError> {
    for file in files {
        fs::remove_file(file).map_err(|e| WorkflowError::io_context(file, "remove", e))?;
    }
    Ok(())
}
