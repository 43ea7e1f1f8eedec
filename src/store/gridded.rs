//! Local map grids and gridded dataset templates

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Georeferencing of an entity's local map
///
/// Stored as the `glacier_grid` JSON artifact. `x0y0` is the center of the
/// first pixel; `dy` is usually negative (north-up grids).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub proj: String,
    pub nxny: (usize, usize),
    pub dxdy: (f64, f64),
    pub x0y0: (f64, f64),
    #[serde(default = "default_pixel_ref")]
    pub pixel_ref: String,
}

fn default_pixel_ref() -> String {
    "center".to_string()
}

impl Grid {
    pub fn nx(&self) -> usize {
        self.nxny.0
    }

    pub fn ny(&self) -> usize {
        self.nxny.1
    }

    pub fn dx(&self) -> f64 {
        self.dxdy.0
    }

    pub fn dy(&self) -> f64 {
        self.dxdy.1
    }

    /// Projection x coordinates of the pixel centers.
    pub fn x_coordinates(&self) -> Vec<f64> {
        (0..self.nx()).map(|i| self.x0y0.0 + i as f64 * self.dx()).collect()
    }

    /// Projection y coordinates of the pixel centers.
    pub fn y_coordinates(&self) -> Vec<f64> {
        (0..self.ny()).map(|j| self.x0y0.1 + j as f64 * self.dy()).collect()
    }

    /// Longitudes and latitudes of every pixel center, row-major (y, x).
    pub fn ll_coordinates(&self, projector: &dyn Projector) -> (Vec<f64>, Vec<f64>) {
        let xs = self.x_coordinates();
        let ys = self.y_coordinates();
        let mut lon = Vec::with_capacity(xs.len() * ys.len());
        let mut lat = Vec::with_capacity(xs.len() * ys.len());
        for y in &ys {
            for x in &xs {
                let (lo, la) = projector.to_lonlat(&self.proj, *x, *y);
                lon.push(lo);
                lat.push(la);
            }
        }
        (lon, lat)
    }
}

/// Map projection to geographic coordinates
///
/// Projection math lives outside the store; implementors wrap whatever
/// library the driver uses.
pub trait Projector: Send + Sync {
    fn to_lonlat(&self, proj: &str, x: f64, y: f64) -> (f64, f64);
}

/// Identity projector for grids already in longitude/latitude
#[derive(Debug, Default, Clone, Copy)]
pub struct LonLat;

impl Projector for LonLat {
    fn to_lonlat(&self, _proj: &str, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }
}

/// A named variable on some dimensions, data flattened row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub dims: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub data: Vec<f32>,
}

impl Variable {
    pub fn new(dims: &[&str], data: Vec<f32>) -> Self {
        Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            attrs: BTreeMap::new(),
            data,
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }
}

/// Gridded dataset bound to a file in an entity directory
///
/// The store creates dimensions and coordinate variables; callers add their
/// own variables and call [`GriddedDataset::save`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedDataset {
    #[serde(skip)]
    path: PathBuf,
    pub dimensions: BTreeMap<String, usize>,
    pub attrs: BTreeMap<String, String>,
    pub variables: BTreeMap<String, Variable>,
}

impl GriddedDataset {
    /// Build the x/y skeleton for `grid`, to be written at `path`.
    pub(crate) fn template(path: PathBuf, grid: &Grid, projector: &dyn Projector) -> Self {
        let mut dimensions = BTreeMap::new();
        dimensions.insert("x".to_string(), grid.nx());
        dimensions.insert("y".to_string(), grid.ny());

        let mut attrs = BTreeMap::new();
        attrs.insert("author".to_string(), "glacierdir".to_string());
        attrs.insert("author_info".to_string(), "Per-glacier directory store".to_string());
        attrs.insert("proj_srs".to_string(), grid.proj.clone());

        let (lon, lat) = grid.ll_coordinates(projector);
        let to_f32 = |v: Vec<f64>| v.into_iter().map(|x| x as f32).collect::<Vec<f32>>();

        let mut variables = BTreeMap::new();
        variables.insert(
            "x".to_string(),
            Variable::new(&["x"], to_f32(grid.x_coordinates()))
                .with_attr("units", "m")
                .with_attr("long_name", "x coordinate of projection")
                .with_attr("standard_name", "projection_x_coordinate"),
        );
        variables.insert(
            "y".to_string(),
            Variable::new(&["y"], to_f32(grid.y_coordinates()))
                .with_attr("units", "m")
                .with_attr("long_name", "y coordinate of projection")
                .with_attr("standard_name", "projection_y_coordinate"),
        );
        variables.insert(
            "longitude".to_string(),
            Variable::new(&["y", "x"], to_f32(lon))
                .with_attr("units", "degrees_east")
                .with_attr("long_name", "longitude coordinate")
                .with_attr("standard_name", "longitude"),
        );
        variables.insert(
            "latitude".to_string(),
            Variable::new(&["y", "x"], to_f32(lat))
                .with_attr("units", "degrees_north")
                .with_attr("long_name", "latitude coordinate")
                .with_attr("standard_name", "latitude"),
        );

        Self {
            path,
            dimensions,
            attrs,
            variables,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a variable; its dimensions must exist and its length must match them.
    pub fn add_variable(&mut self, name: &str, variable: Variable) -> Result<(), WorkflowError> {
        let mut expected = 1usize;
        for dim in &variable.dims {
            let size = self.dimensions.get(dim).ok_or_else(|| {
                WorkflowError::Serialization(format!("Variable {} uses unknown dimension {}", name, dim))
            })?;
            expected *= size;
        }
        if variable.data.len() != expected {
            return Err(WorkflowError::Serialization(format!(
                "Variable {} has {} values, dimensions require {}",
                name,
                variable.data.len(),
                expected
            )));
        }
        self.variables.insert(name.to_string(), variable);
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Persist the dataset to its file, replacing any previous content.
    pub fn save(&self) -> Result<(), WorkflowError> {
        let bytes = bincode::serialize(self)?;
        fs::write(&self.path, bytes).map_err(|e| WorkflowError::io_context(&self.path, "write", e))
    }

    pub(crate) fn load(path: &Path) -> Result<Self, WorkflowError> {
        let bytes = fs::read(path).map_err(|e| WorkflowError::io_context(path, "read", e))?;
        let mut dataset: GriddedDataset = bincode::deserialize(&bytes)?;
        dataset.path = path.to_path_buf();
        Ok(dataset)
    }
}
