//! Basename registry
//!
//! Maps logical artifact keys (e.g. `outlines`, `glacier_grid`) to the file
//! name they occupy inside an entity directory and the format the store uses
//! to read and write them. The store never accepts a file name that is not
//! registered here.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Serialization format bound to a basename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Binary serde object (bincode), optionally gzip-compressed
    Pickle,
    Json,
    Text,
    /// Multi-file vector dataset, optionally packed into a tar archive
    Shapefile,
    /// Gridded dataset
    Netcdf,
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactFormat::Pickle => "pickle",
            ArtifactFormat::Json => "json",
            ArtifactFormat::Text => "text",
            ArtifactFormat::Shapefile => "shapefile",
            ArtifactFormat::Netcdf => "netcdf",
        };
        f.write_str(name)
    }
}

/// One registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basename {
    /// File name inside the entity directory, e.g. `outlines.shp`
    pub file_name: String,
    pub format: ArtifactFormat,
    #[serde(default)]
    pub doc: String,
}

impl Basename {
    pub fn new(file_name: impl Into<String>, format: ArtifactFormat, doc: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            format,
            doc: doc.into(),
        }
    }

    /// Split the file name into (stem, extension).
    ///
    /// Fails unless the name has exactly one extension segment.
    pub fn split(&self, key: &str) -> Result<(&str, &str), WorkflowError> {
        let mut parts = self.file_name.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(stem), Some(ext), None) if !stem.is_empty() && !ext.is_empty() => Ok((stem, ext)),
            _ => Err(WorkflowError::MalformedBasename {
                key: key.to_string(),
                file_name: self.file_name.clone(),
            }),
        }
    }
}

/// Registry of logical artifact keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasenameRegistry {
    entries: BTreeMap<String, Basename>,
}

impl Default for BasenameRegistry {
    fn default() -> Self {
        use ArtifactFormat::*;

        let defaults = [
            ("outlines", "outlines.shp", Shapefile, "The glacier outlines in the local map projection."),
            ("intersects", "intersects.shp", Shapefile, "The glacier intersects in the local map projection."),
            ("glacier_grid", "glacier_grid.json", Json, "The glacier's local map grid (georeferencing)."),
            ("dem_source", "dem_source.txt", Text, "A text file with the source of the topo file."),
            ("gridded_data", "gridded_data.nc", Netcdf, "A gridded dataset containing several variables on the local grid."),
            ("diagnostics", "diagnostics.json", Json, "A dictionary of runtime diagnostics useful for debugging."),
            ("climate_monthly", "climate_monthly.nc", Netcdf, "A gridded dataset containing the monthly climate timeseries."),
            ("climate_info", "climate_info.json", Json, "Some information (dictionary) about the climate data and the baseline period."),
            ("centerlines", "centerlines.pkl", Pickle, "A list of centerlines, sorted by flow order."),
            ("downstream_line", "downstream_line.pkl", Pickle, "The downstream line and its bed profile."),
            ("inversion_flowlines", "inversion_flowlines.pkl", Pickle, "The flowlines used for the ice thickness inversion."),
            ("inversion_params", "inversion_params.pkl", Pickle, "The parameters used for the ice thickness inversion."),
            ("inversion_output", "inversion_output.pkl", Pickle, "The results of the ice thickness inversion."),
            ("local_mustar", "local_mustar.json", Json, "The local calibrated temperature sensitivity."),
            ("model_flowlines", "model_flowlines.pkl", Pickle, "The flowlines ready for a dynamical run."),
            ("model_run", "model_run.nc", Netcdf, "The output of a dynamical run."),
            ("model_diagnostics", "model_diagnostics.nc", Netcdf, "Diagnostics time series of a dynamical run."),
            ("gcm_data", "gcm_data.nc", Netcdf, "The climate projection data for this glacier."),
        ];

        let entries = defaults
            .into_iter()
            .map(|(key, file_name, format, doc)| (key.to_string(), Basename::new(file_name, format, doc)))
            .collect();
        Self { entries }
    }
}

impl BasenameRegistry {
    /// Registry without any entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register (or replace) a key.
    ///
    /// The file name is validated up front so that a bad entry is reported
    /// at configuration time rather than on first use.
    pub fn insert(&mut self, key: impl Into<String>, basename: Basename) -> Result<(), WorkflowError> {
        let key = key.into();
        basename.split(&key)?;
        self.entries.insert(key, basename);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&Basename, WorkflowError> {
        self.entries
            .get(key)
            .ok_or_else(|| WorkflowError::UnknownKey(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Documentation line for a key, as listed under a task's written files.
    pub fn doc_str(&self, key: &str) -> Result<String, WorkflowError> {
        let entry = self.get(key)?;
        Ok(format!("    {}.{}\n        {}", key, extension_of(&entry.file_name), entry.doc))
    }

    /// Merge entries from configuration on top of this registry.
    pub fn extend(&mut self, extra: &BTreeMap<String, Basename>) -> Result<(), WorkflowError> {
        for (key, basename) in extra {
            self.insert(key.clone(), basename.clone())?;
        }
        Ok(())
    }
}

fn extension_of(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or("")
}
