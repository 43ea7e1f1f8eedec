//! Vector datasets and their multi-file on-disk form
//!
//! A shapefile is a set of sibling files sharing one stem (`outlines.shp`,
//! `outlines.dbf`, `outlines.prj`, ...). The byte-level encoding of those
//! components is delegated to a [`ShapefileCodec`]; this module owns the
//! loose-file and tar archive packaging the entity store relies on.

use crate::error::WorkflowError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// In-memory vector dataset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Coordinate reference system, as a proj string or WKT
    pub crs: Option<String>,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// GeoJSON-like geometry, opaque to the store
    pub geometry: Option<serde_json::Value>,
}

impl FeatureCollection {
    /// Numeric property of the first feature.
    pub fn first_f64(&self, property: &str) -> Option<f64> {
        self.features
            .first()
            .and_then(|f| f.properties.get(property))
            .and_then(serde_json::Value::as_f64)
    }
}

/// Component files keyed by extension (without the dot), e.g. `shp`, `dbf`
pub type ShapeComponents = BTreeMap<String, Vec<u8>>;

/// Encodes a dataset to its component files and back
pub trait ShapefileCodec: Send + Sync {
    fn encode(&self, collection: &FeatureCollection) -> Result<ShapeComponents, WorkflowError>;
    fn decode(&self, components: &ShapeComponents) -> Result<FeatureCollection, WorkflowError>;
}

/// Default codec storing geometries and attribute records as JSON components
///
/// Writes `shp` (geometries), `dbf` (attribute records), `cpg` (encoding) and,
/// when a CRS is set, `prj`. Real ESRI encodings plug in through
/// [`ShapefileCodec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonShapeCodec;

impl ShapefileCodec for JsonShapeCodec {
    fn encode(&self, collection: &FeatureCollection) -> Result<ShapeComponents, WorkflowError> {
        let geometries: Vec<&Option<serde_json::Value>> =
            collection.features.iter().map(|f| &f.geometry).collect();
        let records: Vec<&serde_json::Map<String, serde_json::Value>> =
            collection.features.iter().map(|f| &f.properties).collect();

        let mut components = ShapeComponents::new();
        components.insert("shp".to_string(), serde_json::to_vec(&geometries)?);
        components.insert("dbf".to_string(), serde_json::to_vec(&records)?);
        components.insert("cpg".to_string(), b"UTF-8".to_vec());
        if let Some(crs) = &collection.crs {
            components.insert("prj".to_string(), crs.as_bytes().to_vec());
        }
        Ok(components)
    }

    fn decode(&self, components: &ShapeComponents) -> Result<FeatureCollection, WorkflowError> {
        let shp = components
            .get("shp")
            .ok_or_else(|| WorkflowError::Serialization("shapefile set has no .shp component".to_string()))?;
        let dbf = components
            .get("dbf")
            .ok_or_else(|| WorkflowError::Serialization("shapefile set has no .dbf component".to_string()))?;

        let geometries: Vec<Option<serde_json::Value>> = serde_json::from_slice(shp)?;
        let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_slice(dbf)?;
        if geometries.len() != records.len() {
            return Err(WorkflowError::Serialization(format!(
                "shapefile set is inconsistent: {} geometries, {} records",
                geometries.len(),
                records.len()
            )));
        }

        let crs = match components.get("prj") {
            Some(bytes) => Some(
                String::from_utf8(bytes.clone())
                    .map_err(|e| WorkflowError::Serialization(format!("Invalid .prj component: {}", e)))?,
            ),
            None => None,
        };

        let features = geometries
            .into_iter()
            .zip(records)
            .map(|(geometry, properties)| Feature { properties, geometry })
            .collect();
        Ok(FeatureCollection { crs, features })
    }
}

/// Archive path for a `.shp` path: `x.shp` -> `x.tar` or `x.tar.gz`.
pub fn archive_path(shp_path: &Path, compressed: bool) -> PathBuf {
    shp_path.with_extension(if compressed { "tar.gz" } else { "tar" })
}

/// Write the loose component set next to `shp_path`, returning the written paths.
pub fn write_loose(shp_path: &Path, components: &ShapeComponents) -> Result<Vec<PathBuf>, WorkflowError> {
    let mut written = Vec::with_capacity(components.len());
    for (ext, bytes) in components {
        let path = shp_path.with_extension(ext);
        fs::write(&path, bytes).map_err(|e| WorkflowError::io_context(&path, "write", e))?;
        written.push(path);
    }
    Ok(written)
}

/// All loose sibling files sharing the stem of `shp_path`.
pub fn loose_siblings(shp_path: &Path) -> Result<Vec<PathBuf>, WorkflowError> {
    let (Some(dir), Some(stem)) = (shp_path.parent(), shp_path.file_stem().and_then(|s| s.to_str())) else {
        return Err(WorkflowError::InvalidEntity(format!("not a shapefile path: {:?}", shp_path)));
    };
    let prefix = format!("{}.", stem);
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| WorkflowError::io_context(dir, "list", e))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&prefix) {
            continue;
        }
        let ext = &name[prefix.len()..];
        if ext.is_empty() || ext.contains('.') || ext == "tar" {
            continue;
        }
        out.push(entry.path());
    }
    out.sort();
    Ok(out)
}

/// Read the loose component set of `shp_path`.
pub fn read_loose(shp_path: &Path) -> Result<ShapeComponents, WorkflowError> {
    let mut components = ShapeComponents::new();
    for path in loose_siblings(shp_path)? {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let bytes = fs::read(&path).map_err(|e| WorkflowError::io_context(&path, "read", e))?;
            components.insert(ext.to_string(), bytes);
        }
    }
    if components.is_empty() {
        return Err(WorkflowError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("No shapefile found at {:?}", shp_path),
        )));
    }
    Ok(components)
}

/// Pack `files` into a tar archive (gzip-compressed when `compressed`).
pub fn pack(archive: &Path, files: &[PathBuf], compressed: bool) -> Result<(), WorkflowError> {
    let file = fs::File::create(archive).map_err(|e| WorkflowError::io_context(archive, "create", e))?;
    if compressed {
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        append_all(&mut builder, files)?;
        builder.into_inner()?.finish()?;
    } else {
        let mut builder = tar::Builder::new(file);
        append_all(&mut builder, files)?;
        builder.into_inner()?;
    }
    Ok(())
}

fn append_all<W: std::io::Write>(builder: &mut tar::Builder<W>, files: &[PathBuf]) -> Result<(), WorkflowError> {
    for path in files {
        let name = path
            .file_name()
            .ok_or_else(|| WorkflowError::InvalidEntity(format!("not a file: {:?}", path)))?;
        builder
            .append_path_with_name(path, name)
            .map_err(|e| WorkflowError::io_context(path, "archive", e))?;
    }
    Ok(())
}

/// Read every component out of an archive written by [`pack`].
pub fn unpack(archive: &Path, compressed: bool) -> Result<ShapeComponents, WorkflowError> {
    let file = fs::File::open(archive).map_err(|e| WorkflowError::io_context(archive, "open", e))?;
    if compressed {
        read_entries(tar::Archive::new(GzDecoder::new(file)))
    } else {
        read_entries(tar::Archive::new(file))
    }
}

fn read_entries<R: Read>(mut archive: tar::Archive<R>) -> Result<ShapeComponents, WorkflowError> {
    let mut components = ShapeComponents::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let Some(ext) = path.extension().and_then(|e| e.to_str()).map(str::to_string) else {
            continue;
        };
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        components.insert(ext, bytes);
    }
    Ok(components)
}
