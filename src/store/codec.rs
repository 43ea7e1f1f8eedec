//! File codecs for single-file artifacts

use crate::error::WorkflowError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Write `value` as bincode, gzip-compressed when `compressed`.
pub fn write_pickle<T: Serialize + ?Sized>(path: &Path, value: &T, compressed: bool) -> Result<(), WorkflowError> {
    let file = File::create(path).map_err(|e| WorkflowError::io_context(path, "create", e))?;
    let mut writer = BufWriter::new(file);
    if compressed {
        let mut encoder = GzEncoder::new(&mut writer, Compression::default());
        bincode::serialize_into(&mut encoder, value)?;
        encoder.finish()?;
    } else {
        bincode::serialize_into(&mut writer, value)?;
    }
    writer.flush().map_err(|e| WorkflowError::io_context(path, "flush", e))
}

pub fn read_pickle<T: DeserializeOwned>(path: &Path, compressed: bool) -> Result<T, WorkflowError> {
    let file = File::open(path).map_err(|e| WorkflowError::io_context(path, "open", e))?;
    let reader = BufReader::new(file);
    let value = if compressed {
        bincode::deserialize_from(GzDecoder::new(reader))?
    } else {
        bincode::deserialize_from(reader)?
    };
    Ok(value)
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), WorkflowError> {
    let file = File::create(path).map_err(|e| WorkflowError::io_context(path, "create", e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush().map_err(|e| WorkflowError::io_context(path, "flush", e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, WorkflowError> {
    let file = File::open(path).map_err(|e| WorkflowError::io_context(path, "open", e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn write_text(path: &Path, text: &str) -> Result<(), WorkflowError> {
    fs::write(path, text).map_err(|e| WorkflowError::io_context(path, "write", e))
}

pub fn read_text(path: &Path) -> Result<String, WorkflowError> {
    fs::read_to_string(path).map_err(|e| WorkflowError::io_context(path, "read", e))
}
