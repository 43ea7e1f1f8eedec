//! Copying entity directories to a new base

use crate::error::WorkflowError;
use crate::store::GlacierDirectory;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use walkdir::WalkDir;

/// Which files of an entity directory are carried over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopySetup {
    /// Everything needed to start a model run
    Run,
    /// Everything needed to redo the ice thickness inversion
    Inversion,
    All,
}

const RUN_FILES: &[&str] = &[
    "climate_monthly",
    "gcm_data",
    "inversion_params",
    "model_flowlines",
    "local_mustar",
    "outlines",
    "climate_info",
    "gridded_data",
];

const INVERSION_FILES: &[&str] = &[
    "climate_monthly",
    "gcm_data",
    "inversion_params",
    "inversion_flowlines",
    "local_mustar",
    "downstream_line",
    "outlines",
    "glacier_grid",
    "climate_info",
    "gridded_data",
];

impl CopySetup {
    fn patterns(&self) -> Option<&'static [&'static str]> {
        match self {
            CopySetup::Run => Some(RUN_FILES),
            CopySetup::Inversion => Some(INVERSION_FILES),
            CopySetup::All => None,
        }
    }
}

impl FromStr for CopySetup {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(CopySetup::Run),
            "inversion" => Ok(CopySetup::Inversion),
            "all" => Ok(CopySetup::All),
            other => Err(WorkflowError::Config(format!("copy setup not understood: {}", other))),
        }
    }
}

/// Copy the files selected by `setup` into the same layout under `base_dir`
/// and open the copy.
///
/// `All` copies the whole tree. The other setups skip files inside
/// directories whose name contains `divide` or `log`.
pub fn copy_to_basedir(
    gdir: &GlacierDirectory,
    base_dir: &Path,
    setup: CopySetup,
) -> Result<GlacierDirectory, WorkflowError> {
    let target = gdir.id().dir_under(base_dir);
    let patterns = setup.patterns();

    for entry in WalkDir::new(gdir.dir()).min_depth(1) {
        let entry = entry.map_err(|e| WorkflowError::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(gdir.dir())
            .map_err(|e| WorkflowError::InvalidEntity(e.to_string()))?;
        if let Some(patterns) = patterns {
            let parent_name = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if parent_name.contains("divide") || parent_name.contains("log") {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !patterns.iter().any(|p| file_name.contains(p)) {
                continue;
            }
        }

        let destination = target.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| WorkflowError::io_context(parent, "create", e))?;
        }
        fs::copy(entry.path(), &destination).map_err(|e| WorkflowError::io_context(entry.path(), "copy", e))?;
    }

    fs::create_dir_all(&target).map_err(|e| WorkflowError::io_context(&target, "create", e))?;
    GlacierDirectory::open_in(gdir.workspace().clone(), gdir.id().as_str(), base_dir)
}
