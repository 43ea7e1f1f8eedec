//! Filesystem helpers shared by the store, the CLI and task code

use crate::error::WorkflowError;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory of the temporary base used by this crate
pub const TEMP_SUBDIR: &str = "glacierdir";

/// Create `path` (and parents) if missing; with `reset` remove its content first.
pub fn mkdir(path: &Path, reset: bool) -> Result<PathBuf, WorkflowError> {
    if reset && path.exists() {
        fs::remove_dir_all(path).map_err(|e| WorkflowError::io_context(path, "reset", e))?;
    }
    fs::create_dir_all(path).map_err(|e| WorkflowError::io_context(path, "create", e))?;
    Ok(path.to_path_buf())
}

/// `{tmp}/glacierdir/{dirname}`, or `~/tmp/glacierdir/{dirname}` with `home`.
pub fn gettempdir(dirname: &str, reset: bool, home: bool) -> Result<PathBuf, WorkflowError> {
    let base = if home {
        home_dir()
            .ok_or_else(|| WorkflowError::Config("HOME is not set".to_string()))?
            .join("tmp")
    } else {
        env::temp_dir()
    };
    let mut path = base.join(TEMP_SUBDIR);
    if !dirname.is_empty() {
        path.push(dirname);
    }
    mkdir(&path, reset)
}

/// Remove everything inside `dir`, leaving it empty.
pub fn empty_cache(dir: &Path) -> Result<(), WorkflowError> {
    mkdir(dir, true).map(|_| ())
}

/// Expand a leading `~` and `$VAR` / `${VAR}` references.
///
/// Unset variables are left as written.
pub fn expand_path(raw: &str) -> PathBuf {
    let with_home = match (raw.strip_prefix('~'), home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", home.display(), rest)
        }
        _ => raw.to_string(),
    };
    PathBuf::from(expand_vars(&with_home))
}

fn expand_vars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };
        match env::var(name) {
            Ok(value) if !name.is_empty() => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &rest[pos + 1 + consumed..];
    }
    out.push_str(rest);
    out
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").filter(|h| !h.is_empty()).map(PathBuf::from)
}
