//! Scratch and output directory handling.
//!
//! Every request that does not name an output directory gets a fresh
//! `<work_root>/<uuid>` directory. Nothing here is ever cleaned up
//! automatically; the files belong to the caller.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::ConvertError;

/// Create `path` and all of its parents, then return its absolute form.
pub fn ensure_directory(path: &Path) -> Result<PathBuf, ConvertError> {
    fs::create_dir_all(path).map_err(|err| {
        ConvertError::invalid(format!(
            "output directory {} cannot be created: {}",
            path.display(),
            err
        ))
    })?;

    if !path.is_dir() {
        return Err(ConvertError::invalid(format!(
            "output directory {} is not a directory",
            path.display()
        )));
    }

    fs::canonicalize(path)
        .map_err(|err| ConvertError::io(format!("resolve {}", path.display()), err))
}

/// Allocate a fresh, uniquely named directory below `work_root`.
pub fn temp_directory(work_root: &Path) -> Result<PathBuf, ConvertError> {
    let dir = work_root.join(Uuid::new_v4().to_string());
    fs::create_dir_all(&dir)
        .map_err(|err| ConvertError::io(format!("create {}", dir.display()), err))?;
    fs::canonicalize(&dir).map_err(|err| ConvertError::io(format!("resolve {}", dir.display()), err))
}

/// Resolve the caller's output directory, or allocate a temporary one.
pub fn resolve_output_directory(
    requested: Option<&Path>,
    work_root: &Path,
) -> Result<PathBuf, ConvertError> {
    match requested {
        Some(dir) => ensure_directory(dir),
        None => temp_directory(work_root),
    }
}

/// Remove a file that must not be mistaken for a finished result.
pub fn discard_partial(path: &Path) {
    if path.exists() {
        if let Err(err) = fs::remove_file(path) {
            log::warn!("Could not remove partial output {}: {}", path.display(), err);
        } else {
            log::debug!("Removed partial output {}", path.display());
        }
    }
}

/// Persist an uploaded file into its own scratch directory.
///
/// The client supplied name is sanitised; an empty result falls back to
/// `fallback`.
pub fn store_upload(
    work_root: &Path,
    original_name: &str,
    fallback: &str,
    data: &[u8],
) -> Result<PathBuf, ConvertError> {
    let dir = temp_directory(work_root)?;
    let mut name = sanitize_filename::sanitize(original_name);
    if name.trim().is_empty() {
        name = fallback.to_string();
    }
    let path = dir.join(name);
    fs::write(&path, data)
        .map_err(|err| ConvertError::io(format!("store upload {}", path.display()), err))?;
    Ok(path)
}
