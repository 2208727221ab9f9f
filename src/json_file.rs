use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::StoreError;

/// Reads a whole JSON document. A missing file is `NotFound`, a parse failure is `Malformed`.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => StoreError::NotFound(what.to_string()),
        _ => StoreError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::malformed(what, e.to_string()))
}

/// Overwrites `path` with the pretty-printed document, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    what: &str,
) -> Result<(), StoreError> {
    let data = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        what: what.to_string(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    log::debug!("writing {} ({} bytes) to {}", what, data.len(), path.display());
    fs::write(path, data).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
