//! Whole-document JSON file access.
//!
//! Reads are all-or-nothing and classify failures as missing, unreadable or
//! malformed. Writes use a fixed four-space indentation and replace the target
//! through a temporary sibling file, so a reader never sees a half-written
//! document.

use std::{
    fs,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

const INDENT: &[u8] = b"    ";
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum JsonFileError {
    #[error("file does not exist: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON parse error in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not serialize JSON for {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("file was not created: {}", path.display())]
    NotCreated { path: PathBuf },
}

impl JsonFileError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read and parse the JSON document stored at `path`.
pub fn read_json(path: &Path) -> Result<Value, JsonFileError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(JsonFileError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(JsonFileError::io(path, err)),
    };

    serde_json::from_slice(&contents).map_err(|source| JsonFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize `document` with four-space indentation and replace `path` with it.
pub fn write_json(path: &Path, document: &Value) -> Result<(), JsonFileError> {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(INDENT));
    document
        .serialize(&mut serializer)
        .map_err(|source| JsonFileError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
    buffer.push(b'\n');

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(|err| JsonFileError::io(path, err))?;
    // The temp file starts out owner-only; give it the target's mode instead.
    if let Some(permissions) = target_permissions(path) {
        file.as_file()
            .set_permissions(permissions)
            .map_err(|err| JsonFileError::io(path, err))?;
    }
    file.write_all(&buffer)
        .map_err(|err| JsonFileError::io(path, err))?;
    file.as_file()
        .sync_all()
        .map_err(|err| JsonFileError::io(path, err))?;
    file.persist(path)
        .map_err(|err| JsonFileError::io(path, err.error))?;

    if !path.exists() {
        return Err(JsonFileError::NotCreated {
            path: path.to_path_buf(),
        });
    }

    debug!(
        target = "catalog::json_file",
        path = %path.display(),
        bytes = buffer.len(),
        "wrote JSON document"
    );
    Ok(())
}

/// Permissions the written file should end up with: those of the file being
/// replaced, else the usual mode of a newly created file.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => new_file_permissions(),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    Some(fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// Whether [`read_json`] would succeed for `path`.
pub fn is_valid_json(path: &Path) -> bool {
    read_json(path).is_ok()
}
