//! File access used by the caches.

use std::path::Path;

use serde_json::Value;

use crate::infra::json_file::{self, JsonFileError};

/// Whole-document JSON persistence used by the caches.
pub trait JsonStore: Send + Sync {
    fn read(&self, path: &Path) -> Result<Value, JsonFileError>;

    fn write(&self, path: &Path, document: &Value) -> Result<(), JsonFileError>;
}

/// [`JsonStore`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsJsonStore;

impl JsonStore for FsJsonStore {
    fn read(&self, path: &Path) -> Result<Value, JsonFileError> {
        json_file::read_json(path)
    }

    fn write(&self, path: &Path, document: &Value) -> Result<(), JsonFileError> {
        json_file::write_json(path, document)
    }
}
