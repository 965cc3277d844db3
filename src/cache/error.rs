use std::path::PathBuf;

use thiserror::Error;

use crate::infra::json_file::JsonFileError;

use super::category::CategoryView;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to load {cache} from {}", path.display())]
    Load {
        cache: &'static str,
        path: PathBuf,
        #[source]
        source: JsonFileError,
    },
    #[error("{cache} document at {} has an unexpected shape: {reason}", path.display())]
    Shape {
        cache: &'static str,
        path: PathBuf,
        reason: String,
    },
    #[error("failed to encode {cache} document")]
    Encode {
        cache: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{requested} categories requested from the {served} category cache")]
    ViewMismatch {
        served: CategoryView,
        requested: CategoryView,
    },
    #[error("cache task failed: {0}")]
    Task(String),
}

impl CacheError {
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task(message.into())
    }

    /// Name of the cache the failure belongs to, if any.
    pub fn cache_name(&self) -> Option<&'static str> {
        match self {
            Self::Load { cache, .. } | Self::Shape { cache, .. } | Self::Encode { cache, .. } => {
                Some(*cache)
            }
            Self::ViewMismatch { served, .. } => Some(served.cache_name()),
            Self::Task(_) => None,
        }
    }

    /// Whether the failure comes down to a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Load { source, .. } if source.is_not_found())
    }
}
