use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{cache::CacheError, config::LoadError, infra::error::InfraError};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    /// Cache whose load or reload failed.
    pub cache: Option<&'static str>,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_cache_error(source: &'static str, status: StatusCode, error: &CacheError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = StdError::source(error);
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            cache: error.cache_name(),
            messages,
        }
    }

    /// The chain as a single human-readable line.
    pub fn summary(&self) -> String {
        self.messages.join(": ")
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// HTTP-facing error: a JSON `{"error": ...}` body plus an attached report.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: String,
    report: ErrorReport,
}

impl HttpError {
    /// Map a cache failure to a 500 whose message carries the full error chain.
    pub fn cache(source: &'static str, context: &str, error: &CacheError) -> Self {
        let report =
            ErrorReport::from_cache_error(source, StatusCode::INTERNAL_SERVER_ERROR, error);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            public_message: format!("{context}: {}", report.summary()),
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &str {
        &self.public_message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.public_message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Top-level failure of the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::infra::json_file::JsonFileError;

    #[test]
    fn cache_error_message_includes_the_chain() {
        let error = CacheError::Load {
            cache: "products",
            path: PathBuf::from("/data/products.json"),
            source: JsonFileError::NotFound {
                path: PathBuf::from("/data/products.json"),
            },
        };

        let http = HttpError::cache("test", "Server error", &error);

        assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            http.public_message(),
            "Server error: failed to load products from /data/products.json: \
             file does not exist: /data/products.json"
        );
    }

    #[test]
    fn report_travels_with_the_response() {
        let error = CacheError::Shape {
            cache: "products",
            path: PathBuf::from("/data/products.json"),
            reason: "object without a `data` array".to_string(),
        };

        let response = HttpError::cache("infra::http::products", "Reload failed", &error)
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.source, "infra::http::products");
        assert_eq!(report.cache, Some("products"));
        assert_eq!(report.messages, vec![error.to_string()]);
    }
}
