use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::Response,
    routing::{get, post},
};
use serde::Serialize;

use crate::{
    application::{catalog::CategoryCounts, error::HttpError},
    cache::CategoryView,
};

use super::{HttpState, document_response, no_store, run_blocking};

const SOURCE: &str = "infra::http::categories";
const CATEGORY_CACHE_CONTROL: &str = "public, max-age=60";

pub(super) fn router() -> Router<HttpState> {
    Router::new()
        .route("/api/categories/leaf", get(leaf))
        .route("/api/categories/top", get(top_level))
        .route("/api/categories/all", get(all))
        .route("/api/categories/status", get(status))
        .route("/api/categories/reload", post(reload))
}

#[derive(Debug, Serialize)]
struct CategoryStatusBody {
    status: &'static str,
    #[serde(flatten)]
    counts: CategoryCounts,
    message: &'static str,
}

async fn leaf(State(state): State<HttpState>) -> Result<Response, HttpError> {
    serve_view(&state, CategoryView::Leaf).await
}

async fn top_level(State(state): State<HttpState>) -> Result<Response, HttpError> {
    serve_view(&state, CategoryView::TopLevel).await
}

async fn all(State(state): State<HttpState>) -> Result<Response, HttpError> {
    serve_view(&state, CategoryView::All).await
}

async fn serve_view(state: &HttpState, view: CategoryView) -> Result<Response, HttpError> {
    let cache = Arc::clone(state.catalog.categories(view));
    let document = run_blocking(move || cache.document())
        .await
        .map_err(|err| HttpError::cache(SOURCE, "Server error", &err))?;
    Ok(document_response(document, CATEGORY_CACHE_CONTROL))
}

async fn status(State(state): State<HttpState>) -> Response {
    no_store(Json(CategoryStatusBody {
        status: "ok",
        counts: state.catalog.category_counts(),
        message: "Category caches are loaded and available.",
    }))
}

async fn reload(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let catalog = state.catalog.clone();
    let counts = run_blocking(move || catalog.reload_categories())
        .await
        .map_err(|err| HttpError::cache(SOURCE, "Reload failed", &err))?;

    Ok(no_store(Json(CategoryStatusBody {
        status: "ok",
        counts,
        message: "Category caches reloaded.",
    })))
}
