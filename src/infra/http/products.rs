use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::Response,
    routing::{get, post},
};
use serde::Serialize;

use crate::{application::error::HttpError, cache::ProductStatus};

use super::{HttpState, document_response, no_store, run_blocking};

const SOURCE: &str = "infra::http::products";
const PRODUCT_CACHE_CONTROL: &str = "public, max-age=30";

pub(super) fn router() -> Router<HttpState> {
    Router::new()
        .route("/api/products", get(endpoints))
        .route("/api/products/all", get(all))
        .route("/api/products/reload", post(reload))
        .route("/api/products/status", get(status))
}

#[derive(Debug, Serialize)]
struct Endpoint {
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

#[derive(Debug, Serialize)]
struct EndpointsBody {
    endpoints: [Endpoint; 4],
}

#[derive(Debug, Serialize)]
struct ProductStatusBody {
    status: &'static str,
    #[serde(flatten)]
    cache: ProductStatus,
    message: &'static str,
}

async fn endpoints() -> Json<EndpointsBody> {
    Json(EndpointsBody {
        endpoints: [
            Endpoint {
                method: "GET",
                path: "/api/products",
                description: "List the product routes",
            },
            Endpoint {
                method: "GET",
                path: "/api/products/all",
                description: "All products from the cache",
            },
            Endpoint {
                method: "POST",
                path: "/api/products/reload",
                description: "Reload products from the source JSON file",
            },
            Endpoint {
                method: "GET",
                path: "/api/products/status",
                description: "Cache state (product count, JSON size)",
            },
        ],
    })
}

async fn all(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let products = Arc::clone(state.catalog.products());
    let document = run_blocking(move || products.json_response())
        .await
        .map_err(|err| HttpError::cache(SOURCE, "Server error", &err))?;
    Ok(document_response(document, PRODUCT_CACHE_CONTROL))
}

async fn reload(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let products = Arc::clone(state.catalog.products());
    let cache = run_blocking(move || products.reload().map(|snapshot| ProductStatus::of(&snapshot)))
        .await
        .map_err(|err| HttpError::cache(SOURCE, "Reload failed", &err))?;

    Ok(no_store(Json(ProductStatusBody {
        status: "ok",
        cache,
        message: "Product cache reloaded.",
    })))
}

async fn status(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let products = Arc::clone(state.catalog.products());
    let cache = run_blocking(move || products.status())
        .await
        .map_err(|err| HttpError::cache(SOURCE, "Cache diagnostics failed", &err))?;

    Ok(no_store(Json(ProductStatusBody {
        status: "ok",
        cache,
        message: "Product cache is loaded and ready.",
    })))
}
