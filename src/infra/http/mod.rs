mod categories;
mod middleware;
mod products;

use axum::{
    Router,
    body::Body,
    http::{
        HeaderValue, Method, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    application::catalog::Catalog,
    cache::{CacheError, ServedDocument},
};

pub use middleware::{REQUEST_ID_HEADER, RequestContext};

const APPLICATION_JSON: &str = "application/json";
const NO_STORE: &str = "no-store";

#[derive(Clone)]
pub struct HttpState {
    pub catalog: Catalog,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .merge(categories::router())
        .merge(products::router())
        .route("/_health", get(health))
        .with_state(state)
        .layer(cors_layer())
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Run a cache operation off the async executor; loads touch the filesystem.
async fn run_blocking<T, F>(op: F) -> Result<T, CacheError>
where
    F: FnOnce() -> Result<T, CacheError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| CacheError::task(err.to_string()))?
}

/// Serve a cached document verbatim.
fn document_response(document: ServedDocument, cache_control: &'static str) -> Response {
    let mut response = Response::new(Body::from(document.to_bytes()));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
    response
}

fn no_store<T: IntoResponse>(body: T) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    response
}
