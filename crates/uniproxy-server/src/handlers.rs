//! Router and request handlers

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde_json::json;

use uniproxy::{EndpointClass, Served, keys};
use uniproxy_http::{CachedPayload, apply_cache_headers};

use crate::error::ApiError;
use crate::middleware::{cors, rate_limit};
use crate::state::AppState;
use crate::validate;

/// Assemble the full application router. The CORS layer is outermost so
/// every response, including errors and the preflight, carries the headers.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/aggregated/{datacenter}/{item_ids}", get(aggregated))
        .route("/data-centers", get(data_centers))
        .route("/worlds", get(worlds))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/", get(identity))
        .route("/health", get(health))
        .nest("/api/v2", api)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}

async fn identity(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "status": "ok",
        "environment": state.config.environment.as_str(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" }))).into_response()
}

async fn aggregated(
    State(state): State<AppState>,
    Path((datacenter, item_ids)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    validate::validate_datacenter(&datacenter)?;
    let ids = validate::parse_item_ids(&item_ids)?;

    let key = keys::aggregated(&datacenter, &ids);
    let datacenter = datacenter.to_lowercase();
    let csv = keys::ids_csv(&ids);
    let upstream = state.upstream.clone();

    let served = state
        .cache
        .fetch::<CachedPayload, _, _>(&key, EndpointClass::Aggregated, move || async move {
            upstream.aggregated(&datacenter, &csv).await
        })
        .await?;

    proxied_response(&state, served, EndpointClass::Aggregated)
}

async fn data_centers(State(state): State<AppState>) -> Result<Response, ApiError> {
    let upstream = state.upstream.clone();
    let served = state
        .cache
        .fetch::<CachedPayload, _, _>(keys::DATA_CENTERS, EndpointClass::Static, move || {
            async move { upstream.data_centers().await }
        })
        .await?;

    proxied_response(&state, served, EndpointClass::Static)
}

async fn worlds(State(state): State<AppState>) -> Result<Response, ApiError> {
    let upstream = state.upstream.clone();
    let served = state
        .cache
        .fetch::<CachedPayload, _, _>(keys::WORLDS, EndpointClass::Static, move || async move {
            upstream.worlds().await
        })
        .await?;

    proxied_response(&state, served, EndpointClass::Static)
}

/// Turn a served payload into the caller-facing response, with the
/// cache-debug headers describing where it came from. Assembly can fail if
/// a stored content type is not a valid header value (a slow-tier entry is
/// shared with other writers); that surfaces as the generic 500, with the
/// detail exposed only in development.
fn proxied_response(
    state: &AppState,
    served: Served<CachedPayload>,
    class: EndpointClass,
) -> Result<Response, ApiError> {
    let policy = class.policy();
    let source = served.source;
    let stale = served.stale;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, served.value.content_type)
        .body(Body::from(served.value.body))
        .map_err(|e| ApiError::Internal {
            message: e.to_string(),
            expose: state.config.environment.is_development(),
        })?;

    apply_cache_headers(response.headers_mut(), source, stale, policy.edge_ttl);
    Ok(response)
}
