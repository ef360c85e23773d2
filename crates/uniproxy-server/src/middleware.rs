//! CORS and rate-limit middleware

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use uniproxy_http::apply_rate_limit_headers;

use crate::error::{ApiError, reset_epoch};
use crate::state::AppState;

/// Outermost layer: answers the preflight directly and stamps CORS headers
/// onto every response that passes through, error responses included.
pub async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    state.cors.apply(response.headers_mut(), origin.as_deref());
    response
}

/// Admission gate for the API routes. Denials answer 429 before any probe
/// or upstream work happens; admissions stamp the remaining-budget headers
/// onto the eventual response.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let identifier = client_identifier(request.headers());
    let decision = state.limiter.check(&identifier);

    if !decision.allowed {
        return ApiError::RateLimited { decision }.into_response();
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(
        response.headers_mut(),
        decision.limit,
        decision.remaining,
        reset_epoch(decision.reset_in),
    );
    response
}

/// The identifier a ledger is kept under: the front proxy's client-ip
/// header, else the first forwarded-for hop, else a shared bucket.
/// Whatever arrives is used verbatim; the limiter never parses addresses.
fn client_identifier(headers: &HeaderMap) -> String {
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
        })
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
