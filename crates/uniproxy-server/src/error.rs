//! Request error taxonomy and response mapping

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use uniproxy::RateLimitDecision;
use uniproxy_core::UpstreamError;
use uniproxy_http::apply_rate_limit_headers;

/// Retry-After sent when the upstream itself rate-limits us. Deliberately a
/// fixed constant rather than whatever the upstream advertises; the
/// limiter's own denials use their computed reset instead.
const UPSTREAM_RETRY_AFTER: u64 = 60;

/// Everything a handler can fail with, mapped onto a caller-visible status
/// and a JSON body. CORS headers are stamped by middleware, so even these
/// responses reach browsers intact.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Path validation failure
    #[error("{message}")]
    InvalidInput {
        message: String,
        offending: Vec<String>,
    },

    /// Denied by the local sliding-window limiter
    #[error("rate limit exceeded")]
    RateLimited { decision: RateLimitDecision },

    /// The upstream fetch failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Anything else
    #[error("internal server error")]
    Internal { message: String, expose: bool },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidInput { message, offending } => {
                let body = if offending.is_empty() {
                    json!({ "error": message })
                } else {
                    json!({ "error": message, "invalidValues": offending })
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }

            ApiError::RateLimited { decision } => {
                let retry_after = decision.reset_in.as_secs();
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": "Rate limit exceeded",
                        "retryAfter": retry_after,
                    })),
                )
                    .into_response();

                let headers = response.headers_mut();
                apply_rate_limit_headers(
                    headers,
                    decision.limit,
                    0,
                    reset_epoch(decision.reset_in),
                );
                insert_retry_after(headers, retry_after);
                response
            }

            ApiError::Upstream(UpstreamError::RateLimited) => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": "Rate limited by upstream API",
                        "retryAfter": UPSTREAM_RETRY_AFTER,
                    })),
                )
                    .into_response();
                insert_retry_after(response.headers_mut(), UPSTREAM_RETRY_AFTER);
                response
            }

            ApiError::Upstream(UpstreamError::Status { status, reason }) => {
                let mirrored =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    mirrored,
                    Json(json!({
                        "error": "Upstream API error",
                        "status": status,
                        "reason": reason,
                    })),
                )
                    .into_response()
            }

            ApiError::Upstream(UpstreamError::Transport(_)) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Failed to fetch from upstream API" })),
            )
                .into_response(),

            ApiError::Internal { message, expose } => {
                let body = if expose {
                    json!({ "error": "Internal Server Error", "message": message })
                } else {
                    json!({ "error": "Internal Server Error" })
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

/// Absolute epoch second at which the caller's window resets
pub fn reset_epoch(reset_in: Duration) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now + reset_in.as_secs()
}

fn insert_retry_after(headers: &mut axum::http::HeaderMap, seconds: u64) {
    if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
        headers.insert(header::RETRY_AFTER, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_is_400() {
        let response = ApiError::InvalidInput {
            message: "bad".to_string(),
            offending: vec!["0".to_string()],
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_local_denial_carries_limit_headers() {
        let response = ApiError::RateLimited {
            decision: RateLimitDecision {
                allowed: false,
                limit: 60,
                remaining: 0,
                reset_in: Duration::from_secs(17),
            },
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "17");
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");
        assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "60");
    }

    #[test]
    fn test_upstream_rate_limit_uses_fixed_retry_after() {
        let response = ApiError::from(UpstreamError::RateLimited).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "60");
    }

    #[test]
    fn test_upstream_status_is_mirrored() {
        let response = ApiError::from(UpstreamError::Status {
            status: 404,
            reason: "Not Found".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unmappable_upstream_status_becomes_502() {
        let response = ApiError::from(UpstreamError::Status {
            status: 42,
            reason: "Weird".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail_unless_exposed() {
        let hidden = ApiError::Internal {
            message: "tier melted".to_string(),
            expose: false,
        }
        .into_response();
        assert_eq!(hidden.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(hidden).await;
        assert_eq!(json["error"], "Internal Server Error");
        assert!(json.get("message").is_none());

        let exposed = ApiError::Internal {
            message: "tier melted".to_string(),
            expose: true,
        }
        .into_response();
        let json = body_json(exposed).await;
        assert_eq!(json["message"], "tier melted");
    }

    #[test]
    fn test_transport_is_502() {
        let response =
            ApiError::from(UpstreamError::Transport("reset".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
