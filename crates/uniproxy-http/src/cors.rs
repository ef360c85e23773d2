//! CORS policy
//!
//! Every response this proxy emits carries CORS headers, including error
//! responses and the preflight: the whole point of fronting the upstream is
//! that browsers never see a response they silently discard.

use http::{HeaderMap, HeaderValue};

const ALLOW_METHODS: &str = "GET, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Accept";
const MAX_AGE: &str = "86400";

/// Origin allow-list with a development escape hatch for local frontends.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    /// Configured allow-list, in priority order
    pub allowed_origins: Vec<String>,
    /// In development any localhost origin is reflected
    pub development: bool,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>, development: bool) -> Self {
        Self {
            allowed_origins,
            development,
        }
    }

    /// The origin to echo in `Access-Control-Allow-Origin`: the request
    /// origin when allow-listed, else the first configured entry.
    pub fn resolve_origin(&self, request_origin: Option<&str>) -> String {
        if let Some(origin) = request_origin {
            if self.allowed_origins.iter().any(|allowed| allowed == origin) {
                return origin.to_string();
            }
            if self.development && is_local_origin(origin) {
                return origin.to_string();
            }
        }

        self.allowed_origins
            .first()
            .cloned()
            .unwrap_or_else(|| "*".to_string())
    }

    /// Stamp the full CORS header set onto a response.
    pub fn apply(&self, headers: &mut HeaderMap, request_origin: Option<&str>) {
        let origin = self.resolve_origin(request_origin);
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(http::header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        headers.insert(
            http::header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            http::header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            http::header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(MAX_AGE),
        );
    }
}

fn is_local_origin(origin: &str) -> bool {
    const LOCAL_HOSTS: [&str; 2] = ["http://localhost", "http://127.0.0.1"];
    LOCAL_HOSTS.iter().any(|host| {
        origin == *host
            || origin
                .strip_prefix(host)
                .is_some_and(|rest| rest.starts_with(':'))
    })
}
