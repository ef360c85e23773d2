//! Environment-driven server configuration

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

/// Deployment environment; development relaxes CORS to local frontends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
        }
    }

    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Everything the binary needs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub environment: Environment,
    pub allowed_origins: Vec<String>,
    pub upstream_base: String,
    pub rate_limit_requests: usize,
    pub rate_limit_window: Duration,
    pub bind_addr: SocketAddr,
    /// Slow tier connection; absent means the proxy runs on the edge tier
    /// alone
    pub redis_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            allowed_origins: vec!["https://xivdyetools.app".to_string()],
            upstream_base: "https://universalis.app".to_string(),
            rate_limit_requests: 60,
            rate_limit_window: Duration::from_secs(60),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            redis_url: None,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment, falling back to defaults and
    /// warning about values that fail to parse.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            environment: env::var("ENVIRONMENT")
                .map(|v| parse_environment(&v))
                .unwrap_or(defaults.environment),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .ok()
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.allowed_origins),
            upstream_base: env::var("UNIVERSALIS_API_BASE").unwrap_or(defaults.upstream_base),
            rate_limit_requests: parse_var("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests),
            rate_limit_window: Duration::from_secs(parse_var(
                "RATE_LIMIT_WINDOW_SECONDS",
                defaults.rate_limit_window.as_secs(),
            )),
            bind_addr: parse_var("BIND_ADDR", defaults.bind_addr),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
        }
    }
}

fn parse_environment(value: &str) -> Environment {
    if value.eq_ignore_ascii_case("production") {
        Environment::Production
    } else {
        Environment::Development
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "ignoring unparseable environment value");
            default
        }),
        Err(_) => default,
    }
}
