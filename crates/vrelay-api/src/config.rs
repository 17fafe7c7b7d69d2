//! HTTP server settings.
//!
//! | Variable           | Default       |
//! |--------------------|---------------|
//! | `API_HOST`         | `0.0.0.0`     |
//! | `API_PORT`         | `8000`        |
//! | `CORS_ORIGINS`     | `*`           |
//! | `RATE_LIMIT_RPS`   | `10`          |
//! | `RATE_LIMIT_BURST` | `20`          |
//! | `MAX_BODY_SIZE`    | `1048576`     |
//! | `ENVIRONMENT`      | `development` |
//! | `METRICS_ENABLED`  | `true`        |

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use tracing::warn;

/// Deployment environment. Production hides internal error details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Read `ENVIRONMENT`; anything but `production` is development.
    pub fn from_env() -> Self {
        match std::env::var("ENVIRONMENT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Allowed browser origins; `*` allows any
    pub cors_origins: Vec<String>,
    /// Sustained requests per second, per client IP
    pub rate_limit_rps: u32,
    pub rate_limit_burst: u32,
    /// Largest accepted request body, in bytes
    pub max_body_size: usize,
    pub environment: Environment,
    /// Serve Prometheus text at `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            max_body_size: 1024 * 1024,
            environment: Environment::Development,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Defaults overridden by whichever variables are set. Unparseable
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST")
                .ok()
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.host),
            port: parse_env("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|raw| split_origins(&raw))
                .ok()
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: parse_env::<u32>("RATE_LIMIT_RPS")
                .map(|rps| rps.max(1))
                .unwrap_or(defaults.rate_limit_rps),
            rate_limit_burst: parse_env::<u32>("RATE_LIMIT_BURST")
                .map(|burst| burst.max(1))
                .unwrap_or(defaults.rate_limit_burst),
            max_body_size: parse_env("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: Environment::from_env(),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.host.trim().parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }

    /// One-line summary for the startup log.
    pub fn describe(&self) -> String {
        format!(
            "{}:{} ({:?}), {} rps burst {}, body limit {} bytes, metrics {}",
            self.host,
            self.port,
            self.environment,
            self.rate_limit_rps,
            self.rate_limit_burst,
            self.max_body_size,
            if self.metrics_enabled { "on" } else { "off" }
        )
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_env<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}
