//! Axum HTTP API server.
//!
//! This crate provides:
//! - Job submission, status polling and server-sent progress events
//! - A webhook entry point that accepts common field aliases
//! - Drive video search
//! - Health/readiness probes, rate limiting and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, Environment};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
