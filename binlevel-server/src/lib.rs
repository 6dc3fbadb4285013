//! HTTP transport for binlevel: routes, configuration, and store wiring.

/// Layered configuration loading.
pub mod config;
/// Error responses.
pub mod error;
/// Request handlers.
pub mod routes;
/// Construction of the configured store.
pub mod store;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use binlevel_core::IngestionService;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::{BinlevelConfig, ServerConfig, StoreConfig};
pub use error::ApiError;

/// Path devices post their readings to.
pub const BIN_TELEMETRY_PATH: &str = "/api/bin";

/// Build the application router around an ingestion service.
pub fn router(service: IngestionService, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route(BIN_TELEMETRY_PATH, post(routes::submit_telemetry))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}
