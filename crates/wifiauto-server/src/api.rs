//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `health` - Service health checks
//! - `status` - Engine and radio status
//! - `settings` - The monitoring and geofencing switches
//! - `events` - Startup, forced idle checks and provider callbacks
//! - `geofence` - Region and subscription published to the location provider
//! - `log` - Diagnostic log
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod error;
pub mod events;
pub mod geofence;
pub mod health;
pub mod log;
pub mod openapi;
pub mod settings;
pub mod status;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /swagger-ui            - Swagger UI
/// /api
/// ├── /status            - Engine and radio status
/// ├── /settings          - Switches
/// ├── /events            - boot, tick, location, geofence
/// ├── /geofence          - Registered region
/// ├── /location          - Location subscription
/// ├── /log               - Diagnostic log
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/status", status::router())
                .nest("/settings", settings::router())
                .nest("/events", events::router())
                .nest("/geofence", geofence::router())
                .nest("/location", geofence::location_router())
                .nest("/log", log::router()),
        )
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/swagger-ui/openapi.json", openapi::ApiDoc::openapi()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
