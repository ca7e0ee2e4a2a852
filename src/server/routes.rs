//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /                       - Service banner
//! /health                 - Health check
//! /tiles/{z}/{x}/{y}      - Vector tile ({y} may end in .pbf or .mvt)
//! /create                 - Create template (POST)
//! /all                    - List templates
//! /template/{id}          - Update (PATCH) or soft-delete (DELETE) a template
//! ```

use std::time::Duration;

use axum::{
    routing::{get, patch, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_template_handler, delete_template_handler, health_handler, index_handler,
    list_templates_handler, tile_handler, update_template_handler, AppState,
};
use crate::tile::TileStore;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Any CORS origin, tracing on.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router over a fully built [`AppState`].
pub fn create_router<T>(state: AppState<T>, config: RouterConfig) -> Router
where
    T: TileStore + 'static,
{
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler::<T>))
        .route("/tiles/{z}/{x}/{y}", get(tile_handler::<T>))
        .route("/create", post(create_template_handler::<T>))
        .route("/all", get(list_templates_handler::<T>))
        .route(
            "/template/{id}",
            patch(update_template_handler::<T>).delete(delete_template_handler::<T>),
        )
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
