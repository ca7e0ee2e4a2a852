//! HTTP request handlers for the tile and template API.
//!
//! # Endpoints
//!
//! - `GET /tiles/{z}/{x}/{y}` - Serve a vector tile (`{y}` may carry `.pbf`/`.mvt`)
//! - `GET /` - Service banner
//! - `POST /create` - Create a template
//! - `GET /all` - List live templates
//! - `PATCH /template/{id}` - Update a template
//! - `DELETE /template/{id}` - Soft-delete a template
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bootstrap::{Dependency, DependencyState, Readiness};
use crate::error::{StoreError, TileError};
use crate::events::{ChangeEvent, EventDispatcher};
use crate::store::{NewTemplate, Template, TemplateChanges, TemplateStore};
use crate::tile::{TileFormat, TileRequest, TileService, TileStore};

/// Channel that receives template creation events unless overridden.
pub const DEFAULT_TEMPLATE_CHANNEL: &str = "template_created";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// Built once both dependencies are ready and passed to all handlers via
/// Axum's State extractor.
pub struct AppState<T: TileStore> {
    /// Tile lookups
    pub tile_service: Arc<TileService<T>>,

    /// Template persistence
    pub templates: Arc<dyn TemplateStore>,

    /// Background change-event publication
    pub events: EventDispatcher,

    /// Channel for template creation events
    pub template_channel: String,

    /// Dependency readiness, reported by `/health`
    pub readiness: Option<Readiness>,

    /// Cache-Control max-age in seconds for tile responses
    pub cache_max_age: u32,
}

impl<T: TileStore> AppState<T> {
    pub fn new(
        tile_service: TileService<T>,
        templates: Arc<dyn TemplateStore>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            templates,
            events,
            template_channel: DEFAULT_TEMPLATE_CHANNEL.to_string(),
            readiness: None,
            cache_max_age: 3600,
        }
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_template_channel(mut self, channel: impl Into<String>) -> Self {
        self.template_channel = channel.into();
        self
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = Some(readiness);
        self
    }
}

impl<T: TileStore> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            templates: Arc::clone(&self.templates),
            events: self.events.clone(),
            template_channel: self.template_channel.clone(),
            readiness: self.readiness.clone(),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted as strings so malformed numbers produce the same structured
/// 400 as out-of-range ones.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    pub z: String,
    pub x: String,
    /// Row with optional extension (e.g., "24" or "24.pbf")
    pub y: String,
}

impl TilePathParams {
    /// Row segment with an extension of `format` removed.
    ///
    /// Any other extension is left in place and fails to parse.
    pub fn row_segment(&self, format: TileFormat) -> &str {
        format
            .extensions()
            .iter()
            .find_map(|ext| self.y.strip_suffix(ext))
            .unwrap_or(&self.y)
    }

    /// Parse into a tile request for an archive holding `format` tiles.
    pub fn to_request(&self, format: TileFormat) -> Result<TileRequest, TileError> {
        let row = self.row_segment(format);
        let address = format!("{}/{}/{}", self.z, self.x, row);
        let parse = |value: &str, name: &str| {
            value.parse::<i64>().map_err(|_| {
                TileError::invalid_address(address.clone(), format!("{} must be an integer", name))
            })
        };

        Ok(TileRequest::new(
            parse(&self.z, "zoom")?,
            parse(&self.x, "column")?,
            parse(row, "row")?,
        ))
    }
}

/// Body of `POST /create`.
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub title: Option<String>,
    pub user_id: Option<i32>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Acknowledgement body for template writes.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" once both dependencies are ready
    pub status: String,

    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DependencyState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<DependencyState>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Build the error response and log it by severity:
/// 5xx at ERROR, 404 at DEBUG, other 4xx at WARN.
fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TileError::InvalidAddress { .. } => (StatusCode::BAD_REQUEST, "invalid_address"),
            TileError::TileNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            TileError::StoreUnavailable { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable")
            }
            TileError::LookupTimedOut { .. } => (StatusCode::SERVICE_UNAVAILABLE, "timeout"),
        };
        error_response(status, error_type, self.to_string())
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            StoreError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        };
        error_response(status, error_type, self.to_string())
    }
}

fn parse_template_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw)
        .map_err(|_| StoreError::Validation(format!("Invalid template id: {}", raw)))
}

// =============================================================================
// Tile Handler
// =============================================================================

/// Handle `GET /tiles/{z}/{x}/{y}`.
///
/// The blob is returned as stored; for vector tiles it is already gzip
/// compressed, which the `Content-Encoding` header declares.
pub async fn tile_handler<T: TileStore + 'static>(
    State(state): State<AppState<T>>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, TileError> {
    let request = params.to_request(state.tile_service.store().format())?;
    let blob = state.tile_service.get_tile(request).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(blob.media_type));
    if let Some(encoding) = blob.content_encoding {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }
    if let Ok(cache) = HeaderValue::from_str(&format!("public, max-age={}", state.cache_max_age))
    {
        headers.insert(header::CACHE_CONTROL, cache);
    }

    Ok((StatusCode::OK, headers, Body::from(blob.data)).into_response())
}

// =============================================================================
// Template Handlers
// =============================================================================

/// Handle `GET /`.
pub async fn index_handler() -> Json<&'static str> {
    Json("template service")
}

/// Handle `POST /create`.
///
/// Responds 201 as soon as the row is stored. The creation event is handed
/// to the dispatcher and published in the background; a broker failure is
/// logged and never changes the response.
pub async fn create_template_handler<T: TileStore + 'static>(
    State(state): State<AppState<T>>,
    payload: Result<Json<CreateTemplateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), StoreError> {
    let Json(body) = payload.map_err(|e| StoreError::Validation(e.body_text()))?;
    let new_template = NewTemplate::from_parts(body.title, body.user_id)?;

    let template = state.templates.create(&new_template).await?;
    info!(id = %template.id, user_id = template.user_id, "Template created");

    let event = ChangeEvent::new(
        state.template_channel.as_str(),
        template.id,
        NewTemplate {
            title: template.title,
            user_id: template.user_id,
        },
    );
    state.events.dispatch(&event);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Template created successfully".to_string(),
            id: Some(template.id),
        }),
    ))
}

/// Handle `GET /all`.
pub async fn list_templates_handler<T: TileStore + 'static>(
    State(state): State<AppState<T>>,
) -> Result<Json<Vec<Template>>, StoreError> {
    let templates = state.templates.list_active().await?;
    Ok(Json(templates))
}

/// Handle `PATCH /template/{id}`.
pub async fn update_template_handler<T: TileStore + 'static>(
    State(state): State<AppState<T>>,
    Path(id): Path<String>,
    payload: Result<Json<TemplateChanges>, JsonRejection>,
) -> Result<Json<MessageResponse>, StoreError> {
    let id = parse_template_id(&id)?;
    let Json(changes) = payload.map_err(|e| StoreError::Validation(e.body_text()))?;
    changes.validate()?;

    state.templates.update(id, &changes).await?;
    info!(id = %id, "Template updated");

    Ok(Json(MessageResponse {
        message: "Template updated successfully".to_string(),
        id: None,
    }))
}

/// Handle `DELETE /template/{id}`.
pub async fn delete_template_handler<T: TileStore + 'static>(
    State(state): State<AppState<T>>,
    Path(id): Path<String>,
) -> Result<StatusCode, StoreError> {
    let id = parse_template_id(&id)?;
    state.templates.soft_delete(id).await?;
    info!(id = %id, "Template deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Health Handler
// =============================================================================

/// Handle `GET /health`.
///
/// Reports 503 when readiness is tracked and either dependency is not ready.
pub async fn health_handler<T: TileStore + 'static>(
    State(state): State<AppState<T>>,
) -> Response {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let Some(readiness) = &state.readiness else {
        return Json(HealthResponse {
            status: "healthy".to_string(),
            version,
            database: None,
            broker: None,
        })
        .into_response();
    };

    let ready = readiness.is_ready();
    let body = HealthResponse {
        status: if ready { "healthy" } else { "unavailable" }.to_string(),
        version,
        database: Some(readiness.state(Dependency::Database)),
        broker: Some(readiness.state(Dependency::Broker)),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body)).into_response()
}

// =============================================================================
// Tests
// =============================================================================
