use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::bootstrap::Dependency;

/// Failure of a single attempt to bring one dependency up.
#[derive(Debug, Clone, Error)]
pub enum DependencyError {
    /// The driver could not open a connection or the connectivity probe failed
    #[error("connection failed: {0}")]
    Connect(String),

    /// Connected, but the required schema could not be ensured
    #[error("schema setup failed: {0}")]
    Schema(String),

    /// A named broker channel could not be declared
    #[error("failed to declare channel '{channel}': {message}")]
    Declare { channel: String, message: String },

    /// The attempt did not complete within its time budget
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Fatal startup errors. The service never binds its listener after one of these.
#[derive(Debug, Clone, Error)]
pub enum BootstrapError {
    /// Every probe in the database retry budget failed
    #[error("database unavailable after {attempts} attempt(s): {source}")]
    DatabaseUnavailable {
        attempts: u32,
        #[source]
        source: DependencyError,
    },

    /// The single broker connection attempt failed or timed out
    #[error("broker unavailable: {source}")]
    BrokerUnavailable {
        #[source]
        source: DependencyError,
    },
}

impl BootstrapError {
    /// Which dependency caused the bootstrap to abort.
    pub fn kind(&self) -> Dependency {
        match self {
            BootstrapError::DatabaseUnavailable { .. } => Dependency::Database,
            BootstrapError::BrokerUnavailable { .. } => Dependency::Broker,
        }
    }
}

/// Errors raised while resolving a tile request.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Caller supplied an address outside the tile grid (maps to HTTP 400)
    #[error("Invalid tile address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// No tile stored at this address (maps to HTTP 404)
    #[error("Tile not found: {zoom}/{column}/{row}")]
    TileNotFound { zoom: u32, column: u32, row: u32 },

    /// The archive could not be opened or queried (maps to HTTP 500)
    #[error("Tile store unavailable ({path}): {message}")]
    StoreUnavailable { path: String, message: String },

    /// The archive lookup exceeded its time budget (maps to HTTP 503)
    #[error("Tile lookup timed out after {timeout_ms}ms")]
    LookupTimedOut { timeout_ms: u64 },
}

impl TileError {
    pub(crate) fn invalid_address(
        address: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TileError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the change-notification path. Never surfaced to HTTP callers.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// Event payload could not be encoded
    #[error("failed to encode event: {0}")]
    Encode(String),

    /// Broker rejected or dropped the message
    #[error("failed to publish to '{channel}': {message}")]
    PublishFailure { channel: String, message: String },
}

/// Errors from the template persistence layer.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Request body or path parameter is unusable (maps to HTTP 400)
    #[error("{0}")]
    Validation(String),

    /// No live template with this id (maps to HTTP 404)
    #[error("Template not found: {0}")]
    NotFound(Uuid),

    /// Query failed at the database (maps to HTTP 500)
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Errors that end the service lifecycle early.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Dependencies could not be acquired
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// The listener address could not be bound
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    /// The HTTP server stopped with an error
    #[error("server error: {0}")]
    Serve(String),
}
