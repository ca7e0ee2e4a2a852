//! Tile Service for resolving tile requests.
//!
//! The TileService is the entry point for tile requests. It:
//! - Validates the slippy-map address
//! - Flips the row into the archive convention
//! - Runs the archive lookup under a time budget
//!
//! ```text
//! TileRequest (z, x, y) ──▶ TileAddress ──▶ archive row ──▶ TileStore::lookup ──▶ TileBlob
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::TileError;

use super::coords::TileAddress;
use super::mbtiles::{TileBlob, TileStore};

/// Default upper bound on a single archive lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(5000);

/// A request for a tile in slippy-map coordinates, as received from a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    pub zoom: i64,
    pub column: i64,
    pub row: i64,
}

impl TileRequest {
    pub fn new(zoom: i64, column: i64, row: i64) -> Self {
        Self { zoom, column, row }
    }
}

/// Resolves tile requests against a [`TileStore`].
pub struct TileService<T: TileStore> {
    store: Arc<T>,
    lookup_timeout: Duration,
}

impl<T: TileStore> TileService<T> {
    pub fn new(store: T) -> Self {
        Self {
            store: Arc::new(store),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Set the time budget for one archive lookup.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    pub fn store(&self) -> &Arc<T> {
        &self.store
    }

    /// Resolve a tile.
    ///
    /// # Errors
    ///
    /// - [`TileError::InvalidAddress`] when the address is outside the grid
    /// - [`TileError::TileNotFound`] (reported in slippy-map coordinates)
    /// - [`TileError::StoreUnavailable`] when the archive cannot be read
    /// - [`TileError::LookupTimedOut`] when the lookup exceeds its budget
    pub async fn get_tile(&self, request: TileRequest) -> Result<TileBlob, TileError> {
        let address = TileAddress::new(request.zoom, request.column, request.row)?;
        let archive_row = address.archive_row();

        let lookup = self
            .store
            .lookup(address.zoom, address.column, archive_row);

        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Err(TileError::TileNotFound { .. })) => Err(TileError::TileNotFound {
                zoom: address.zoom,
                column: address.column,
                row: address.row,
            }),
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.lookup_timeout.as_millis() as u64;
                warn!(
                    store = %self.store.location(),
                    zoom = address.zoom,
                    column = address.column,
                    row = address.row,
                    timeout_ms,
                    "Tile lookup timed out"
                );
                Err(TileError::LookupTimedOut { timeout_ms })
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
