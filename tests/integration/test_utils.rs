//! Test utilities for integration tests.
//!
//! In-memory stand-ins for the template store and broker, plus a helper that
//! writes a small MBTiles archive to a temporary directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use rusqlite::{params, Connection};
use tempfile::TempDir;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use cartobase::error::{PublishError, StoreError};
use cartobase::events::{EventDispatcher, EventPublisher};
use cartobase::store::{NewTemplate, Template, TemplateChanges, TemplateStore};
use cartobase::tile::{MbtilesReader, TileFormat, TileService};
use cartobase::{create_router, AppState, RouterConfig};

/// Stored blob: gzip magic followed by arbitrary bytes.
pub const GZIP_TILE: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05];

// =============================================================================
// MBTiles Fixture
// =============================================================================

/// Write an archive holding one tile at `(z=5, x=10, archive_row=7)`.
///
/// In slippy-map terms that tile is `/tiles/5/10/24`.
pub fn create_mbtiles(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("tiles.mbtiles");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE metadata (name TEXT, value TEXT);
         CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER,
                             tile_row INTEGER, tile_data BLOB);
         CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row);
         INSERT INTO metadata VALUES ('name', 'fixture'), ('format', 'pbf');",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO tiles VALUES (?1, ?2, ?3, ?4)",
        params![5, 10, 7, GZIP_TILE],
    )
    .unwrap();
    path
}

// =============================================================================
// Memory Template Store
// =============================================================================

/// Template store backed by a vector.
#[derive(Default)]
pub struct MemoryTemplateStore {
    rows: Mutex<Vec<Template>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, including soft-deleted ones.
    pub fn rows(&self) -> Vec<Template> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn create(&self, template: &NewTemplate) -> Result<Template, StoreError> {
        let now = chrono::Utc::now().naive_utc();
        let row = Template {
            id: Uuid::new_v4(),
            title: template.title.clone(),
            user_id: template.user_id,
            created_at: Some(now),
            updated_at: Some(now),
            deleted_at: None,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_active(&self) -> Result<Vec<Template>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, changes: &TemplateChanges) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id && row.deleted_at.is_none())
            .ok_or(StoreError::NotFound(id))?;

        if let Some(title) = &changes.title {
            row.title = title.clone();
        }
        if let Some(user_id) = changes.user_id {
            row.user_id = user_id;
        }
        row.updated_at = Some(chrono::Utc::now().naive_utc());
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id && row.deleted_at.is_none())
            .ok_or(StoreError::NotFound(id))?;
        row.deleted_at = Some(chrono::Utc::now().naive_utc());
        Ok(())
    }
}

// =============================================================================
// Publishers
// =============================================================================

/// Publisher that records every payload it is given.
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published messages as `(channel, decoded JSON)`.
    pub fn messages(&self) -> Vec<(String, serde_json::Value)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, payload)| {
                (channel.clone(), serde_json::from_slice(payload).unwrap())
            })
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// Publisher whose broker is always down.
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, channel: &str, _payload: &[u8]) -> Result<(), PublishError> {
        Err(PublishError::PublishFailure {
            channel: channel.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

// =============================================================================
// Test Application
// =============================================================================

/// A router wired to in-memory dependencies.
pub struct TestApp {
    pub router: Router,
    pub templates: Arc<MemoryTemplateStore>,
    pub background: TaskTracker,
}

impl TestApp {
    /// Build an app serving tiles from `tiles_path`.
    pub fn new(tiles_path: &Path, publisher: Arc<dyn EventPublisher>) -> Self {
        let templates = Arc::new(MemoryTemplateStore::new());
        let background = TaskTracker::new();

        let tile_service = TileService::new(MbtilesReader::new(tiles_path, TileFormat::Pbf));
        let events = EventDispatcher::new(publisher, background.clone());
        let state = AppState::new(tile_service, templates.clone(), events).with_cache_max_age(600);

        let router = create_router(state, RouterConfig::new().with_tracing(false));

        Self {
            router,
            templates,
            background,
        }
    }

    /// Wait for every in-flight publish to finish.
    pub async fn drain(&self) {
        self.background.close();
        self.background.wait().await;
    }
}
