//! Read-only MBTiles archive access.
//!
//! An MBTiles archive is an SQLite database with a `tiles` table keyed by
//! `(zoom_level, tile_column, tile_row)` where rows use the south-up (TMS)
//! convention. Blobs are returned exactly as stored; for vector tiles that
//! means gzip-compressed protobuf.
//!
//! Each lookup opens its own read-only connection and drops it before
//! returning, whatever the outcome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use clap::ValueEnum;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::debug;

use crate::error::TileError;

const TILE_QUERY: &str = "SELECT tile_data FROM tiles \
     WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3";

const METADATA_QUERY: &str = "SELECT name, value FROM metadata";

// =============================================================================
// Tile Format
// =============================================================================

/// Payload format of the tiles stored in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TileFormat {
    /// Mapbox vector tiles, gzip-compressed protobuf
    #[default]
    Pbf,
    Png,
    Jpg,
    Webp,
}

impl TileFormat {
    /// Media type declared in the `Content-Type` header.
    pub fn media_type(self) -> &'static str {
        match self {
            TileFormat::Pbf => "application/x-protobuf",
            TileFormat::Png => "image/png",
            TileFormat::Jpg => "image/jpeg",
            TileFormat::Webp => "image/webp",
        }
    }

    /// Compression already applied to stored blobs, if any.
    pub fn content_encoding(self) -> Option<&'static str> {
        match self {
            TileFormat::Pbf => Some("gzip"),
            TileFormat::Png | TileFormat::Jpg | TileFormat::Webp => None,
        }
    }

    /// File extensions accepted on the last path segment of a tile URL.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            TileFormat::Pbf => &[".pbf", ".mvt"],
            TileFormat::Png => &[".png"],
            TileFormat::Jpg => &[".jpg", ".jpeg"],
            TileFormat::Webp => &[".webp"],
        }
    }
}

// =============================================================================
// Tile Blob
// =============================================================================

/// An immutable tile payload together with how it must be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBlob {
    /// Raw bytes as stored in the archive
    pub data: Bytes,

    /// Value for `Content-Type`
    pub media_type: &'static str,

    /// Value for `Content-Encoding`, when the blob is stored compressed
    pub content_encoding: Option<&'static str>,
}

impl TileBlob {
    pub fn new(data: impl Into<Bytes>, format: TileFormat) -> Self {
        Self {
            data: data.into(),
            media_type: format.media_type(),
            content_encoding: format.content_encoding(),
        }
    }
}

// =============================================================================
// TileStore Trait
// =============================================================================

/// Point lookups against a tile archive, keyed by archive row.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Fetch the blob at `(zoom, column, archive_row)`.
    ///
    /// A missing tile is [`TileError::TileNotFound`]; an unreadable archive
    /// is [`TileError::StoreUnavailable`].
    async fn lookup(&self, zoom: u32, column: u32, archive_row: u32)
        -> Result<TileBlob, TileError>;

    /// Human-readable location of the archive, for logs.
    fn location(&self) -> String;

    /// Encoding of every tile in the archive.
    fn format(&self) -> TileFormat;
}

// =============================================================================
// MBTiles Reader
// =============================================================================

/// [`TileStore`] backed by an MBTiles file on local disk.
#[derive(Debug, Clone)]
pub struct MbtilesReader {
    path: PathBuf,
    format: TileFormat,
}

impl MbtilesReader {
    pub fn new(path: impl Into<PathBuf>, format: TileFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronous lookup. Blocks on SQLite I/O.
    pub fn lookup_blocking(
        &self,
        zoom: u32,
        column: u32,
        archive_row: u32,
    ) -> Result<TileBlob, TileError> {
        let conn = self.open()?;

        let data: Option<Vec<u8>> = conn
            .query_row(TILE_QUERY, params![zoom, column, archive_row], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| self.unavailable(e))?;

        drop(conn);

        match data {
            Some(data) => {
                debug!(
                    zoom,
                    column,
                    archive_row,
                    bytes = data.len(),
                    "Tile read from archive"
                );
                Ok(TileBlob::new(data, self.format))
            }
            None => Err(TileError::TileNotFound {
                zoom,
                column,
                row: archive_row,
            }),
        }
    }

    /// Read the archive's `metadata` table as name/value pairs.
    pub fn metadata(&self) -> Result<BTreeMap<String, String>, TileError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(METADATA_QUERY).map_err(|e| self.unavailable(e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| self.unavailable(e))?;

        let metadata = rows
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(|e| self.unavailable(e))?;
        Ok(metadata)
    }

    fn open(&self) -> Result<Connection, TileError> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| self.unavailable(e))
    }

    fn unavailable(&self, err: rusqlite::Error) -> TileError {
        TileError::StoreUnavailable {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl TileStore for MbtilesReader {
    async fn lookup(
        &self,
        zoom: u32,
        column: u32,
        archive_row: u32,
    ) -> Result<TileBlob, TileError> {
        let reader = self.clone();
        tokio::task::spawn_blocking(move || reader.lookup_blocking(zoom, column, archive_row))
            .await
            .map_err(|e| TileError::StoreUnavailable {
                path: self.path.display().to_string(),
                message: format!("lookup task failed: {}", e),
            })?
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn format(&self) -> TileFormat {
        self.format
    }
}

// =============================================================================
// Tests
// =============================================================================
