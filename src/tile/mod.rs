//! Tile resolution layer.
//!
//! This module turns slippy-map tile requests into archive lookups and
//! returns the stored blobs untouched.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ TileAddress  │  │ lookup timeout  │  │
//! │  │ (y flip)     │  │                 │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │     TileStore (MbtilesReader)           │
//! │  read-only SQLite, open per lookup      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileAddress`] / [`to_archive_row`]: address validation and row flip
//! - [`TileStore`]: point lookup contract
//! - [`MbtilesReader`]: MBTiles-backed store
//! - [`TileService`]: request entry point with a lookup time budget
//!
//! # Example
//!
//! ```
//! use cartobase::tile::to_archive_row;
//!
//! assert_eq!(to_archive_row(2, 0, 0).unwrap(), 3);
//! assert_eq!(to_archive_row(2, 0, 3).unwrap(), 0);
//! ```

mod coords;
mod mbtiles;
mod service;

pub use coords::{tiles_per_axis, to_archive_row, TileAddress, MAX_ZOOM};
pub use mbtiles::{MbtilesReader, TileBlob, TileFormat, TileStore};
pub use service::{TileRequest, TileService, DEFAULT_LOOKUP_TIMEOUT};
