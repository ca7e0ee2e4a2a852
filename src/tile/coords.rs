//! Slippy-map to archive row mapping.
//!
//! Web maps number tile rows from the north edge (row 0 at the top). MBTiles
//! archives store rows from the south edge (TMS). The two are related by a
//! vertical flip within the `2^zoom` grid:
//!
//! ```text
//! zoom = 2            slippy row   archive row
//!   ┌──┬──┬──┬──┐          0            3
//!   ├──┼──┼──┼──┤          1            2
//!   ├──┼──┼──┼──┤          2            1
//!   ├──┼──┼──┼──┤          3            0
//!   └──┴──┴──┴──┘
//! ```

use crate::error::TileError;

/// Highest zoom level accepted. `2^30` tiles per axis still fits in `u32`.
pub const MAX_ZOOM: u32 = 30;

/// A validated tile address in the caller-facing slippy-map convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    pub zoom: u32,
    pub column: u32,
    pub row: u32,
}

impl TileAddress {
    /// Validate a raw `(zoom, column, row)` triple.
    pub fn new(zoom: i64, column: i64, row: i64) -> Result<Self, TileError> {
        let address = format!("{}/{}/{}", zoom, column, row);

        if zoom < 0 {
            return Err(TileError::invalid_address(address, "zoom must not be negative"));
        }
        if zoom > MAX_ZOOM as i64 {
            return Err(TileError::invalid_address(
                address,
                format!("zoom must not exceed {}", MAX_ZOOM),
            ));
        }

        let extent = tiles_per_axis(zoom as u32) as i64;
        if column < 0 || column >= extent {
            return Err(TileError::invalid_address(
                address,
                format!("column must be in 0..{} at zoom {}", extent, zoom),
            ));
        }
        if row < 0 || row >= extent {
            return Err(TileError::invalid_address(
                address,
                format!("row must be in 0..{} at zoom {}", extent, zoom),
            ));
        }

        Ok(Self {
            zoom: zoom as u32,
            column: column as u32,
            row: row as u32,
        })
    }

    /// Row of this tile in the archive's south-up numbering.
    pub fn archive_row(&self) -> u32 {
        flip_row(self.zoom, self.row)
    }
}

/// Number of tiles along one axis at `zoom` (`2^zoom`).
///
/// `zoom` must not exceed [`MAX_ZOOM`].
pub fn tiles_per_axis(zoom: u32) -> u32 {
    1u32 << zoom
}

/// Map a slippy-map address to the archive row used as lookup key.
///
/// `archive_row = (2^zoom - 1) - row`. Applying the mapping twice returns the
/// original row.
pub fn to_archive_row(zoom: i64, column: i64, row: i64) -> Result<u32, TileError> {
    TileAddress::new(zoom, column, row).map(|address| address.archive_row())
}

fn flip_row(zoom: u32, row: u32) -> u32 {
    (tiles_per_axis(zoom) - 1) - row
}
