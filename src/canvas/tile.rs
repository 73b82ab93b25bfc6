use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Integer coordinate of a tile in the infinite grid.
///
/// The grid is unbounded in every direction, so both components are signed.
/// Used as the key in the sparse tile store — one tile per coordinate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TileCoord {
    pub tx: i32,
    pub ty: i32,
}

impl TileCoord {
    pub fn new(tx: i32, ty: i32) -> Self {
        Self { tx, ty }
    }
}

/// A fixed-size square RGBA pixel buffer, the unit of canvas storage and
/// eviction.
///
/// The buffer is zero-initialised, so pixels that were never painted read as
/// fully transparent. `dirty` means "modified since the last composite", not
/// "unsaved" — once a write completes, the data lives in the buffer and
/// eviction is purely a memory-pressure response.
#[derive(Debug)]
pub struct Tile {
    pixels: RgbaImage,
    /// True if no write has ever touched this tile.
    empty: bool,
    /// Modified since the last composite pass.
    pub dirty: bool,
    /// Logical clock value of the most recent access (LRU eviction key).
    pub last_access: u64,
}

impl Tile {
    pub fn new(size: u32) -> Self {
        Self {
            pixels: RgbaImage::new(size, size),
            empty: true,
            dirty: false,
            last_access: 0,
        }
    }

    /// Wrap an existing buffer (project load / raster import). The tile is
    /// considered painted and in need of compositing.
    pub fn from_pixels(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            empty: false,
            dirty: true,
            last_access: 0,
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Mutable pixel access for a write batch. The caller must follow up
    /// with [`Tile::mark_written`] so the compositor and the eviction policy
    /// see the change.
    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn mark_written(&mut self) {
        self.empty = false;
        self.dirty = true;
    }

    /// True if the tile has never been painted.
    pub fn is_empty(&self) -> bool {
        self.empty
    }
}
