//! Tile-based infinite canvas: sparse tile storage, coordinate transforms,
//! stroke rasterization, and viewport compositing.
//!
//! The canvas is a virtual, unbounded 2D surface stored as a sparse grid of
//! fixed-size RGBA tiles that are allocated on first write and reclaimed by
//! a zoom-aware LRU eviction policy. Everything here runs on the UI thread;
//! rayon is only used for data-parallel inner loops that finish within the
//! frame.

pub mod compositor;
pub mod export;
pub mod raster;
pub mod store;
pub mod tile;
pub mod view;

pub use compositor::{composite, ResampleFilter};
pub use export::{export_full_image, import_image};
pub use raster::{BrushSizeCurve, StrokeEngine, StrokeParams, StrokeSegment, ToolKind};
pub use store::{TileBudgetCurve, TileStore};
pub use tile::{Tile, TileCoord};
pub use view::{canvas_to_tile, tile_to_canvas_rect, ViewState};

/// Policy knobs for the canvas subsystem, injected from the app settings
/// rather than hardcoded: tile pixel size, zoom bounds, the tile-budget
/// curve, the brush-size curve, and the resampling filter.
#[derive(Clone, Debug)]
pub struct CanvasConfig {
    pub tile_size: u32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub budget: TileBudgetCurve,
    /// Eviction also runs after this many tile allocations.
    pub cleanup_interval: u32,
    pub brush_curve: BrushSizeCurve,
    pub filter: ResampleFilter,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            min_zoom: 0.05,
            max_zoom: 10.0,
            budget: TileBudgetCurve::default(),
            cleanup_interval: 25,
            brush_curve: BrushSizeCurve::default(),
            filter: ResampleFilter::default(),
        }
    }
}

impl CanvasConfig {
    pub fn new_store(&self) -> TileStore {
        TileStore::new(self.tile_size, self.budget, self.cleanup_interval)
    }

    pub fn new_view(&self) -> ViewState {
        ViewState::new(self.min_zoom, self.max_zoom)
    }
}
