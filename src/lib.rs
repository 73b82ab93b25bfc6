//! TilePaint — a raster drawing app on an infinite, sparsely tiled canvas.
//!
//! The canvas subsystem ([`canvas`]) is UI-agnostic and carries the whole
//! document model: sparse tile storage with zoom-aware LRU eviction, the
//! screen↔canvas↔tile coordinate transforms, stroke rasterization, and
//! viewport compositing. [`app`] wires it into an egui/eframe shell, [`io`]
//! handles image and project files, [`settings`] persists user preferences.

pub mod app;
pub mod canvas;
pub mod io;
pub mod logger;
pub mod settings;
