use egui::{Pos2, Rect, Vec2};

use super::tile::TileCoord;

/// The current window into canvas space: zoom factor, pan offset, and the
/// viewport size in screen pixels.
///
/// `pan` is the canvas-space point that sits at the viewport's top-left
/// corner, so the screen↔canvas mapping is
/// `canvas = pan + screen / zoom` and its inverse. The pan offset is
/// unbounded (the canvas is infinite); the zoom factor is always clamped to
/// the configured `[min_zoom, max_zoom]` range.
#[derive(Clone, Debug)]
pub struct ViewState {
    zoom: f32,
    pub pan: Vec2,
    /// Viewport size in screen pixels.
    pub viewport: Vec2,
    min_zoom: f32,
    max_zoom: f32,
}

impl ViewState {
    pub fn new(min_zoom: f32, max_zoom: f32) -> Self {
        Self {
            zoom: 1.0_f32.clamp(min_zoom, max_zoom),
            pan: Vec2::ZERO,
            viewport: Vec2::new(800.0, 600.0),
            min_zoom,
            max_zoom,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the zoom factor directly. Out-of-range requests are clamped,
    /// never rejected.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn reset(&mut self) {
        self.zoom = 1.0_f32.clamp(self.min_zoom, self.max_zoom);
        self.pan = Vec2::ZERO;
    }

    /// Convert a screen-space point (relative to the viewport's top-left)
    /// to canvas space.
    pub fn screen_to_canvas(&self, screen: Pos2) -> Pos2 {
        Pos2::new(
            self.pan.x + screen.x / self.zoom,
            self.pan.y + screen.y / self.zoom,
        )
    }

    /// Inverse of [`ViewState::screen_to_canvas`].
    pub fn canvas_to_screen(&self, canvas: Pos2) -> Pos2 {
        Pos2::new(
            (canvas.x - self.pan.x) * self.zoom,
            (canvas.y - self.pan.y) * self.zoom,
        )
    }

    /// Pan by a screen-space drag delta. Dragging right moves the content
    /// right, i.e. the canvas point at the top-left decreases.
    pub fn pan_delta(&mut self, delta: Vec2) {
        self.pan -= delta / self.zoom;
    }

    /// Multiply the zoom factor while keeping the canvas point under
    /// `anchor` (screen coordinates) fixed on screen — anchor-preserving
    /// zoom, not a scale from the viewport's top-left.
    pub fn zoom_about(&mut self, factor: f32, anchor: Pos2) {
        let before = self.screen_to_canvas(anchor);
        self.zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        // Solve pan from `before = pan + anchor / zoom`.
        self.pan = before.to_vec2() - anchor.to_vec2() / self.zoom;
    }

    /// Multiplicative wheel-zoom step. Steps shrink near the zoom bounds so
    /// a single notch doesn't overshoot at extreme magnifications.
    pub fn wheel_step(&self, zoom_in: bool) -> f32 {
        let step = if self.zoom < 0.1 {
            1.1
        } else if self.zoom > 5.0 {
            1.05
        } else {
            1.2
        };
        if zoom_in { step } else { 1.0 / step }
    }

    /// The viewport rectangle in canvas space.
    pub fn canvas_viewport(&self) -> Rect {
        Rect::from_min_size(self.pan.to_pos2(), self.viewport / self.zoom)
    }

    /// Inclusive coordinate range of every tile intersecting the viewport,
    /// padded by a zoom-dependent margin so tiles are ready slightly before
    /// they scroll into view. Returns `(min, max)` corners.
    pub fn visible_tile_range(&self, tile_size: u32) -> (TileCoord, TileCoord) {
        let rect = self.canvas_viewport();
        // Less prefetch padding when zoomed far out — the viewport already
        // spans a huge number of tiles there.
        let padding = if self.zoom < 0.1 {
            0
        } else if self.zoom < 0.5 {
            1
        } else {
            2
        };
        let min = canvas_to_tile(rect.min, tile_size);
        let max = canvas_to_tile(Pos2::new(rect.max.x, rect.max.y), tile_size);
        (
            TileCoord::new(min.tx - padding, min.ty - padding),
            TileCoord::new(max.tx + padding, max.ty + padding),
        )
    }

    /// All tile coordinates in the padded visible range, row-major.
    pub fn visible_tiles(&self, tile_size: u32) -> Vec<TileCoord> {
        let (min, max) = self.visible_tile_range(tile_size);
        let mut out =
            Vec::with_capacity(((max.tx - min.tx + 1) * (max.ty - min.ty + 1)).max(0) as usize);
        for ty in min.ty..=max.ty {
            for tx in min.tx..=max.tx {
                out.push(TileCoord::new(tx, ty));
            }
        }
        out
    }
}

/// Map a canvas-space point to the coordinate of the tile containing it.
///
/// Floors toward negative infinity (not toward zero), so tile boundaries
/// stay consistent across the origin: canvas x = -0.5 lands in tile -1,
/// not tile 0.
pub fn canvas_to_tile(p: Pos2, tile_size: u32) -> TileCoord {
    let ts = tile_size as i64;
    TileCoord::new(
        (p.x.floor() as i64).div_euclid(ts) as i32,
        (p.y.floor() as i64).div_euclid(ts) as i32,
    )
}

/// The tile's bounding box in canvas space.
pub fn tile_to_canvas_rect(coord: TileCoord, tile_size: u32) -> Rect {
    let ts = tile_size as f32;
    Rect::from_min_size(
        Pos2::new(coord.tx as f32 * ts, coord.ty as f32 * ts),
        Vec2::splat(ts),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_rect_round_trips_to_same_coord() {
        for &(tx, ty) in &[(0, 0), (3, -2), (-1, -1), (-100, 57), (i16::MAX as i32, 0)] {
            let coord = TileCoord::new(tx, ty);
            let rect = tile_to_canvas_rect(coord, 256);
            assert_eq!(canvas_to_tile(rect.min, 256), coord, "({tx},{ty})");
        }
    }

    #[test]
    fn tile_addressing_floors_toward_negative_infinity() {
        assert_eq!(canvas_to_tile(Pos2::new(-0.5, -0.5), 256), TileCoord::new(-1, -1));
        assert_eq!(canvas_to_tile(Pos2::new(0.0, 0.0), 256), TileCoord::new(0, 0));
        assert_eq!(canvas_to_tile(Pos2::new(255.9, 255.9), 256), TileCoord::new(0, 0));
        assert_eq!(canvas_to_tile(Pos2::new(256.0, -256.0), 256), TileCoord::new(1, -1));
        assert_eq!(canvas_to_tile(Pos2::new(-256.0, -257.0), 256), TileCoord::new(-1, -2));
    }

    #[test]
    fn screen_canvas_round_trip() {
        let mut view = ViewState::new(0.05, 10.0);
        view.pan = Vec2::new(-173.25, 9120.5);
        for &zoom in &[0.05_f32, 0.3, 1.0, 2.5, 10.0] {
            view.set_zoom(zoom);
            let p = Pos2::new(412.75, 133.125);
            let back = view.canvas_to_screen(view.screen_to_canvas(p));
            assert!((back.x - p.x).abs() < 1e-2, "zoom {zoom}: {back:?}");
            assert!((back.y - p.y).abs() < 1e-2, "zoom {zoom}: {back:?}");
        }
    }

    #[test]
    fn zoom_is_clamped_to_bounds() {
        let mut view = ViewState::new(0.05, 10.0);
        view.set_zoom(1000.0);
        assert_eq!(view.zoom(), 10.0);
        view.set_zoom(0.0001);
        assert_eq!(view.zoom(), 0.05);
        view.zoom_about(0.0, Pos2::ZERO);
        assert_eq!(view.zoom(), 0.05);
    }

    #[test]
    fn anchor_preserving_zoom_keeps_cursor_point_fixed() {
        let mut view = ViewState::new(0.05, 10.0);
        view.pan = Vec2::new(-30.0, 70.0);
        let anchor = Pos2::new(50.0, 50.0);
        let before = view.screen_to_canvas(anchor);
        view.zoom_about(4.0, anchor);
        assert_eq!(view.zoom(), 4.0);
        let after = view.canvas_to_screen(before);
        assert!((after.x - anchor.x).abs() < 1e-3, "{after:?}");
        assert!((after.y - anchor.y).abs() < 1e-3, "{after:?}");
    }

    #[test]
    fn pan_delta_follows_drag_direction() {
        let mut view = ViewState::new(0.05, 10.0);
        view.set_zoom(2.0);
        let origin_on_screen = view.canvas_to_screen(Pos2::ZERO);
        view.pan_delta(Vec2::new(10.0, 0.0));
        let moved = view.canvas_to_screen(Pos2::ZERO);
        assert!((moved.x - (origin_on_screen.x + 10.0)).abs() < 1e-4);
    }

    #[test]
    fn visible_range_covers_viewport_edges() {
        let mut view = ViewState::new(0.05, 10.0);
        view.viewport = Vec2::new(800.0, 600.0);
        view.pan = Vec2::new(-10.0, -10.0);
        let (min, max) = view.visible_tile_range(256);
        // Partially visible edge tiles must be included.
        assert!(min.tx <= -1 && min.ty <= -1);
        assert!(max.tx >= 3 && max.ty >= 2);
    }
}
