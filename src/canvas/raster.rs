use egui::Pos2;
use image::Rgba;

use super::store::TileStore;
use super::tile::TileCoord;

/// Drawing tool kind, as fed in from the toolbar.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ToolKind {
    #[default]
    Pen,
    Brush,
    Eraser,
    Line,
    Rectangle,
    Circle,
}

impl ToolKind {
    /// Freehand tools rasterize incrementally on every pointer move.
    pub fn is_freehand(&self) -> bool {
        matches!(self, ToolKind::Pen | ToolKind::Brush | ToolKind::Eraser)
    }

    /// Shape tools preview against a transient overlay and commit once on
    /// release.
    pub fn is_shape(&self) -> bool {
        matches!(self, ToolKind::Line | ToolKind::Rectangle | ToolKind::Circle)
    }

    /// Soft (antialiased smoothstep) stamp edge vs. a hard binary edge.
    /// The pen keeps hard pixel edges; everything else gets the soft
    /// circular falloff.
    pub fn soft_edge(&self) -> bool {
        !matches!(self, ToolKind::Pen)
    }
}

/// Monotonic non-linear mapping from the UI size slider (0..=1) to a brush
/// radius in canvas pixels: `radius = min + (max − min) · t^gamma`.
///
/// Gamma > 1 gives fine control at small sizes and fast growth at large
/// ones. Injected via [`super::CanvasConfig`] so the curve can be swapped
/// and tested independently.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSizeCurve {
    pub gamma: f32,
    pub min_radius: f32,
    pub max_radius: f32,
}

impl Default for BrushSizeCurve {
    fn default() -> Self {
        Self {
            gamma: 2.0,
            min_radius: 0.5,
            max_radius: 50.0,
        }
    }
}

impl BrushSizeCurve {
    pub fn radius(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        self.min_radius + (self.max_radius - self.min_radius) * t.powf(self.gamma)
    }
}

/// Tool parameters for one stroke: kind, stamp radius, opacity, color.
#[derive(Clone, Copy, Debug)]
pub struct StrokeParams {
    pub tool: ToolKind,
    pub radius: f32,
    /// 0..=1, scales the stamp's coverage.
    pub opacity: f32,
    pub color: [u8; 3],
}

/// One continuous drag, as an ordered sequence of canvas points with
/// optional per-point pressure (scales the stamp radius). Consumed
/// destructively by [`Rasterizer::rasterize`]; nothing is retained after
/// rasterization.
#[derive(Clone, Debug, Default)]
pub struct StrokeSegment {
    points: Vec<(Pos2, f32)>,
}

impl StrokeSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pos: Pos2, pressure: Option<f32>) {
        self.points.push((pos, pressure.unwrap_or(1.0).clamp(0.0, 1.0)));
    }

    pub fn from_points(points: &[Pos2]) -> Self {
        Self {
            points: points.iter().map(|p| (*p, 1.0)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ============================================================================
// STAMP RASTERIZER
// ============================================================================

/// Converts stroke input into per-tile pixel writes.
///
/// Stamp coverage goes through a precomputed alpha LUT indexed by squared
/// distance ratio, so the per-pixel inner loop does no `sqrt` or
/// smoothstep work. The LUT is rebuilt only when the (radius, edge mode)
/// pair changes.
pub struct Rasterizer {
    lut: [u8; 256],
    lut_key: (u32, bool), // (radius bits, soft edge)
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self {
            lut: [0u8; 256],
            lut_key: (0, false),
        }
    }
}

/// Soft stamps on tiny radii extend slightly past the nominal radius so
/// there is always at least ~1.5px of antialiased edge to work with.
fn effective_radius(radius: f32, soft: bool) -> f32 {
    if soft && radius < 3.0 {
        radius + 1.5
    } else {
        radius
    }
}

/// Geometric stamp coverage at linear distance `dist` from the center.
/// Soft mode fades with a smoothstep over the outer band of the stamp;
/// hard mode is a binary edge at the radius.
fn stamp_coverage(dist: f32, radius: f32, soft: bool) -> f32 {
    if !soft {
        return if dist <= radius { 1.0 } else { 0.0 };
    }
    let eff = effective_radius(radius, soft);
    let fade = if radius < 3.0 {
        eff - radius + radius * 0.35
    } else {
        (radius * 0.35).max(1.0)
    };
    let solid = eff - fade;
    if dist <= solid {
        1.0
    } else if dist >= eff {
        0.0
    } else {
        let x = 1.0 - ((dist - solid) / fade).clamp(0.0, 1.0);
        x * x * (3.0 - 2.0 * x)
    }
}

impl Rasterizer {
    fn ensure_lut(&mut self, radius: f32, soft: bool) {
        let key = (radius.to_bits(), soft);
        if key == self.lut_key {
            return;
        }
        self.lut_key = key;

        let eff = effective_radius(radius, soft);
        for i in 0..256 {
            // LUT index i corresponds to dist² / eff_radius² == i / 255.
            let dist = (i as f32 / 255.0).sqrt() * eff;
            let cov = stamp_coverage(dist, radius, soft);
            self.lut[i] = (cov * 255.0).round().min(255.0) as u8;
        }
    }

    /// Stamp one circle at `center` (canvas coordinates), writing blended
    /// pixels into every tile the stamp overlaps. Tiles are fetched with
    /// `get_or_create` and marked dirty/non-empty when touched. Non-finite
    /// input is silently ignored.
    pub fn stamp(&mut self, store: &mut TileStore, center: Pos2, params: &StrokeParams) {
        if !center.x.is_finite() || !center.y.is_finite() {
            return;
        }
        let radius = params.radius.max(0.25);
        let opacity = params.opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            return;
        }
        let soft = params.tool.soft_edge();
        self.ensure_lut(radius, soft);

        let eff = effective_radius(radius, soft);
        let eff_sq = eff * eff;
        let inv_eff_sq = 1.0 / eff_sq;
        let ts = store.tile_size() as i64;
        let is_eraser = params.tool == ToolKind::Eraser;

        // Global pixel bounding box of the stamp.
        let min_px = (center.x - eff).floor() as i64;
        let max_px = (center.x + eff).ceil() as i64;
        let min_py = (center.y - eff).floor() as i64;
        let max_py = (center.y + eff).ceil() as i64;

        let tx0 = min_px.div_euclid(ts);
        let tx1 = max_px.div_euclid(ts);
        let ty0 = min_py.div_euclid(ts);
        let ty1 = max_py.div_euclid(ts);

        for tyy in ty0..=ty1 {
            for txx in tx0..=tx1 {
                let origin_x = txx * ts;
                let origin_y = tyy * ts;

                // Quick reject: closest pixel center of this tile to the
                // stamp center.
                let near_x = center
                    .x
                    .clamp(origin_x as f32 + 0.5, (origin_x + ts) as f32 - 0.5);
                let near_y = center
                    .y
                    .clamp(origin_y as f32 + 0.5, (origin_y + ts) as f32 - 0.5);
                let nd = (near_x - center.x) * (near_x - center.x)
                    + (near_y - center.y) * (near_y - center.y);
                if nd > eff_sq {
                    continue;
                }

                let lx0 = (min_px - origin_x).clamp(0, ts - 1) as u32;
                let lx1 = (max_px - origin_x).clamp(0, ts - 1) as u32;
                let ly0 = (min_py - origin_y).clamp(0, ts - 1) as u32;
                let ly1 = (max_py - origin_y).clamp(0, ts - 1) as u32;

                let tile = store.get_or_create(TileCoord::new(txx as i32, tyy as i32));
                let buf = tile.pixels_mut();
                let mut wrote = false;

                for ly in ly0..=ly1 {
                    let dy = (origin_y + ly as i64) as f32 + 0.5 - center.y;
                    let dy_sq = dy * dy;
                    for lx in lx0..=lx1 {
                        let dx = (origin_x + lx as i64) as f32 + 0.5 - center.x;
                        let dist_sq = dx * dx + dy_sq;
                        if dist_sq > eff_sq {
                            continue;
                        }
                        let cov = self.lut[(dist_sq * inv_eff_sq * 255.0).min(255.0) as usize];
                        if cov == 0 {
                            continue;
                        }
                        // Stamp strength at this pixel, quantised once so a
                        // later erase of the same stamp cancels exactly.
                        let k = (cov as f32 * opacity).round() as u8;
                        if k == 0 {
                            continue;
                        }
                        let px = buf.get_pixel_mut(lx, ly);
                        if is_eraser {
                            erase_pixel(px, k);
                        } else {
                            paint_pixel(px, params.color, k);
                        }
                        wrote = true;
                    }
                }
                if wrote {
                    tile.mark_written();
                }
            }
        }
    }

    /// Stamp along the segment from `from` to `to` with a spacing of at
    /// most half the brush radius, so fast drags don't leave gaps. The
    /// starting point itself is assumed already stamped.
    pub fn stroke_between(
        &mut self,
        store: &mut TileStore,
        from: Pos2,
        to: Pos2,
        params: &StrokeParams,
    ) {
        if !from.x.is_finite() || !from.y.is_finite() || !to.x.is_finite() || !to.y.is_finite() {
            return;
        }
        let delta = to - from;
        let dist = delta.length();
        if dist <= f32::EPSILON {
            return;
        }
        let step = (params.radius * 0.5).max(0.5);
        let n = (dist / step).ceil().max(1.0) as u32;
        for i in 1..=n {
            let t = i as f32 / n as f32;
            self.stamp(store, from + delta * t, params);
        }
    }

    /// Rasterize a whole stroke segment (consumed). Per-point pressure
    /// scales the stamp radius. Empty and degenerate segments are no-ops.
    pub fn rasterize(&mut self, store: &mut TileStore, segment: StrokeSegment, params: &StrokeParams) {
        let mut prev: Option<(Pos2, f32)> = None;
        for (pos, pressure) in segment.points {
            if !pos.x.is_finite() || !pos.y.is_finite() {
                continue;
            }
            let scaled = StrokeParams {
                radius: (params.radius * pressure).max(0.25),
                ..*params
            };
            match prev {
                None => self.stamp(store, pos, &scaled),
                Some((last, _)) => self.stroke_between(store, last, pos, &scaled),
            }
            prev = Some((pos, pressure));
        }
    }

    /// Commit a shape-tool gesture as a single write batch: stamped outline
    /// of the line / rectangle / ellipse spanned by `start` → `end`.
    pub fn commit_shape(
        &mut self,
        store: &mut TileStore,
        start: Pos2,
        end: Pos2,
        params: &StrokeParams,
    ) {
        if !start.x.is_finite() || !start.y.is_finite() || !end.x.is_finite() || !end.y.is_finite()
        {
            return;
        }
        match params.tool {
            ToolKind::Line => {
                self.stamp(store, start, params);
                self.stroke_between(store, start, end, params);
            }
            ToolKind::Rectangle => {
                let a = start;
                let b = Pos2::new(end.x, start.y);
                let c = end;
                let d = Pos2::new(start.x, end.y);
                self.stamp(store, a, params);
                self.stroke_between(store, a, b, params);
                self.stroke_between(store, b, c, params);
                self.stroke_between(store, c, d, params);
                self.stroke_between(store, d, a, params);
            }
            ToolKind::Circle => {
                // Ellipse inscribed in the drag rectangle.
                let cx = (start.x + end.x) * 0.5;
                let cy = (start.y + end.y) * 0.5;
                let rx = (end.x - start.x).abs() * 0.5;
                let ry = (end.y - start.y).abs() * 0.5;
                if rx < 0.5 && ry < 0.5 {
                    self.stamp(store, Pos2::new(cx, cy), params);
                    return;
                }
                // Ramanujan perimeter approximation; chord spacing at most
                // half the brush radius keeps the outline gap-free.
                let h = ((rx - ry) * (rx - ry)) / ((rx + ry) * (rx + ry)).max(f32::EPSILON);
                let perimeter = std::f32::consts::PI
                    * (rx + ry)
                    * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt()));
                let step = (params.radius * 0.5).max(0.5);
                let n = ((perimeter / step).ceil() as u32).max(8);
                for i in 0..n {
                    let angle = i as f32 / n as f32 * std::f32::consts::TAU;
                    let p = Pos2::new(cx + rx * angle.cos(), cy + ry * angle.sin());
                    self.stamp(store, p, params);
                }
            }
            _ => {}
        }
    }
}

/// Blend one painted stamp pixel: `new = lerp(existing, color, k/255)`.
/// Fully transparent destinations take the stroke color directly (their
/// RGB is undefined and must not bleed into the result).
fn paint_pixel(px: &mut Rgba<u8>, color: [u8; 3], k: u8) {
    if px.0[3] == 0 {
        px.0 = [color[0], color[1], color[2], k];
        return;
    }
    let t = k as f32 / 255.0;
    let lerp = |old: u8, new: u8| -> u8 { (old as f32 + (new as f32 - old as f32) * t).round() as u8 };
    px.0 = [
        lerp(px.0[0], color[0]),
        lerp(px.0[1], color[1]),
        lerp(px.0[2], color[2]),
        lerp(px.0[3], 255),
    ];
}

/// Erase by subtracting stamp strength from alpha. An erase stamp with the
/// same radius/opacity as a fresh paint stamp cancels it exactly, pixel
/// for pixel, including the antialiased edge.
fn erase_pixel(px: &mut Rgba<u8>, k: u8) {
    let a = px.0[3].saturating_sub(k);
    if a == 0 {
        px.0 = [0, 0, 0, 0];
    } else {
        px.0[3] = a;
    }
}

// ============================================================================
// GESTURE STATE MACHINE
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum GesturePhase {
    #[default]
    Idle,
    /// Incremental rasterization; `last` is the most recent stamped point.
    Freehand { last: Pos2 },
    /// Transient preview; nothing is committed to tiles until release.
    Shape { start: Pos2, current: Pos2 },
}

/// Per-gesture two-state machine: freehand tools write tiles on every
/// move, shape tools stay in a "previewing" state and produce exactly one
/// committed write batch on release. A cancelled gesture (pointer leaves
/// the canvas, tool switch mid-drag) discards the preview without
/// touching any tile.
#[derive(Default)]
pub struct StrokeEngine {
    raster: Rasterizer,
    phase: GesturePhase,
}

impl StrokeEngine {
    pub fn is_active(&self) -> bool {
        self.phase != GesturePhase::Idle
    }

    /// The in-progress shape preview, if any, as `(start, current)` in
    /// canvas coordinates. Drawn by the UI as a screen-space overlay.
    pub fn shape_preview(&self) -> Option<(Pos2, Pos2)> {
        match self.phase {
            GesturePhase::Shape { start, current } => Some((start, current)),
            _ => None,
        }
    }

    /// Returns true if any tile was (possibly) modified.
    pub fn pointer_down(
        &mut self,
        store: &mut TileStore,
        pos: Pos2,
        params: &StrokeParams,
    ) -> bool {
        if !pos.x.is_finite() || !pos.y.is_finite() {
            return false;
        }
        if params.tool.is_shape() {
            self.phase = GesturePhase::Shape {
                start: pos,
                current: pos,
            };
            false
        } else {
            self.raster.stamp(store, pos, params);
            self.phase = GesturePhase::Freehand { last: pos };
            true
        }
    }

    pub fn pointer_move(
        &mut self,
        store: &mut TileStore,
        pos: Pos2,
        params: &StrokeParams,
    ) -> bool {
        if !pos.x.is_finite() || !pos.y.is_finite() {
            return false;
        }
        match &mut self.phase {
            GesturePhase::Idle => false,
            GesturePhase::Freehand { last } => {
                let from = *last;
                *last = pos;
                self.raster.stroke_between(store, from, pos, params);
                true
            }
            GesturePhase::Shape { current, .. } => {
                *current = pos;
                false
            }
        }
    }

    /// Finish the gesture. Shape tools commit their single write batch
    /// here; freehand tools stroke the final span.
    pub fn pointer_up(&mut self, store: &mut TileStore, pos: Pos2, params: &StrokeParams) -> bool {
        let phase = std::mem::take(&mut self.phase);
        match phase {
            GesturePhase::Idle => false,
            GesturePhase::Freehand { last } => {
                if pos.x.is_finite() && pos.y.is_finite() {
                    self.raster.stroke_between(store, last, pos, params);
                }
                true
            }
            GesturePhase::Shape { start, .. } => {
                // A release with no usable position means the pointer was
                // lost mid-gesture; the preview is discarded, not committed.
                if !pos.x.is_finite() || !pos.y.is_finite() {
                    return false;
                }
                self.raster.commit_shape(store, start, pos, params);
                true
            }
        }
    }

    /// Abort the gesture without committing anything.
    pub fn cancel(&mut self) {
        self.phase = GesturePhase::Idle;
    }

    /// Direct access for non-gesture rasterization (synthetic input,
    /// tests).
    pub fn rasterizer(&mut self) -> &mut Rasterizer {
        &mut self.raster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::store::TileBudgetCurve;

    fn store() -> TileStore {
        TileStore::new(256, TileBudgetCurve::default(), 25)
    }

    fn brush(radius: f32) -> StrokeParams {
        StrokeParams {
            tool: ToolKind::Brush,
            radius,
            opacity: 1.0,
            color: [10, 20, 200],
        }
    }

    fn alpha_at(store: &TileStore, coord: TileCoord, x: u32, y: u32) -> u8 {
        store
            .try_get(coord)
            .map(|t| t.pixels().get_pixel(x, y).0[3])
            .unwrap_or(0)
    }

    #[test]
    fn size_curve_is_monotonic_and_bounded() {
        let curve = BrushSizeCurve::default();
        let mut last = curve.radius(0.0);
        assert!((last - curve.min_radius).abs() < 1e-5);
        for i in 1..=100 {
            let r = curve.radius(i as f32 / 100.0);
            assert!(r >= last, "curve not monotonic at t={}", i);
            last = r;
        }
        assert!((last - curve.max_radius).abs() < 1e-3);
        // Gamma > 1: the first half of the slider covers less than half the range.
        assert!(curve.radius(0.5) < (curve.min_radius + curve.max_radius) / 2.0);
    }

    #[test]
    fn interior_click_touches_exactly_one_tile() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        raster.stamp(&mut store, Pos2::new(128.0, 128.0), &brush(10.0));
        let touched: Vec<TileCoord> = store.iter().filter(|(_, t)| !t.is_empty()).map(|(c, _)| c).collect();
        assert_eq!(touched, vec![TileCoord::new(0, 0)]);
    }

    #[test]
    fn click_near_origin_stamps_soft_circle() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        raster.stamp(&mut store, Pos2::new(5.0, 5.0), &brush(10.0));

        let tile = TileCoord::new(0, 0);
        assert!(!store.try_get(tile).unwrap().is_empty());
        // Center is solid, the soft edge fades, outside is untouched.
        assert_eq!(alpha_at(&store, tile, 5, 5), 255);
        assert!(alpha_at(&store, tile, 13, 5) > 0);
        assert_eq!(alpha_at(&store, tile, 40, 5), 0);
        // Soft falloff: strictly weaker towards the rim.
        assert!(alpha_at(&store, tile, 12, 5) >= alpha_at(&store, tile, 13, 5));
    }

    #[test]
    fn stamp_crossing_tile_boundary_writes_both_tiles() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        raster.stamp(&mut store, Pos2::new(256.0, 10.0), &brush(6.0));
        assert!(!store.try_get(TileCoord::new(0, 0)).unwrap().is_empty());
        assert!(!store.try_get(TileCoord::new(1, 0)).unwrap().is_empty());
    }

    #[test]
    fn negative_coordinates_rasterize_consistently() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        raster.stamp(&mut store, Pos2::new(-128.5, -128.5), &brush(5.0));
        let touched: Vec<TileCoord> = store.iter().filter(|(_, t)| !t.is_empty()).map(|(c, _)| c).collect();
        assert_eq!(touched, vec![TileCoord::new(-1, -1)]);
    }

    #[test]
    fn paint_then_erase_same_stamp_restores_transparency() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        let center = Pos2::new(77.5, 91.25);
        let paint = brush(10.0);
        let erase = StrokeParams {
            tool: ToolKind::Eraser,
            ..paint
        };
        raster.stamp(&mut store, center, &paint);
        raster.stamp(&mut store, center, &erase);
        for (coord, tile) in store.iter() {
            for p in tile.pixels().pixels() {
                assert_eq!(p.0[3], 0, "residual alpha in tile {coord:?}");
            }
        }
    }

    #[test]
    fn pen_has_hard_edge() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        let params = StrokeParams {
            tool: ToolKind::Pen,
            radius: 8.0,
            opacity: 1.0,
            color: [0, 0, 0],
        };
        raster.stamp(&mut store, Pos2::new(100.5, 100.5), &params);
        let tile = store.try_get(TileCoord::new(0, 0)).unwrap();
        for p in tile.pixels().pixels() {
            assert!(p.0[3] == 0 || p.0[3] == 255, "pen produced partial alpha");
        }
    }

    #[test]
    fn nan_and_zero_length_input_is_ignored() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        raster.stamp(&mut store, Pos2::new(f32::NAN, 5.0), &brush(10.0));
        raster.stroke_between(
            &mut store,
            Pos2::new(5.0, f32::NAN),
            Pos2::new(10.0, 10.0),
            &brush(10.0),
        );
        raster.stroke_between(
            &mut store,
            Pos2::new(10.0, 10.0),
            Pos2::new(10.0, 10.0),
            &brush(10.0),
        );
        assert!(store.iter().all(|(_, t)| t.is_empty()));
    }

    #[test]
    fn fast_drag_leaves_no_gaps() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        let params = brush(4.0);
        raster.stamp(&mut store, Pos2::new(10.0, 50.0), &params);
        raster.stroke_between(&mut store, Pos2::new(10.0, 50.0), Pos2::new(200.0, 50.0), &params);
        let tile = store.try_get(TileCoord::new(0, 0)).unwrap();
        for x in 10..=200 {
            assert!(
                tile.pixels().get_pixel(x, 50).0[3] > 0,
                "gap at x={x} along the stroke"
            );
        }
    }

    #[test]
    fn pressure_scales_stamp_radius() {
        let mut store_full = store();
        let mut store_light = store();
        let mut raster = Rasterizer::default();
        let params = brush(12.0);

        let mut seg = StrokeSegment::new();
        seg.push(Pos2::new(64.0, 64.0), Some(1.0));
        raster.rasterize(&mut store_full, seg, &params);

        let mut seg = StrokeSegment::new();
        seg.push(Pos2::new(64.0, 64.0), Some(0.25));
        raster.rasterize(&mut store_light, seg, &params);

        let tile = TileCoord::new(0, 0);
        // Full pressure reaches further out than quarter pressure.
        assert!(alpha_at(&store_full, tile, 74, 64) > 0);
        assert_eq!(alpha_at(&store_light, tile, 74, 64), 0);
    }

    #[test]
    fn shape_gesture_commits_exactly_once_on_release() {
        let mut store = store();
        let mut engine = StrokeEngine::default();
        let params = StrokeParams {
            tool: ToolKind::Line,
            radius: 3.0,
            opacity: 1.0,
            color: [0, 0, 0],
        };
        engine.pointer_down(&mut store, Pos2::new(0.5, 0.5), &params);
        for i in 1..=20 {
            engine.pointer_move(&mut store, Pos2::new(i as f32 * 5.0, 0.5), &params);
            assert!(
                store.iter().all(|(_, t)| t.is_empty()),
                "shape preview wrote tiles on pointer move"
            );
        }
        engine.pointer_up(&mut store, Pos2::new(100.0, 0.5), &params);
        assert!(store.iter().any(|(_, t)| !t.is_empty()));
        let tile = store.try_get(TileCoord::new(0, 0)).unwrap();
        assert!(tile.pixels().get_pixel(50, 0).0[3] > 0);
    }

    #[test]
    fn shape_release_with_lost_pointer_commits_nothing() {
        let mut store = store();
        let mut engine = StrokeEngine::default();
        let params = StrokeParams {
            tool: ToolKind::Rectangle,
            radius: 3.0,
            opacity: 1.0,
            color: [0, 0, 0],
        };
        engine.pointer_down(&mut store, Pos2::new(10.0, 10.0), &params);
        engine.pointer_move(&mut store, Pos2::new(80.0, 60.0), &params);
        // Pointer leaves the canvas: the release carries no usable position.
        let wrote = engine.pointer_up(&mut store, Pos2::new(f32::NAN, f32::NAN), &params);
        assert!(!wrote);
        assert!(!engine.is_active());
        assert!(store.iter().all(|(_, t)| t.is_empty()));
    }

    #[test]
    fn long_drag_stays_within_tile_budget() {
        use crate::canvas::view::ViewState;
        use egui::Vec2;

        let budget = TileBudgetCurve {
            base_limit: 10,
            ..TileBudgetCurve::default()
        };
        let mut store = TileStore::new(64, budget, 5);
        let mut view = ViewState::new(0.05, 10.0);
        view.viewport = Vec2::new(64.0, 64.0);
        let target = budget.max_tiles(view.zoom());

        let mut engine = StrokeEngine::default();
        let params = brush(4.0);
        engine.pointer_down(&mut store, Pos2::new(0.0, 32.0), &params);

        // One continuous horizontal drag across hundreds of tiles, running
        // the cleanup pass whenever the allocation counter says it's due.
        let mut passes = 0;
        let mut peak = store.len();
        for i in 1..=600 {
            engine.pointer_move(&mut store, Pos2::new(i as f32 * 64.0, 32.0), &params);
            peak = peak.max(store.len());
            if store.eviction_due() {
                store.evict_if_needed(&view);
                if store.len() > target {
                    store.evict_aggressively(target);
                }
                passes += 1;
            }
        }
        engine.pointer_up(&mut store, Pos2::new(601.0 * 64.0, 32.0), &params);

        assert!(passes > 0, "cleanup trigger never fired during the drag");
        assert!(
            store.len() <= target,
            "resident {} exceeds budget {} after cleanup passes",
            store.len(),
            target
        );
        // Between passes residency may overshoot by at most one cleanup
        // interval's worth of fresh tiles, never grow unboundedly.
        assert!(
            peak <= target + 5 * 3,
            "peak resident {peak} vs budget {target}"
        );
    }

    #[test]
    fn cancelled_shape_gesture_writes_nothing() {
        let mut store = store();
        let mut engine = StrokeEngine::default();
        let params = StrokeParams {
            tool: ToolKind::Rectangle,
            radius: 3.0,
            opacity: 1.0,
            color: [0, 0, 0],
        };
        engine.pointer_down(&mut store, Pos2::new(10.0, 10.0), &params);
        engine.pointer_move(&mut store, Pos2::new(80.0, 60.0), &params);
        assert!(engine.shape_preview().is_some());
        engine.cancel();
        assert!(!engine.is_active());
        assert!(store.iter().all(|(_, t)| t.is_empty()));
    }

    #[test]
    fn rectangle_outline_is_not_filled() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        let params = StrokeParams {
            tool: ToolKind::Rectangle,
            radius: 2.0,
            opacity: 1.0,
            color: [255, 0, 0],
        };
        raster.commit_shape(&mut store, Pos2::new(20.0, 20.0), Pos2::new(120.0, 120.0), &params);
        let tile = store.try_get(TileCoord::new(0, 0)).unwrap();
        assert!(tile.pixels().get_pixel(20, 70).0[3] > 0, "left edge missing");
        assert_eq!(tile.pixels().get_pixel(70, 70).0[3], 0, "interior was filled");
    }

    #[test]
    fn circle_outline_is_closed() {
        let mut store = store();
        let mut raster = Rasterizer::default();
        let params = StrokeParams {
            tool: ToolKind::Circle,
            radius: 3.0,
            opacity: 1.0,
            color: [0, 0, 0],
        };
        raster.commit_shape(&mut store, Pos2::new(50.0, 50.0), Pos2::new(150.0, 150.0), &params);
        let tile = store.try_get(TileCoord::new(0, 0)).unwrap();
        // Sample the four cardinal points of the inscribed circle.
        for (x, y) in [(100, 50), (100, 150), (50, 100), (150, 100)] {
            assert!(tile.pixels().get_pixel(x, y).0[3] > 0, "gap at ({x},{y})");
        }
        assert_eq!(tile.pixels().get_pixel(100, 100).0[3], 0);
    }
}
