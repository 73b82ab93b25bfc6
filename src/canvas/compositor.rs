use egui::{Color32, ColorImage};
use rayon::prelude::*;

use super::store::TileStore;
use super::tile::{Tile, TileCoord};
use super::view::ViewState;

/// Resampling policy for the viewport composite.
///
/// `Auto` keeps hard pixel edges when zoomed in (pixel-art feel) and
/// switches to bilinear when zoomed out to avoid aliasing. The other two
/// pin the filter regardless of zoom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    #[default]
    Auto,
    Nearest,
    Bilinear,
}

impl ResampleFilter {
    fn bilinear_at(self, zoom: f32) -> bool {
        match self {
            ResampleFilter::Auto => zoom < 1.0,
            ResampleFilter::Nearest => false,
            ResampleFilter::Bilinear => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResampleFilter::Auto => "Auto",
            ResampleFilter::Nearest => "Nearest",
            ResampleFilter::Bilinear => "Bilinear",
        }
    }

    pub fn all() -> &'static [ResampleFilter] {
        &[
            ResampleFilter::Auto,
            ResampleFilter::Nearest,
            ResampleFilter::Bilinear,
        ]
    }
}

/// Read one canvas pixel through the sparse store. Consecutive samples on
/// a row usually land in the same tile, so the last lookup is cached to
/// keep the hash-map traffic per row close to one lookup per tile span.
#[inline]
fn canvas_pixel<'a>(
    store: &'a TileStore,
    ts: i64,
    gx: i64,
    gy: i64,
    cache: &mut Option<(TileCoord, Option<&'a Tile>)>,
) -> [u8; 4] {
    let coord = TileCoord::new(gx.div_euclid(ts) as i32, gy.div_euclid(ts) as i32);
    let tile = match cache {
        Some((cached_coord, cached_tile)) if *cached_coord == coord => *cached_tile,
        _ => {
            let tile = store.try_get(coord);
            *cache = Some((coord, tile));
            tile
        }
    };
    match tile {
        Some(tile) => {
            let lx = gx.rem_euclid(ts) as u32;
            let ly = gy.rem_euclid(ts) as u32;
            tile.pixels().get_pixel(lx, ly).0
        }
        // Absent tiles read as fully transparent.
        None => [0, 0, 0, 0],
    }
}

/// Assemble the tiles visible in `view` into a single flattened image
/// sized to the viewport.
///
/// Tiles are fetched read-only via `try_get`, so panning over unpainted
/// regions never allocates; absent tiles show the background color. Rows
/// are composited in parallel, and the cost is bounded by the viewport
/// pixel count, never by the canvas extent.
pub fn composite(
    store: &TileStore,
    view: &ViewState,
    background: Color32,
    filter: ResampleFilter,
) -> ColorImage {
    let w = (view.viewport.x.round() as usize).max(1);
    let h = (view.viewport.y.round() as usize).max(1);
    let zoom = view.zoom();
    let inv_zoom = 1.0 / zoom;
    let pan = view.pan;
    let ts = store.tile_size() as i64;
    let bilinear = filter.bilinear_at(zoom);

    let bg = [background.r(), background.g(), background.b()];
    let mut pixels = vec![Color32::TRANSPARENT; w * h];

    pixels
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            let canvas_y = pan.y + (y as f32 + 0.5) * inv_zoom;
            let mut cache: Option<(TileCoord, Option<&Tile>)> = None;

            for (x, out) in row.iter_mut().enumerate() {
                let canvas_x = pan.x + (x as f32 + 0.5) * inv_zoom;

                let src = if bilinear {
                    // Sample the four texels around the canvas point and
                    // blend by the fractional offsets. Texels may straddle
                    // tile boundaries; the per-row cache absorbs most of
                    // the extra lookups.
                    let sx = canvas_x - 0.5;
                    let sy = canvas_y - 0.5;
                    let x0 = sx.floor();
                    let y0 = sy.floor();
                    let fx = sx - x0;
                    let fy = sy - y0;
                    let x0 = x0 as i64;
                    let y0 = y0 as i64;
                    let p00 = canvas_pixel(store, ts, x0, y0, &mut cache);
                    let p10 = canvas_pixel(store, ts, x0 + 1, y0, &mut cache);
                    let p01 = canvas_pixel(store, ts, x0, y0 + 1, &mut cache);
                    let p11 = canvas_pixel(store, ts, x0 + 1, y0 + 1, &mut cache);
                    let mut blended = [0.0f32; 4];
                    for c in 0..4 {
                        let top = p00[c] as f32 + (p10[c] as f32 - p00[c] as f32) * fx;
                        let bot = p01[c] as f32 + (p11[c] as f32 - p01[c] as f32) * fx;
                        blended[c] = top + (bot - top) * fy;
                    }
                    [
                        blended[0] as u8,
                        blended[1] as u8,
                        blended[2] as u8,
                        blended[3] as u8,
                    ]
                } else {
                    canvas_pixel(
                        store,
                        ts,
                        canvas_x.floor() as i64,
                        canvas_y.floor() as i64,
                        &mut cache,
                    )
                };

                // Flatten straight-alpha source over the opaque background.
                let a = src[3] as f32 / 255.0;
                *out = Color32::from_rgb(
                    (bg[0] as f32 + (src[0] as f32 - bg[0] as f32) * a).round() as u8,
                    (bg[1] as f32 + (src[1] as f32 - bg[1] as f32) * a).round() as u8,
                    (bg[2] as f32 + (src[2] as f32 - bg[2] as f32) * a).round() as u8,
                );
            }
        });

    ColorImage {
        size: [w, h],
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::store::TileBudgetCurve;
    use egui::Vec2;
    use image::Rgba;

    fn store_with_pixel(x: u32, y: u32, color: [u8; 4]) -> TileStore {
        let mut store = TileStore::new(256, TileBudgetCurve::default(), 25);
        let tile = store.get_or_create(TileCoord::new(0, 0));
        tile.pixels_mut().put_pixel(x, y, Rgba(color));
        tile.mark_written();
        store
    }

    fn view(zoom: f32, w: f32, h: f32) -> ViewState {
        let mut view = ViewState::new(0.05, 10.0);
        view.viewport = Vec2::new(w, h);
        view.set_zoom(zoom);
        view
    }

    #[test]
    fn empty_store_composites_to_background() {
        let store = TileStore::new(256, TileBudgetCurve::default(), 25);
        let img = composite(
            &store,
            &view(1.0, 64.0, 32.0),
            Color32::from_rgb(250, 250, 250),
            ResampleFilter::Auto,
        );
        assert_eq!(img.size, [64, 32]);
        assert!(img.pixels.iter().all(|p| *p == Color32::from_rgb(250, 250, 250)));
        // Read-only compositing never allocated a tile.
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn painted_pixel_appears_at_transformed_position() {
        let store = store_with_pixel(10, 20, [255, 0, 0, 255]);
        let img = composite(
            &store,
            &view(1.0, 64.0, 64.0),
            Color32::WHITE,
            ResampleFilter::Auto,
        );
        assert_eq!(img.pixels[20 * 64 + 10], Color32::from_rgb(255, 0, 0));
        assert_eq!(img.pixels[0], Color32::WHITE);
    }

    #[test]
    fn nearest_filter_magnifies_without_blending() {
        let store = store_with_pixel(0, 0, [0, 0, 255, 255]);
        let img = composite(
            &store,
            &view(4.0, 16.0, 16.0),
            Color32::WHITE,
            ResampleFilter::Auto,
        );
        // The single canvas pixel covers a 4×4 screen block, hard-edged.
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(img.pixels[y * 16 + x], Color32::from_rgb(0, 0, 255));
            }
        }
        assert_eq!(img.pixels[4], Color32::WHITE);
        assert_eq!(img.pixels[4 * 16], Color32::WHITE);
    }

    #[test]
    fn bilinear_filter_blends_when_zoomed_out() {
        // Two adjacent canvas pixels, black and white; at zoom 0.5 the
        // sample point falls between them and must mix.
        let mut store = TileStore::new(256, TileBudgetCurve::default(), 25);
        let tile = store.get_or_create(TileCoord::new(0, 0));
        for y in 0..4 {
            tile.pixels_mut().put_pixel(0, y, Rgba([0, 0, 0, 255]));
            tile.pixels_mut().put_pixel(1, y, Rgba([255, 255, 255, 255]));
        }
        tile.mark_written();
        let img = composite(
            &store,
            &view(0.5, 8.0, 8.0),
            Color32::WHITE,
            ResampleFilter::Auto,
        );
        let p = img.pixels[8]; // screen (0,1) → canvas (1,3) area
        assert!(p.r() > 0 && p.r() < 255, "no blending at zoom < 1: {p:?}");
    }

    #[test]
    fn pan_offsets_the_view() {
        let store = store_with_pixel(10, 10, [0, 255, 0, 255]);
        let mut v = view(1.0, 32.0, 32.0);
        v.pan = Vec2::new(10.0, 10.0);
        let img = composite(&store, &v, Color32::WHITE, ResampleFilter::Auto);
        assert_eq!(img.pixels[0], Color32::from_rgb(0, 255, 0));
    }

    #[test]
    fn negative_canvas_regions_render_as_background() {
        let store = store_with_pixel(0, 0, [255, 0, 0, 255]);
        let mut v = view(1.0, 16.0, 16.0);
        v.pan = Vec2::new(-8.0, -8.0);
        let img = composite(&store, &v, Color32::WHITE, ResampleFilter::Auto);
        // Top-left quadrant is unpainted canvas at negative coordinates.
        assert_eq!(img.pixels[0], Color32::WHITE);
        // The painted origin pixel lands at screen (8,8).
        assert_eq!(img.pixels[8 * 16 + 8], Color32::from_rgb(255, 0, 0));
    }
}
