use image::RgbaImage;
use rayon::prelude::*;

use super::store::TileStore;
use super::tile::{Tile, TileCoord};

/// Stitch every painted tile into one bounded raster sized to the union
/// of the painted tile extents.
///
/// An entirely empty canvas yields a 0×0 image rather than an error, so
/// callers can treat "nothing to save" as an ordinary result.
pub fn export_full_image(store: &TileStore) -> RgbaImage {
    let Some((min, max)) = store.painted_bounds() else {
        return RgbaImage::new(0, 0);
    };
    let ts = store.tile_size();
    let width = (max.tx - min.tx + 1) as u32 * ts;
    let height = (max.ty - min.ty + 1) as u32 * ts;

    let mut out = RgbaImage::new(width, height);
    let out_stride = width as usize * 4;
    let row_bytes = ts as usize * 4;

    for (coord, tile) in store.iter() {
        if tile.is_empty() {
            continue;
        }
        let base_x = (coord.tx - min.tx) as usize * ts as usize;
        let base_y = (coord.ty - min.ty) as usize * ts as usize;
        let src = tile.pixels().as_raw();
        let dst = out.as_mut();
        for row in 0..ts as usize {
            let src_start = row * row_bytes;
            let dst_start = (base_y + row) * out_stride + base_x * 4;
            dst[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }
    }
    out
}

/// Populate the store from a flat raster, anchored at canvas (0,0).
///
/// The existing document is dropped first. Tile conversion is parallelised
/// with rayon; fully transparent tiles are skipped so importing an image
/// with large transparent margins stays sparse.
pub fn import_image(store: &mut TileStore, src: &RgbaImage) {
    store.clear();
    let width = src.width();
    let height = src.height();
    if width == 0 || height == 0 {
        return;
    }
    let ts = store.tile_size();
    let tiles_x = (width + ts - 1) / ts;
    let tiles_y = (height + ts - 1) / ts;
    let src_raw = src.as_raw();
    let src_stride = width as usize * 4;

    let built: Vec<(TileCoord, RgbaImage)> = (0..tiles_x as usize * tiles_y as usize)
        .into_par_iter()
        .filter_map(|flat| {
            let tx = (flat % tiles_x as usize) as u32;
            let ty = (flat / tiles_x as usize) as u32;
            let base_x = tx * ts;
            let base_y = ty * ts;
            let copy_w = ts.min(width - base_x) as usize;
            let copy_h = ts.min(height - base_y);

            let tile_stride = ts as usize * 4;
            let mut data = vec![0u8; tile_stride * ts as usize];
            let mut has_content = false;

            for row in 0..copy_h as usize {
                let src_start = (base_y as usize + row) * src_stride + base_x as usize * 4;
                let dst_start = row * tile_stride;
                let byte_len = copy_w * 4;
                data[dst_start..dst_start + byte_len]
                    .copy_from_slice(&src_raw[src_start..src_start + byte_len]);
                if !has_content {
                    has_content = data[dst_start..dst_start + byte_len]
                        .chunks_exact(4)
                        .any(|px| px[3] != 0);
                }
            }

            if has_content {
                let pixels = RgbaImage::from_raw(ts, ts, data)
                    .expect("tile buffer size matches tile dimensions");
                Some((TileCoord::new(tx as i32, ty as i32), pixels))
            } else {
                None
            }
        })
        .collect();

    for (coord, pixels) in built {
        store.insert(coord, Tile::from_pixels(pixels));
    }
}
