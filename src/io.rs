use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use rfd::FileDialog;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::canvas::{Tile, TileCoord, TileStore};
use crate::{log_err, log_info};

// ============================================================================
// TPX PROJECT FILE FORMAT
// ============================================================================

/// Magic header for the sparse tiled project format (v1)
const TPX_MAGIC_V1: &str = "TPX1";

/// Largest accepted tile edge when loading a project file.
/// Prevents memory exhaustion from crafted files.
const MAX_TILE_SIZE: u32 = 2048;
/// Maximum number of tiles in a project file.
const MAX_TILES: usize = 1_000_000;

/// Serializable project file — sparse tiles keyed by signed grid coordinates.
#[derive(Serialize, Deserialize)]
struct ProjectFileV1 {
    magic: String,
    tile_size: u32,
    tiles: Vec<TileRecord>,
}

/// A single serialisable tile (`tile_size² × 4` bytes of RGBA data).
#[derive(Serialize, Deserialize)]
struct TileRecord {
    tx: i32,
    ty: i32,
    pixels: Vec<u8>,
}

/// Error type for TPX file operations
#[derive(Debug)]
pub enum TpxError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for TpxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TpxError::Io(e) => write!(f, "I/O error: {}", e),
            TpxError::Serialize(e) => write!(f, "Serialization error: {}", e),
            TpxError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl From<std::io::Error> for TpxError {
    fn from(e: std::io::Error) -> Self {
        TpxError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for TpxError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        TpxError::Serialize(e.to_string())
    }
}

/// Save a document as a .tpx project file. Only painted tiles are written,
/// so the on-disk size tracks the painted area, not the canvas extent.
pub fn save_tpx(store: &TileStore, path: &Path) -> Result<(), TpxError> {
    let tiles: Vec<TileRecord> = store
        .iter()
        .filter(|(_, tile)| !tile.is_empty())
        .map(|(coord, tile)| TileRecord {
            tx: coord.tx,
            ty: coord.ty,
            pixels: tile.pixels().as_raw().clone(),
        })
        .collect();

    let project = ProjectFileV1 {
        magic: TPX_MAGIC_V1.to_string(),
        tile_size: store.tile_size(),
        tiles,
    };

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &project)?;
    Ok(())
}

/// Load a .tpx project file into a fresh set of tiles.
///
/// Returns the tile size the file was saved with alongside the tiles; the
/// caller re-homes them into its store (tile sizes must match, the store
/// owns eviction bookkeeping).
pub fn load_tpx(path: &Path) -> Result<(u32, Vec<(TileCoord, Tile)>), TpxError> {
    let raw = std::fs::read(path)?;
    if raw.len() < 12 {
        return Err(TpxError::InvalidFormat("File too small".into()));
    }

    // bincode encodes a String as: 8-byte length prefix + UTF-8 data.
    // The magic string is 4 chars, so bytes 8..12 hold it.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != TPX_MAGIC_V1 {
        return Err(TpxError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }

    let project: ProjectFileV1 = bincode::deserialize(&raw)?;

    if project.tile_size == 0 || project.tile_size > MAX_TILE_SIZE {
        return Err(TpxError::InvalidFormat(format!(
            "Tile size {} outside supported range 1..={}",
            project.tile_size, MAX_TILE_SIZE
        )));
    }
    if project.tiles.len() > MAX_TILES {
        return Err(TpxError::InvalidFormat(format!(
            "Project contains {} tiles, which exceeds the maximum of {}",
            project.tiles.len(),
            MAX_TILES
        )));
    }

    let ts = project.tile_size;
    let expected_bytes = (ts as usize) * (ts as usize) * 4;

    let mut tiles = Vec::with_capacity(project.tiles.len());
    for record in project.tiles {
        if record.pixels.len() != expected_bytes {
            return Err(TpxError::InvalidFormat(format!(
                "Tile ({},{}) has {} bytes, expected {}",
                record.tx,
                record.ty,
                record.pixels.len(),
                expected_bytes,
            )));
        }
        let pixels = RgbaImage::from_raw(ts, ts, record.pixels).ok_or_else(|| {
            TpxError::InvalidFormat(format!(
                "Failed to reconstruct tile ({},{})",
                record.tx, record.ty
            ))
        })?;
        tiles.push((TileCoord::new(record.tx, record.ty), Tile::from_pixels(pixels)));
    }

    Ok((ts, tiles))
}

// ============================================================================
// IMAGE ENCODING
// ============================================================================

/// Save format derived from a file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
    Tpx,
}

impl SaveFormat {
    pub fn from_path(path: &Path) -> SaveFormat {
        match path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
            .as_str()
        {
            "jpg" | "jpeg" => SaveFormat::Jpeg,
            "bmp" => SaveFormat::Bmp,
            "tpx" => SaveFormat::Tpx,
            _ => SaveFormat::Png,
        }
    }
}

/// Encode and write a flat image to a file. Standalone (no `&mut self`) so
/// it can run on a background thread if saving ever moves off the UI thread.
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: SaveFormat) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            // JPEG doesn't support alpha, convert to RGB
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, 90);
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tpx => {
            unreachable!("TPX projects are saved via save_tpx(), not encode_and_write()");
        }
    }

    Ok(())
}

// ============================================================================
// FILE HANDLER
// ============================================================================

/// A loaded document: either a flat raster or a native sparse project.
pub enum LoadedDocument {
    Image(RgbaImage),
    Project { tile_size: u32, tiles: Vec<(TileCoord, Tile)> },
}

pub struct FileHandler {
    /// Current file path (None if new/unsaved document)
    pub current_path: Option<PathBuf>,
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHandler {
    pub fn new() -> Self {
        Self { current_path: None }
    }

    /// Show the native open dialog and load the chosen file.
    pub fn open_document(&mut self) -> Option<(LoadedDocument, PathBuf)> {
        let path = FileDialog::new()
            .add_filter("All Supported", &["tpx", "png", "jpg", "jpeg", "bmp"])
            .add_filter("TilePaint Project", &["tpx"])
            .add_filter("Images", &["png", "jpg", "jpeg", "bmp"])
            .add_filter("All Files", &["*"])
            .pick_file()?;

        let doc = match Self::load_document(&path) {
            Ok(doc) => doc,
            Err(e) => {
                log_err!("Failed to open {:?}: {}", path, e);
                return None;
            }
        };
        self.current_path = Some(path.clone());
        Some((doc, path))
    }

    /// Load a document from a known path without a dialog.
    pub fn load_document(path: &Path) -> Result<LoadedDocument, String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if ext == "tpx" {
            let (tile_size, tiles) = load_tpx(path).map_err(|e| e.to_string())?;
            log_info!("Loaded project {:?} ({} tiles @ {}px)", path, tiles.len(), tile_size);
            return Ok(LoadedDocument::Project { tile_size, tiles });
        }

        let img = image::open(path).map_err(|e| e.to_string())?.to_rgba8();
        log_info!("Loaded image {:?} ({}x{})", path, img.width(), img.height());
        Ok(LoadedDocument::Image(img))
    }

    /// Show the native save dialog and pick a target path.
    pub fn pick_save_path(&self) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .add_filter("PNG Image", &["png"])
            .add_filter("JPEG Image", &["jpg", "jpeg"])
            .add_filter("BMP Image", &["bmp"])
            .add_filter("TilePaint Project", &["tpx"])
            .set_file_name("untitled.png");
        if let Some(dir) = self.current_path.as_ref().and_then(|p| p.parent()) {
            dialog = dialog.set_directory(dir);
        }
        dialog.save_file()
    }

    /// Save a document to `path`, dispatching on the extension: `.tpx` keeps
    /// the sparse tiled form, image extensions get the stitched raster.
    pub fn save_document(&mut self, store: &TileStore, image: &RgbaImage, path: &Path) -> Result<(), String> {
        match SaveFormat::from_path(path) {
            SaveFormat::Tpx => save_tpx(store, path).map_err(|e| e.to_string())?,
            format => {
                if image.width() == 0 || image.height() == 0 {
                    return Err("Nothing to save: the canvas is empty".to_string());
                }
                encode_and_write(image, path, format).map_err(|e| e.to_string())?;
            }
        }
        self.current_path = Some(path.to_path_buf());
        log_info!("Saved {:?}", path);
        Ok(())
    }
}
