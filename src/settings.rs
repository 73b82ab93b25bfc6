//! Persisted application settings.
//!
//! Stored as a plain `key=value` file so a corrupt or hand-edited entry
//! degrades to its default instead of discarding the whole file.

use std::path::PathBuf;

use egui::Color32;

use crate::canvas::{BrushSizeCurve, CanvasConfig, ResampleFilter, TileBudgetCurve};
use crate::log_warn;

/// User-facing settings plus the canvas policy knobs (tile size, zoom
/// bounds, tile budget, brush curve, resample filter).
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Dark UI theme.
    pub dark_mode: bool,
    /// Canvas background color shown behind unpainted regions.
    pub background: Color32,
    /// Resampling filter for the viewport composite.
    pub zoom_filter: ResampleFilter,
    /// Tile edge length in canvas pixels.
    pub tile_size: u32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Base resident-tile budget; scaled per zoom band by the budget curve.
    pub base_tile_limit: usize,
    /// Allocations between forced eviction passes.
    pub cleanup_interval: u32,
    /// Brush-size slider curve exponent.
    pub brush_gamma: f32,
    pub brush_min_radius: f32,
    pub brush_max_radius: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        let budget = TileBudgetCurve::default();
        let brush = BrushSizeCurve::default();
        Self {
            dark_mode: false,
            background: Color32::WHITE,
            zoom_filter: ResampleFilter::Auto,
            tile_size: 256,
            min_zoom: 0.05,
            max_zoom: 10.0,
            base_tile_limit: budget.base_limit,
            cleanup_interval: 25,
            brush_gamma: brush.gamma,
            brush_min_radius: brush.min_radius,
            brush_max_radius: brush.max_radius,
        }
    }
}

impl AppSettings {
    /// Build the canvas policy config from the persisted knobs.
    pub fn canvas_config(&self) -> CanvasConfig {
        CanvasConfig {
            tile_size: self.tile_size.clamp(16, 2048),
            min_zoom: self.min_zoom.max(0.001),
            max_zoom: self.max_zoom.max(self.min_zoom.max(0.001)),
            budget: TileBudgetCurve {
                base_limit: self.base_tile_limit.max(4),
                ..TileBudgetCurve::default()
            },
            cleanup_interval: self.cleanup_interval.max(1),
            brush_curve: BrushSizeCurve {
                gamma: self.brush_gamma.max(0.1),
                min_radius: self.brush_min_radius.max(0.25),
                max_radius: self.brush_max_radius.max(self.brush_min_radius.max(0.25)),
            },
            filter: self.zoom_filter,
        }
    }

    /// Path to the settings file.
    /// On Linux:   ~/.config/tilepaint/tilepaint_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\TilePaint\tilepaint_settings.cfg
    /// On macOS:   ~/Library/Application Support/TilePaint/tilepaint_settings.cfg
    /// Fallback:   same directory as the executable.
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("tilepaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("tilepaint_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| {
                    std::env::current_exe()
                        .ok()
                        .and_then(|p| p.parent().map(|d| d.to_string_lossy().into_owned()))
                        .unwrap_or_default()
                });
            let config_dir = PathBuf::from(appdata).join("TilePaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("tilepaint_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("TilePaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("tilepaint_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("tilepaint_settings.cfg")))
        }
    }

    /// Serialize a Color32 as "r,g,b"
    fn color_to_str(c: Color32) -> String {
        format!("{},{},{}", c.r(), c.g(), c.b())
    }

    /// Parse a Color32 from "r,g,b"
    fn str_to_color(s: &str) -> Option<Color32> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 3 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            Some(Color32::from_rgb(r, g, b))
        } else {
            None
        }
    }

    fn serialize(&self) -> String {
        let filter_str = match self.zoom_filter {
            ResampleFilter::Auto => "auto",
            ResampleFilter::Nearest => "nearest",
            ResampleFilter::Bilinear => "bilinear",
        };
        format!(
            "dark_mode={}\n\
             background={}\n\
             zoom_filter={filter_str}\n\
             tile_size={}\n\
             min_zoom={}\n\
             max_zoom={}\n\
             base_tile_limit={}\n\
             cleanup_interval={}\n\
             brush_gamma={}\n\
             brush_min_radius={}\n\
             brush_max_radius={}\n",
            self.dark_mode,
            Self::color_to_str(self.background),
            self.tile_size,
            self.min_zoom,
            self.max_zoom,
            self.base_tile_limit,
            self.cleanup_interval,
            self.brush_gamma,
            self.brush_min_radius,
            self.brush_max_radius,
        )
    }

    fn deserialize(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let val = val.trim();
            match key {
                "dark_mode" => s.dark_mode = val == "true",
                "background" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.background = c;
                    }
                }
                "zoom_filter" => {
                    s.zoom_filter = match val {
                        "nearest" => ResampleFilter::Nearest,
                        "bilinear" => ResampleFilter::Bilinear,
                        _ => ResampleFilter::Auto,
                    };
                }
                "tile_size" => {
                    if let Ok(v) = val.parse() {
                        s.tile_size = v;
                    }
                }
                "min_zoom" => {
                    if let Ok(v) = val.parse() {
                        s.min_zoom = v;
                    }
                }
                "max_zoom" => {
                    if let Ok(v) = val.parse() {
                        s.max_zoom = v;
                    }
                }
                "base_tile_limit" => {
                    if let Ok(v) = val.parse() {
                        s.base_tile_limit = v;
                    }
                }
                "cleanup_interval" => {
                    if let Ok(v) = val.parse() {
                        s.cleanup_interval = v;
                    }
                }
                "brush_gamma" => {
                    if let Ok(v) = val.parse() {
                        s.brush_gamma = v;
                    }
                }
                "brush_min_radius" => {
                    if let Ok(v) = val.parse() {
                        s.brush_min_radius = v;
                    }
                }
                "brush_max_radius" => {
                    if let Ok(v) = val.parse() {
                        s.brush_max_radius = v;
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk. Failures are logged, never fatal.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else {
            return;
        };
        if let Err(e) = std::fs::write(&path, self.serialize()) {
            log_warn!("Failed to save settings to {:?}: {}", path, e);
        }
    }

    /// Load settings from disk (returns defaults if file missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        Self::deserialize(&content)
    }
}
