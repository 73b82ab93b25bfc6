use eframe::egui;
use egui::{
    Color32, ColorImage, Key, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Vec2,
};

use crate::canvas::{
    composite, export_full_image, import_image, CanvasConfig, ResampleFilter, StrokeEngine,
    StrokeParams, TileStore, ToolKind, ViewState,
};
use crate::io::{FileHandler, LoadedDocument};
use crate::settings::AppSettings;
use crate::{log_err, log_info, log_warn};

/// Palette shown in the toolbar.
const PALETTE: [[u8; 3]; 12] = [
    [0, 0, 0],
    [127, 127, 127],
    [136, 0, 21],
    [237, 28, 36],
    [255, 127, 39],
    [255, 242, 0],
    [34, 177, 76],
    [0, 162, 232],
    [63, 72, 204],
    [163, 73, 164],
    [255, 255, 255],
    [185, 122, 87],
];

pub struct TilePaintApp {
    store: TileStore,
    view: ViewState,
    engine: StrokeEngine,
    config: CanvasConfig,
    settings: AppSettings,
    file_handler: FileHandler,

    tool: ToolKind,
    color: [u8; 3],
    /// Brush size slider position (0..=1), mapped through the size curve.
    size_t: f32,
    opacity: f32,

    /// Viewport texture; recreated when the viewport size changes, updated
    /// in place otherwise.
    texture: Option<TextureHandle>,
    /// True while the primary button is held over the canvas.
    drawing: bool,
    status: String,
}

impl TilePaintApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        let config = settings.canvas_config();
        apply_theme(&cc.egui_ctx, settings.dark_mode);
        log_info!(
            "Canvas ready: {}px tiles, zoom {}..{}, budget {}",
            config.tile_size,
            config.min_zoom,
            config.max_zoom,
            config.budget.base_limit
        );
        Self {
            store: config.new_store(),
            view: config.new_view(),
            engine: StrokeEngine::default(),
            config: config.clone(),
            settings,
            file_handler: FileHandler::new(),
            tool: ToolKind::Pen,
            color: [0, 0, 0],
            size_t: 0.3,
            opacity: 1.0,
            texture: None,
            drawing: false,
            status: String::new(),
        }
    }

    fn stroke_params(&self) -> StrokeParams {
        StrokeParams {
            tool: self.tool,
            radius: self.config.brush_curve.radius(self.size_t),
            opacity: self.opacity,
            color: self.color,
        }
    }

    /// Normal eviction pass, with the aggressive LRU fallback when the
    /// visible set alone exceeds the budget and the pass can't help.
    fn enforce_budget(&mut self) {
        self.store.evict_if_needed(&self.view);
        let target = self.store.budget().max_tiles(self.view.zoom());
        if self.store.len() > target {
            let dropped = self.store.evict_aggressively(target);
            log_warn!("Memory pressure: dropped {} visible/dirty tiles", dropped);
        }
    }

    fn background(&self) -> Color32 {
        if self.settings.dark_mode {
            Color32::from_rgb(32, 33, 36)
        } else {
            self.settings.background
        }
    }

    // ------------------------------------------------------------------
    // File actions
    // ------------------------------------------------------------------

    fn save_document(&mut self) {
        let Some(path) = self.file_handler.pick_save_path() else {
            return;
        };
        let image = export_full_image(&self.store);
        match self.file_handler.save_document(&self.store, &image, &path) {
            Ok(()) => {
                self.status = format!("Saved {}", path.display());
            }
            Err(e) => {
                log_err!("Save failed: {}", e);
                self.status = format!("Save failed: {e}");
            }
        }
    }

    fn open_document(&mut self) {
        let Some((doc, path)) = self.file_handler.open_document() else {
            return;
        };
        self.engine.cancel();
        match doc {
            LoadedDocument::Image(img) => {
                import_image(&mut self.store, &img);
            }
            LoadedDocument::Project { tile_size, tiles } => {
                // Projects carry their own tile size; rebuild the store if
                // it differs from the current grid.
                if tile_size != self.store.tile_size() {
                    self.store =
                        TileStore::new(tile_size, self.config.budget, self.config.cleanup_interval);
                } else {
                    self.store.clear();
                }
                for (coord, tile) in tiles {
                    self.store.insert(coord, tile);
                }
            }
        }
        self.view.reset();
        self.status = format!("Opened {}", path.display());
    }

    fn clear_canvas(&mut self) {
        self.engine.cancel();
        self.store.clear();
        self.file_handler.current_path = None;
        self.status = "Canvas cleared".to_string();
    }

    // ------------------------------------------------------------------
    // Toolbar
    // ------------------------------------------------------------------

    fn toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            let tools = [
                (ToolKind::Pen, "✏", "Pen"),
                (ToolKind::Brush, "🖌", "Brush"),
                (ToolKind::Eraser, "🧽", "Eraser"),
                (ToolKind::Line, "📏", "Line"),
                (ToolKind::Rectangle, "⬜", "Rectangle"),
                (ToolKind::Circle, "⭕", "Circle"),
            ];
            for (kind, icon, name) in tools {
                let selected = self.tool == kind;
                if ui
                    .selectable_label(selected, icon)
                    .on_hover_text(name)
                    .clicked()
                    && !selected
                {
                    // Switching tools mid-gesture discards the preview.
                    self.engine.cancel();
                    self.tool = kind;
                }
            }

            ui.separator();

            for swatch in PALETTE {
                let selected = self.color == swatch;
                let (rect, response) =
                    ui.allocate_exact_size(Vec2::splat(18.0), Sense::click());
                let fill = Color32::from_rgb(swatch[0], swatch[1], swatch[2]);
                let stroke = if selected {
                    Stroke::new(2.0, ui.visuals().strong_text_color())
                } else {
                    Stroke::new(1.0, ui.visuals().weak_text_color())
                };
                ui.painter().rect(rect, 2.0, fill, stroke);
                if response.clicked() {
                    self.color = swatch;
                }
            }
            ui.color_edit_button_srgb(&mut self.color);

            ui.separator();

            ui.label("Size:");
            ui.add(egui::Slider::new(&mut self.size_t, 0.0..=1.0).show_value(false));
            // Live preview of the mapped radius next to the slider.
            let radius = self.config.brush_curve.radius(self.size_t);
            let preview = (radius * 2.0).clamp(2.0, 24.0);
            let (rect, _) = ui.allocate_exact_size(Vec2::splat(24.0), Sense::hover());
            ui.painter().circle_filled(
                rect.center(),
                preview / 2.0,
                Color32::from_rgb(self.color[0], self.color[1], self.color[2]),
            );
            ui.label(format!("{:.1}px", radius * 2.0));

            ui.label("Opacity:");
            ui.add(egui::Slider::new(&mut self.opacity, 0.05..=1.0).show_value(false));

            ui.separator();

            if ui.button("💾").on_hover_text("Save").clicked() {
                self.save_document();
            }
            if ui.button("📂").on_hover_text("Open").clicked() {
                self.open_document();
            }
            if ui.button("🗑").on_hover_text("Clear canvas").clicked() {
                self.clear_canvas();
            }
            let theme_icon = if self.settings.dark_mode { "☀" } else { "🌙" };
            if ui.button(theme_icon).on_hover_text("Toggle theme").clicked() {
                self.settings.dark_mode = !self.settings.dark_mode;
                apply_theme(ctx, self.settings.dark_mode);
                self.settings.save();
            }

            egui::ComboBox::from_id_source("resample_filter")
                .selected_text(self.config.filter.label())
                .width(80.0)
                .show_ui(ui, |ui| {
                    for filter in ResampleFilter::all() {
                        if ui
                            .selectable_label(self.config.filter == *filter, filter.label())
                            .clicked()
                        {
                            self.config.filter = *filter;
                            self.settings.zoom_filter = *filter;
                            self.settings.save();
                        }
                    }
                });

            ui.separator();
            ui.label(format!("{:.0}%", self.view.zoom() * 100.0));
            ui.label(format!("{} tiles", self.store.len()));
            if !self.status.is_empty() {
                ui.separator();
                ui.label(&self.status);
            }
        });
    }

    // ------------------------------------------------------------------
    // Canvas area
    // ------------------------------------------------------------------

    fn canvas_panel(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(
            ui.available_size(),
            Sense::click_and_drag().union(Sense::hover()),
        );
        let rect = response.rect;
        self.view.viewport = rect.size();

        let pointer = response
            .hover_pos()
            .or_else(|| response.interact_pointer_pos());
        let local = |pos: Pos2| Pos2::new(pos.x - rect.min.x, pos.y - rect.min.y);

        // Wheel zoom, anchored at the cursor.
        let scroll = ctx.input(|i| i.scroll_delta.y);
        if scroll != 0.0 && response.hovered() {
            if let Some(pos) = pointer {
                let factor = self.view.wheel_step(scroll > 0.0);
                self.view.zoom_about(factor, local(pos));
                self.enforce_budget();
            }
        }

        // Middle-drag pan.
        let middle_down = ctx.input(|i| i.pointer.middle_down());
        if response.dragged() && middle_down {
            self.view.pan_delta(response.drag_delta());
        }

        // Primary-button drawing.
        let primary_down = ctx.input(|i| i.pointer.primary_down());
        if primary_down && !middle_down {
            if let Some(pos) = pointer {
                let canvas_pos = self.view.screen_to_canvas(local(pos));
                let params = self.stroke_params();
                if !self.drawing {
                    self.drawing = true;
                    self.engine.pointer_down(&mut self.store, canvas_pos, &params);
                } else {
                    self.engine.pointer_move(&mut self.store, canvas_pos, &params);
                }
                // The periodic cleanup counter must fire mid-stroke too, or
                // one long drag grows residency without bound.
                if self.store.eviction_due() {
                    self.enforce_budget();
                }
            }
        } else if self.drawing {
            self.drawing = false;
            let params = self.stroke_params();
            let end = pointer
                .map(|pos| self.view.screen_to_canvas(local(pos)))
                .unwrap_or(Pos2::new(f32::NAN, f32::NAN));
            self.engine.pointer_up(&mut self.store, end, &params);
            if self.store.eviction_due() {
                self.enforce_budget();
            }
        }

        // Esc aborts an in-progress shape without committing.
        if self.engine.is_active() && ctx.input(|i| i.key_pressed(Key::Escape)) {
            self.engine.cancel();
            self.drawing = false;
        }

        // Composite the viewport and push it to the GPU.
        let image = composite(&self.store, &self.view, self.background(), self.config.filter);
        self.upload(ctx, image);
        self.store.mark_composited();

        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        self.draw_shape_preview(&painter, rect);

        if self.engine.is_active() {
            ctx.request_repaint();
        }
    }

    /// Screen-space outline of the in-progress shape gesture; nothing is
    /// rasterized until the pointer is released.
    fn draw_shape_preview(&self, painter: &egui::Painter, rect: Rect) {
        let Some((start, current)) = self.engine.shape_preview() else {
            return;
        };
        let to_screen = |p: Pos2| {
            let s = self.view.canvas_to_screen(p);
            Pos2::new(s.x + rect.min.x, s.y + rect.min.y)
        };
        let a = to_screen(start);
        let b = to_screen(current);
        let width = (self.config.brush_curve.radius(self.size_t) * 2.0 * self.view.zoom()).max(1.0);
        let color = Color32::from_rgba_unmultiplied(
            self.color[0],
            self.color[1],
            self.color[2],
            (self.opacity * 180.0) as u8,
        );
        let stroke = Stroke::new(width, color);

        match self.tool {
            ToolKind::Line => {
                painter.line_segment([a, b], stroke);
            }
            ToolKind::Rectangle => {
                painter.rect_stroke(Rect::from_two_pos(a, b), 0.0, stroke);
            }
            ToolKind::Circle => {
                let center = Pos2::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5);
                let rx = (b.x - a.x).abs() * 0.5;
                let ry = (b.y - a.y).abs() * 0.5;
                let n = 64;
                let points: Vec<Pos2> = (0..=n)
                    .map(|i| {
                        let t = i as f32 / n as f32 * std::f32::consts::TAU;
                        Pos2::new(center.x + rx * t.cos(), center.y + ry * t.sin())
                    })
                    .collect();
                painter.add(egui::Shape::line(points, stroke));
            }
            _ => {}
        }
    }

    fn upload(&mut self, ctx: &egui::Context, image: ColorImage) {
        // Resampling already happened in the compositor, so the GPU filter
        // stays nearest to avoid double-blurring.
        let options = TextureOptions::NEAREST;
        match &mut self.texture {
            Some(texture) if texture.size() == image.size => {
                texture.set(image, options);
            }
            _ => {
                self.texture = Some(ctx.load_texture("viewport", image, options));
            }
        }
    }
}

impl eframe::App for TilePaintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ctx, ui);
        });
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                self.canvas_panel(ctx, ui);
            });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.save();
        log_info!("Session ended");
    }
}

fn apply_theme(ctx: &egui::Context, dark: bool) {
    if dark {
        ctx.set_visuals(egui::Visuals::dark());
    } else {
        ctx.set_visuals(egui::Visuals::light());
    }
}
