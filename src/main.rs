// GUI-subsystem binary: no console window is allocated on Windows.
#![windows_subsystem = "windows"]

use eframe::egui;

use tilepaint::app::TilePaintApp;
use tilepaint::logger;

fn main() -> Result<(), eframe::Error> {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("TilePaint"),
        ..Default::default()
    };

    eframe::run_native(
        "TilePaint",
        options,
        Box::new(|cc| Box::new(TilePaintApp::new(cc))),
    )
}
