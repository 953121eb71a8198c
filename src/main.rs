// ============================================================================
// OEKAKI BOARD - shared drawing board with a community gallery
// ============================================================================

mod app;
mod canvas;
mod cli;
mod components;
mod host;
#[macro_use]
pub mod logger;
mod playlist;
mod settings;
mod store;

use clap::Parser;

fn main() -> Result<(), eframe::Error> {
    let args = cli::CliArgs::parse();

    logger::init();
    log_info!("=== Oekaki Board started ===");
    log_info!("store: {} / collection '{}'", args.store_url, args.collection);

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1040.0, 900.0])
            .with_min_inner_size([560.0, 480.0])
            .with_title("Oekaki Board"),
        ..Default::default()
    };

    eframe::run_native(
        "Oekaki Board",
        options,
        Box::new(move |cc| Box::new(app::OekakiApp::new(cc, args))),
    )
}
