use rail_map_studio::app::EditorApp;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title("Rail Map Studio"),
        ..Default::default()
    };
    eframe::run_native(
        "Rail Map Studio",
        options,
        Box::new(|cc| Ok(Box::new(EditorApp::new(cc)))),
    )
}
