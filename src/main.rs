//! Main application for the video downloader GUI

use std::sync::Arc;

// eframe/egui for GUI application framework
use eframe::egui::Visuals;
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vidgrab::app::VidgrabApp;
use vidgrab::{ClientConfig, DownloadSessionController, HttpBackend};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Program entry point: initializes runtime and launches GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ClientConfig::load().unwrap_or_else(|e| {
        warn!("could not load configuration, using defaults: {}", e);
        ClientConfig::default()
    });
    info!("using backend {}", config.backend_url);

    let runtime = RUNTIME.get_or_try_init(Runtime::new)?;
    let handle = runtime.handle().clone();

    let backend = HttpBackend::new(&config)?;
    let controller = DownloadSessionController::new(Arc::new(backend), config, handle.clone());

    // Configure default native options for egui window
    let options = eframe::NativeOptions::default();
    let result = eframe::run_native(
        "YouTube Downloader",
        options,
        Box::new(move |cc| {
            // Use dark theme visuals
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(VidgrabApp::new(controller, handle))
        }),
    );
    if let Err(e) = &result {
        error!("window closed with error: {}", e);
    }
    result?;
    Ok(())
}
