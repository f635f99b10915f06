mod app;
mod assistant;
mod chart;
mod engine;
mod event;
mod ingest;
mod session;
mod theme;

use app::TablechatApp;
use assistant::ProcessClient;
use eframe::egui;
use std::sync::mpsc;

fn endpoint_from_env() -> String {
    std::env::var("TABLECHAT_ENDPOINT")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| assistant::DEFAULT_ENDPOINT.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tablechat-runtime")
        .build()?;

    let client =
        runtime.block_on(async { ProcessClient::new(endpoint_from_env(), tx.clone()) })?;

    let app = TablechatApp::new(rx, client);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([1024.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Tablechat",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(app))),
    )?;

    Ok(())
}
