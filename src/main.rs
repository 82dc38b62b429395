// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
use anyhow::Context;
use datalogger::config::{ConfigStore, SessionConfig};
use datalogger::gui::DataloggerApp;
use eframe::egui;
use env_logger::Env;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let store = ConfigStore::default_location();
    let config = store.load().unwrap_or_else(|e| {
        log::warn!(
            "ignoring settings at {}: {e}",
            store.path().display()
        );
        SessionConfig::default()
    });
    let app = DataloggerApp::new(config, store).context("failed to start the session")?;

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1100.0, 700.0])
        .with_min_inner_size([800.0, 500.0])
        .with_title("Datalogger");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native("Datalogger", options, Box::new(move |_cc| Box::new(app)))
        .map_err(|e| anyhow::anyhow!("window closed with an error: {e}"))
}
