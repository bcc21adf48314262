//! guest_counter_server - HTTP service for zone guest counting
//!
//! This daemon:
//! 1. Loads the detector backend and opens the history store
//! 2. Serves `/process-image` and `/export/excel`
//! 3. Runs until Ctrl-C

use anyhow::{Context, Result};
use std::sync::{mpsc, Arc};

use guest_counter::{
    api::{ApiConfig, ApiServer},
    backend_from_config,
    config::ServerConfig,
    Detector, GuestCounter, JsonHistoryStore,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,multipart=warn"),
    )
    .init();

    let config = ServerConfig::load()?;
    let backend = backend_from_config(&config.detector).context("failed to build detector")?;
    let detector = Detector::from_boxed(backend);
    detector.warm_up().context("detector warm-up failed")?;
    log::info!("detector backend '{}' ready", detector.name());

    let store = Arc::new(JsonHistoryStore::open(&config.storage.history_path));
    let counter = Arc::new(GuestCounter::new(detector, store, &config.storage));
    counter
        .ensure_dirs()
        .context("failed to create uploads/results directories")?;

    let api_handle = ApiServer::new(ApiConfig::from_server_config(&config), counter).spawn()?;
    log::info!("guest counter api listening on {}", api_handle.addr);
    log::info!(
        "history at {}, uploads in {}, results in {}",
        config.storage.history_path.display(),
        config.storage.uploads_dir.display(),
        config.storage.results_dir.display()
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("guest_counter_server waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}
