//! SetuIO - command gateway daemon for a TCP-attached IMU

use setu_io::config::Config;
use setu_io::controller::HttpController;
use setu_io::error::{Error, Result};
use setu_io::orchestrator::Orchestrator;
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("SetuIO v0.2.0 starting...");

    // Get config path from args or default
    let config_path = env::args().nth(1).unwrap_or_else(|| "setu.toml".to_string());

    log::info!("Using config: {}", config_path);
    let config = Config::load(&config_path)?;

    // Build the orchestrator and register the HTTP adapter
    let orchestrator = Orchestrator::new();
    orchestrator.register_controller(Arc::new(HttpController::new(config.daemon.http_port)));

    if !orchestrator.start() {
        return Err(Error::Other("Orchestrator failed to start".to_string()));
    }

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!(
        "SetuIO running, commands on 0.0.0.0:{}. Press Ctrl-C to stop.",
        config.daemon.http_port
    );

    // Main loop - keep alive while the workers run
    let stats_interval = Duration::from_secs(config.daemon.stats_interval_secs);
    let mut last_stats = Instant::now();

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));

        if !stats_interval.is_zero() && last_stats.elapsed() >= stats_interval {
            orchestrator.log_statistics();
            last_stats = Instant::now();
        }
    }

    log::info!("Shutting down...");
    orchestrator.stop();
    orchestrator.dispose();

    log::info!("SetuIO stopped");
    Ok(())
}
