//! R-Factor Scanner - momentum scanner for NSE F&O equities.
//!
//! Serves scan results over HTTP; see the library docs for the pipeline.

use anyhow::Result;
use rfactor_common::config::Config;
use rfactor_common::config_loader::check_modular_files;
use rfactor_common::logging::init_logging_with_exclusions;
use rfactor_scanner::ScannerService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration (files, then RFACTOR_* overrides)
    let config = Config::load_and_validate()?;

    // Initialize logging
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("R-Factor Scanner v{}", env!("CARGO_PKG_VERSION"));
    for (file, present) in check_modular_files(None) {
        tracing::debug!(file = %file, present, "Config file");
    }

    let service = ScannerService::new(config);

    // Log startup timing before entering main service loop
    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
