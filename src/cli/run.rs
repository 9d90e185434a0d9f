//! Run command implementation

use crate::cli::output::format_run_summary;
use crate::cli::RunArgs;
use crate::config::{HardwareBackend, InspectorConfig, LogFormat, LoggingConfig};
use crate::controller::{Controller, InspectionPipeline};
use crate::display::{Display, TracingDisplay};
use crate::hardware;
use crate::imaging::ImagePipeline;
use crate::network::NetworkMonitor;
use std::path::Path;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load a config file if present, else defaults, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<InspectorConfig, Box<dyn std::error::Error>> {
    let config = if path.exists() {
        InspectorConfig::load(Some(path))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        InspectorConfig::default()
    };
    Ok(config.with_env_overrides())
}

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &RunArgs,
) -> Result<InspectorConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;

    if args.simulate {
        config.hardware.backend = HardwareBackend::Simulated;
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_network_check {
        config.network.enabled = false;
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Tick the controller until `cancel_token` fires.
///
/// A failed tick is counted and surfaced, never fatal.
pub async fn drive(controller: &mut Controller, period: std::time::Duration, cancel_token: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = controller.tick() {
                    controller.record_fault(&e);
                }
            }
        }
    }
}

/// Main run command handler
pub async fn run_inspection(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and merge configuration
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    // 2. Initialize tracing
    init_tracing(&config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting inspection line");
    tracing::debug!(?config, "Loaded configuration");

    // 3. Claim hardware; failure here prevents startup
    let port = hardware::open(&config.hardware)?;

    // 4. Build the processing pipeline
    let display: Arc<dyn Display> = Arc::new(TracingDisplay::new());
    let pipeline = ImagePipeline::new(&config, Arc::clone(&display))?;
    tracing::info!(
        image_url = %config.endpoints.image_url,
        inference_url = %config.endpoints.inference_url,
        cache_mb = config.cache.max_size_mb,
        reuse_captures = config.cache.reuse_captures,
        "Image pipeline ready"
    );
    let processor = InspectionPipeline::new(
        pipeline,
        config.endpoints.image_url.clone(),
        config.ejection.clone(),
        Arc::clone(&display),
    )
    .with_prediction_logging(config.logging.log_predictions);

    let mut controller = Controller::new(
        port,
        Arc::new(processor),
        Arc::clone(&display),
        config.timing.clone(),
    );

    // 5. Network monitoring (if enabled)
    if config.network.enabled {
        tracing::info!(
            interval_seconds = config.network.interval_seconds,
            "Starting network monitor"
        );
        controller = controller.with_network(Arc::new(NetworkMonitor::new(&config)));
    } else {
        tracing::info!("Network checks disabled");
    }

    display.update_status_message("System ready - waiting for pieces", false, false);

    // 6. Control loop
    let cancel_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_signal(cancel_token.clone()));
    drive(&mut controller, config.timing.tick_interval(), cancel_token).await;
    signal_handle.abort();

    // 7. Cleanup: actuators off on every exit path
    tracing::info!("Shutting down");
    if let Err(e) = controller.shutdown(config.timing.shutdown_timeout()).await {
        tracing::error!(error = %e, "Hardware shutdown failed");
    }

    let metrics = controller.metrics();
    if let Err(e) = metrics.save_state(&config.state.path) {
        tracing::error!(path = %config.state.path.display(), error = %e, "Failed to save state");
    }
    println!("{}", format_run_summary(&metrics.snapshot()));

    tracing::info!("Inspection line stopped");
    Ok(())
}
