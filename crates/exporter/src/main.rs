//! CMON Exporter - Prometheus exporter for ClusterControl controllers
//!
//! Every scrape runs one collection cycle against the controller and
//! renders the result in the Prometheus text format.

use anyhow::Result;
use clap::Parser;
use exporter_lib::{
    api::{self, AppState},
    health::components,
    CmonClient, CollectionEngine, MetricDescriptors, StructuredLogger,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let args = config::Args::parse();
    args.validate()?;

    let controller = config::ControllerConfig::load()?;
    let client_config = match controller.client_config(&args) {
        Ok(client_config) => client_config,
        Err(e) => {
            error!(error = %e, "Missing controller credentials");
            return Err(e);
        }
    };
    info!(endpoint = %controller.endpoint, "Using connection endpoint");

    let logger = StructuredLogger::new(&controller.endpoint);
    let gateway = Arc::new(CmonClient::new(client_config)?);
    let engine = Arc::new(CollectionEngine::new(
        gateway,
        args.cycle_config(),
        logger.clone(),
    ));
    engine.health().register(components::CONTROLLER).await;
    engine.health().register(components::COREDUMP_PROBE).await;

    let descriptors = Arc::new(MetricDescriptors::new());
    let app_state = Arc::new(AppState::new(engine, descriptors, args.metrics_path.clone()));

    logger.log_startup(EXPORTER_VERSION, &args.listen_address, &args.metrics_path);

    tokio::select! {
        result = api::serve(&args.listen_address, app_state) => {
            // The listener only returns on failure
            let err = match result {
                Ok(()) => anyhow::anyhow!("HTTP server stopped unexpectedly"),
                Err(e) => e,
            };
            error!(error = %err, "HTTP server failed");
            Err(err)
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            Ok(())
        }
    }
}
