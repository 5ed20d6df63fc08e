//! SDC Fleet Controller
//!
//! Converges the PowerFlex storage data clients (SDCs) of a cluster with the
//! hosts declared in `SdcFleet` resources:
//! - installs SDCs on new hosts through the PowerFlex installer gateway
//! - renames and re-profiles existing SDCs
//! - unregisters SDCs of removed hosts
//! - reports one record per declared host in the resource status

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let config = ControllerConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting SDC Fleet Controller");
    info!("Configuration:");
    info!("  PowerFlex endpoint: {}", config.powerflex.url);
    info!("  Installer gateway: {}", config.gateway.url);
    info!("  Namespace: {}", config.namespace);
    info!("  Install poll interval: {:?}", config.poll_interval);
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
