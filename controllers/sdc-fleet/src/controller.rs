//! Main controller implementation.
//!
//! Connects to Kubernetes, the PowerFlex array and the installer gateway,
//! then runs the SdcFleet watcher next to the probe/metrics server.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::{FleetEngine, Reconciler};
use crate::watcher::Watcher;
use crds::SdcFleet;
use gateway_client::{GatewayClient, GatewayClientTrait};
use kube::{Api, Client};
use powerflex_client::{PowerFlexClient, PowerFlexClientTrait};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Main controller for SdcFleet resources.
pub struct Controller {
    fleet_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
    shutdown: CancellationToken,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing SDC Fleet Controller");

        let shutdown = CancellationToken::new();
        let metrics = Arc::new(Metrics::new()?);

        // Probes answer while the endpoints are still being validated
        let metrics_server = tokio::spawn(metrics::serve(config.metrics_addr, metrics.clone(), shutdown.clone()));

        let kube_client = Client::try_default().await?;

        let array = PowerFlexClient::new(
            config.powerflex.url.clone(),
            config.powerflex.username.clone(),
            config.powerflex.password.clone(),
            config.insecure,
        )?;
        info!("Validating PowerFlex credentials...");
        array.validate_credentials().await.map_err(|e| {
            error!("Failed to log in to PowerFlex at {}: {}", config.powerflex.url, e);
            ControllerError::PowerFlex(e)
        })?;

        let gateway = GatewayClient::new(
            config.gateway.url.clone(),
            config.gateway.username.clone(),
            config.gateway.password.clone(),
            config.insecure,
        )?;
        info!("Validating installer gateway credentials...");
        gateway.validate_login().await.map_err(|e| {
            error!("Failed to log in to the installer gateway at {}: {}", config.gateway.url, e);
            ControllerError::Gateway(e)
        })?;
        info!("PowerFlex and installer gateway connectivity established");

        let engine = FleetEngine::new(Arc::new(array), Arc::new(gateway), config.poll_interval);
        let fleet_api: Api<SdcFleet> = Api::namespaced(kube_client, &config.namespace);
        let reconciler = Arc::new(Reconciler::new(engine, fleet_api.clone(), metrics.clone(), shutdown.clone()));

        let watcher = Watcher::new(reconciler, fleet_api);
        let fleet_watcher = tokio::spawn(async move { watcher.watch_sdc_fleets().await });
        metrics.set_ready(true);

        Ok(Self {
            fleet_watcher,
            metrics_server,
            shutdown,
        })
    }

    /// Runs the controller until a task exits or the process is interrupted.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("SDC Fleet Controller running");

        let result = tokio::select! {
            result = &mut self.fleet_watcher => {
                result
                    .map_err(|e| ControllerError::Watch(format!("SdcFleet watcher panicked: {}", e)))
                    .and_then(|inner| inner)
            }
            result = &mut self.metrics_server => {
                result
                    .map_err(|e| ControllerError::Metrics(format!("metrics server panicked: {}", e)))
                    .and_then(|inner| inner)
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                Ok(())
            }
        };

        self.shutdown.cancel();
        self.fleet_watcher.abort();
        result
    }
}
