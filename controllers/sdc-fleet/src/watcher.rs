//! Kubernetes resource watcher.
//!
//! Drives `Reconciler::reconcile_sdc_fleet` from a `kube_runtime::Controller`
//! that reconnects on its own and keeps watching until shutdown.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::SdcFleet;
use futures::StreamExt;
use kube::Api;
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Generic watcher helper around `kube_runtime::Controller`.
///
/// `reconcile_fn` returns the requeue action for a resource; errors are
/// logged and requeued after a minute.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Action, ControllerError>> + Send>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = |obj: Arc<K>, error: &ControllerError, _ctx: Arc<Reconciler>| {
        error!("Reconciliation error for {} {:?}: {}", resource_name, obj, error);
        Action::requeue(Duration::from_secs(60))
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        let resource_name = resource_name.to_string();
        async move {
            debug!("Reconciling {} {:?}", resource_name, obj);
            reconcile_fn(ctx, obj).await.map_err(|e| {
                error!("Reconciliation failed for {}: {}", resource_name, e);
                e
            })
        }
    };

    // A fleet cycle can wait on the installer for a long time; keep the
    // number of fleets reconciled at once low.
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    info!("{} watcher stopped", resource_name);
    Ok(())
}

/// Watches SdcFleet resources.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    fleet_api: Api<SdcFleet>,
}

impl Watcher {
    pub fn new(reconciler: Arc<Reconciler>, fleet_api: Api<SdcFleet>) -> Self {
        Self { reconciler, fleet_api }
    }

    /// Starts watching SdcFleet resources.
    pub async fn watch_sdc_fleets(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.fleet_api.clone(),
            self.reconciler.clone(),
            |reconciler, resource| Box::pin(async move { reconciler.reconcile_sdc_fleet(&resource).await }),
            "SdcFleet",
        )
        .await
    }
}
