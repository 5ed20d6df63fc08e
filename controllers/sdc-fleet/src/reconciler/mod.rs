//! Reconciliation logic for SdcFleet resources.
//!
//! The fleet engine (`cycle`) and its building blocks know nothing about
//! Kubernetes. `Reconciler` wraps the engine: it picks apply or refresh,
//! guards deletion with a finalizer, writes the status subresource and
//! decides when to requeue.

pub mod cycle;
pub mod delete;
pub mod diagnostics;
pub mod diff;
pub mod fleet_error;
pub mod host;
pub mod install;
pub mod lookup;
pub mod mutate;
pub mod poller;
pub mod state;

#[cfg(test)]
mod cycle_test;

pub use cycle::FleetEngine;
pub use fleet_error::FleetError;

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::install::InstallState;
use crate::reconciler::state::client_count;
use chrono::Utc;
use crds::{DiagnosticRecord, FleetState, SdcFleet, SdcFleetStatus, SdcRecord, SDC_CLEANUP_FINALIZER};
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Requeue delay after a successful cycle; the next pass is a refresh
const REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 10),
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Which engine operation a pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleMode {
    Apply,
    Refresh,
}

/// Reconciles SdcFleet resources.
pub struct Reconciler {
    pub(crate) engine: FleetEngine,
    pub(crate) fleet_api: Api<SdcFleet>,
    pub(crate) metrics: Arc<Metrics>,
    /// Cancelled on shutdown; stops in-flight installer polling
    shutdown: CancellationToken,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    pub fn new(engine: FleetEngine, fleet_api: Api<SdcFleet>, metrics: Arc<Metrics>, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            fleet_api,
            metrics,
            shutdown,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Status patch with a PascalCase state, as the CRD schema expects.
    ///
    /// `lastReconciled` is stamped here; callers only send the patch when
    /// something else changed.
    pub(crate) fn create_fleet_status_patch(status: &SdcFleetStatus) -> serde_json::Value {
        let state_str = match status.state {
            FleetState::Pending => "Pending",
            FleetState::Reconciled => "Reconciled",
            FleetState::Failed => "Failed",
        };

        serde_json::json!({
            "status": {
                "state": state_str,
                "records": status.records,
                "clientCount": status.client_count,
                "diagnostics": status.diagnostics,
                "observedGeneration": status.observed_generation,
                "lastReconciled": Utc::now(),
            }
        })
    }

    /// Reconcile one SdcFleet.
    pub async fn reconcile_sdc_fleet(&self, fleet: &SdcFleet) -> Result<Action, ControllerError> {
        let resource_key = format!("{}/{}", fleet.namespace().unwrap_or_default(), fleet.name_any());
        let span = info_span!("reconcile", fleet = %resource_key, cycle = %Uuid::new_v4());
        self.reconcile_inner(fleet, &resource_key).instrument(span).await
    }

    async fn reconcile_inner(&self, fleet: &SdcFleet, resource_key: &str) -> Result<Action, ControllerError> {
        let name = fleet.name_any();
        let prior: Vec<SdcRecord> = fleet.status.as_ref().map(|s| s.records.clone()).unwrap_or_default();

        if fleet.metadata.deletion_timestamp.is_some() {
            return self.finalize(fleet, &name, resource_key, &prior).await;
        }

        if !has_finalizer(fleet) {
            info!("Adding finalizer {}", SDC_CLEANUP_FINALIZER);
            self.set_finalizers(&name, add_finalizer(fleet)).await?;
        }

        let mode = cycle_mode(fleet);
        let started = Instant::now();
        let report = match mode {
            CycleMode::Refresh => {
                debug!("Generation unchanged, refreshing {} recorded SDC(s)", prior.len());
                let report = self.engine.refresh(&fleet.spec, &prior).await;
                if matches!(report.result, Err(FleetError::Lookup(_))) {
                    info!("Recorded SDCs drifted from the array, running a full apply");
                    self.engine.apply(&fleet.spec, &prior, &self.shutdown.child_token()).await
                } else {
                    report
                }
            }
            CycleMode::Apply => self.engine.apply(&fleet.spec, &prior, &self.shutdown.child_token()).await,
        };
        self.metrics.cycle_duration.observe(started.elapsed().as_secs_f64());
        match report.install_outcome {
            Some(InstallState::InstallTriggered) => self.metrics.installs_triggered.inc(),
            Some(InstallState::Skipped) => self.metrics.installs_skipped.inc(),
            _ => {}
        }

        let diagnostics = report.diagnostics.to_records();
        let clean = report.is_clean();
        let status = match report.result {
            Ok(records) => SdcFleetStatus {
                state: if clean { FleetState::Reconciled } else { FleetState::Failed },
                client_count: client_count(&records),
                records,
                diagnostics,
                observed_generation: fleet.metadata.generation,
                last_reconciled: None,
            },
            Err(e) => {
                error!("Fleet cycle failed at {}: {}", e.step(), e);
                failed_status(fleet, prior, diagnostics)
            }
        };
        self.write_status(fleet, &name, &status).await?;

        if clean {
            self.metrics.reconciliations.with_label_values(&["reconciled"]).inc();
            self.reset_error(resource_key);
            info!("Fleet reconciled with {} client(s)", status.client_count);
            Ok(Action::requeue(REFRESH_INTERVAL))
        } else {
            self.metrics.reconciliations.with_label_values(&["failed"]).inc();
            Ok(self.requeue_after_failure(resource_key))
        }
    }

    /// Unregister every recorded SDC, then release the finalizer.
    async fn finalize(
        &self,
        fleet: &SdcFleet,
        name: &str,
        resource_key: &str,
        prior: &[SdcRecord],
    ) -> Result<Action, ControllerError> {
        if !has_finalizer(fleet) {
            return Ok(Action::await_change());
        }

        info!("SdcFleet is being deleted, unregistering {} record(s)", prior.len());
        let report = self.engine.teardown(prior).await;
        if let Err(e) = &report.result {
            warn!("Teardown failed, keeping finalizer: {}", e);
            let status = failed_status(fleet, prior.to_vec(), report.diagnostics.to_records());
            self.write_status(fleet, name, &status).await?;
            self.metrics.reconciliations.with_label_values(&["failed"]).inc();
            return Ok(self.requeue_after_failure(resource_key));
        }

        self.set_finalizers(name, remove_finalizer(fleet)).await?;
        self.metrics.reconciliations.with_label_values(&["deleted"]).inc();
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
        info!("Finalizer released");
        Ok(Action::await_change())
    }

    async fn set_finalizers(&self, name: &str, finalizers: Vec<String>) -> Result<(), ControllerError> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        self.fleet_api
            .patch(name, &PatchParams::apply("sdc-fleet-controller"), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    /// Patch the status subresource unless nothing but the timestamp would change
    async fn write_status(&self, fleet: &SdcFleet, name: &str, status: &SdcFleetStatus) -> Result<(), ControllerError> {
        if !status_changed(fleet.status.as_ref(), status) {
            debug!("Status unchanged, skipping patch");
            return Ok(());
        }
        let patch = Self::create_fleet_status_patch(status);
        self.fleet_api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    fn requeue_after_failure(&self, resource_key: &str) -> Action {
        self.increment_error(resource_key);
        let (backoff_seconds, error_count) = self.get_backoff_for_resource(resource_key);
        warn!(
            "Requeueing {} in {}s after {} consecutive failure(s)",
            resource_key, backoff_seconds, error_count
        );
        Action::requeue(Duration::from_secs(backoff_seconds))
    }

    /// Get backoff delay and error count for a resource
    pub fn get_backoff_for_resource(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(resource_key.to_string()).or_insert_with(BackoffState::new);
                (state.backoff.next_backoff().as_secs(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (60, 0)
            }
        }
    }

    /// Increment error count for a resource
    pub fn increment_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states
                .entry(resource_key.to_string())
                .or_insert_with(BackoffState::new)
                .increment_error();
        }
    }

    /// Reset error count for a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }
}

fn cycle_mode(fleet: &SdcFleet) -> CycleMode {
    match &fleet.status {
        Some(status)
            if status.state == FleetState::Reconciled
                && status.observed_generation.is_some()
                && status.observed_generation == fleet.metadata.generation =>
        {
            CycleMode::Refresh
        }
        _ => CycleMode::Apply,
    }
}

/// Failed status that keeps the records of the last successful cycle
fn failed_status(fleet: &SdcFleet, prior: Vec<SdcRecord>, diagnostics: Vec<DiagnosticRecord>) -> SdcFleetStatus {
    let previous = fleet.status.as_ref();
    SdcFleetStatus {
        state: FleetState::Failed,
        client_count: client_count(&prior),
        records: prior,
        diagnostics,
        observed_generation: previous.and_then(|s| s.observed_generation),
        last_reconciled: None,
    }
}

fn status_changed(current: Option<&SdcFleetStatus>, next: &SdcFleetStatus) -> bool {
    match current {
        None => true,
        Some(current) => {
            current.state != next.state
                || current.records != next.records
                || current.client_count != next.client_count
                || current.diagnostics != next.diagnostics
                || current.observed_generation != next.observed_generation
        }
    }
}

fn has_finalizer(fleet: &SdcFleet) -> bool {
    fleet.finalizers().iter().any(|f| f == SDC_CLEANUP_FINALIZER)
}

fn add_finalizer(fleet: &SdcFleet) -> Vec<String> {
    let mut finalizers = fleet.finalizers().to_vec();
    if !finalizers.iter().any(|f| f == SDC_CLEANUP_FINALIZER) {
        finalizers.push(SDC_CLEANUP_FINALIZER.to_string());
    }
    finalizers
}

fn remove_finalizer(fleet: &SdcFleet) -> Vec<String> {
    fleet
        .finalizers()
        .iter()
        .filter(|f| *f != SDC_CLEANUP_FINALIZER)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fleet_spec, sdc_host};

    fn fleet(generation: i64, status: Option<SdcFleetStatus>) -> SdcFleet {
        let mut fleet = SdcFleet::new("rack-a", fleet_spec(vec![sdc_host("10.0.0.21")]));
        fleet.metadata.namespace = Some("storage".to_string());
        fleet.metadata.generation = Some(generation);
        fleet.status = status;
        fleet
    }

    fn reconciled(observed_generation: i64) -> SdcFleetStatus {
        SdcFleetStatus {
            state: FleetState::Reconciled,
            observed_generation: Some(observed_generation),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_patch_uses_pascal_case_state() {
        let status = SdcFleetStatus {
            state: FleetState::Failed,
            records: vec![SdcRecord {
                declared_ip: Some("10.0.0.21".to_string()),
                is_sdc: true,
                sdc_id: "sdc-21".to_string(),
                ..Default::default()
            }],
            client_count: 1,
            observed_generation: Some(4),
            ..Default::default()
        };

        let patch = Reconciler::create_fleet_status_patch(&status);

        assert_eq!(patch["status"]["state"], "Failed");
        assert_eq!(patch["status"]["clientCount"], 1);
        assert_eq!(patch["status"]["observedGeneration"], 4);
        assert_eq!(patch["status"]["records"][0]["sdcId"], "sdc-21");
        assert!(patch["status"]["lastReconciled"].is_string());
    }

    #[test]
    fn test_cycle_mode_refreshes_only_settled_generation() {
        assert_eq!(cycle_mode(&fleet(3, None)), CycleMode::Apply);
        assert_eq!(cycle_mode(&fleet(3, Some(reconciled(2)))), CycleMode::Apply);
        assert_eq!(cycle_mode(&fleet(3, Some(reconciled(3)))), CycleMode::Refresh);

        let failed = SdcFleetStatus {
            state: FleetState::Failed,
            ..reconciled(3)
        };
        assert_eq!(cycle_mode(&fleet(3, Some(failed))), CycleMode::Apply);
    }

    #[test]
    fn test_status_change_ignores_timestamp() {
        let mut current = reconciled(3);
        current.last_reconciled = Some(Utc::now());
        let next = reconciled(3);

        assert!(!status_changed(Some(&current), &next));
        assert!(status_changed(None, &next));
        assert!(status_changed(Some(&current), &reconciled(4)));
    }

    #[test]
    fn test_finalizer_helpers_keep_foreign_finalizers() {
        let mut fleet = fleet(1, None);
        fleet.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
        assert!(!has_finalizer(&fleet));

        let added = add_finalizer(&fleet);
        assert_eq!(added, vec!["example.com/other".to_string(), SDC_CLEANUP_FINALIZER.to_string()]);

        fleet.metadata.finalizers = Some(added);
        assert!(has_finalizer(&fleet));
        assert_eq!(remove_finalizer(&fleet), vec!["example.com/other".to_string()]);
    }

    #[test]
    fn test_failed_status_keeps_prior_records() {
        let prior = vec![SdcRecord {
            declared_ip: Some("10.0.0.21".to_string()),
            is_sdc: true,
            sdc_id: "sdc-21".to_string(),
            ..Default::default()
        }];
        let fleet = fleet(5, Some(reconciled(4)));

        let status = failed_status(&fleet, prior.clone(), Vec::new());

        assert_eq!(status.state, FleetState::Failed);
        assert_eq!(status.records, prior);
        assert_eq!(status.client_count, 1);
        assert_eq!(status.observed_generation, Some(4));
    }
}
