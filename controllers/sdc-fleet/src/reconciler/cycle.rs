//! Fleet engine: one reconciliation cycle over a declared host list.
//!
//! `apply` converges the array with the declared hosts: classify, delete
//! removed SDCs, install missing ones, mutate existing ones, then rebuild the
//! records. `refresh` only re-reads what is recorded. `teardown` unregisters
//! every recorded SDC.
//!
//! The engine knows nothing about Kubernetes; the reconciler feeds it the
//! resource spec and the records of the last successful cycle.

use crate::reconciler::delete::delete_removed;
use crate::reconciler::diagnostics::Diagnostics;
use crate::reconciler::diff::{prior_record, removed_records};
use crate::reconciler::fleet_error::FleetError;
use crate::reconciler::host::{validate_hosts, HostEntry};
use crate::reconciler::install::{BatchOrchestrator, InstallState, InstallationBatch};
use crate::reconciler::lookup::{find_client, LookupError, LookupKeys};
use crate::reconciler::mutate::apply_mutations;
use crate::reconciler::poller::{poll_until_terminal, PollSettings};
use crate::reconciler::state::{build_records, observe_client, ObservedClient};
use crds::{SdcFleetSpec, SdcRecord};
use gateway_client::GatewayClientTrait;
use powerflex_client::{ApprovalTarget, PowerFlexClientTrait, RestrictedSdcMode, Sdc, System};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one cycle
#[derive(Debug)]
pub struct CycleReport {
    /// Rebuilt records, or the fatal error that stopped the cycle
    pub result: Result<Vec<SdcRecord>, FleetError>,
    /// Everything reported along the way, the fatal error included
    pub diagnostics: Diagnostics,
    /// Where the installation state machine stopped, if it ran
    pub install: Option<InstallState>,
    /// `Skipped` or `InstallTriggered` once the batch got that far
    pub install_outcome: Option<InstallState>,
}

impl CycleReport {
    /// Succeeded without any error diagnostic
    pub fn is_clean(&self) -> bool {
        self.result.is_ok() && !self.diagnostics.has_errors()
    }
}

/// Reconciles declared hosts against one array and its installer
pub struct FleetEngine {
    array: Arc<dyn PowerFlexClientTrait>,
    gateway: Arc<dyn GatewayClientTrait>,
    poll_interval: Duration,
    /// Serializes use of the shared installer queue within this process
    installer_lease: Arc<Mutex<()>>,
}

impl std::fmt::Debug for FleetEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetEngine")
            .field("array", &self.array.endpoint())
            .field("gateway", &self.gateway.endpoint())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[derive(Debug, Default)]
struct InstallProgress {
    state: Option<InstallState>,
    outcome: Option<InstallState>,
}

/// Declared hosts split by what the cycle has to do with them
struct Classification {
    /// (entry index, SDC currently registered for it)
    registered: Vec<(usize, Sdc)>,
    /// Entry indexes with no SDC yet
    to_install: Vec<usize>,
}

impl FleetEngine {
    pub fn new(
        array: Arc<dyn PowerFlexClientTrait>,
        gateway: Arc<dyn GatewayClientTrait>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            array,
            gateway,
            poll_interval,
            installer_lease: Arc::new(Mutex::new(())),
        }
    }

    /// Converge the array with `spec`, starting from the `prior` records.
    pub async fn apply(&self, spec: &SdcFleetSpec, prior: &[SdcRecord], cancel: &CancellationToken) -> CycleReport {
        let mut diagnostics = Diagnostics::new();
        let mut progress = InstallProgress::default();
        let result = self.run_apply(spec, prior, cancel, &mut diagnostics, &mut progress).await;
        if let Err(e) = &result {
            diagnostics.error(e);
        }
        CycleReport {
            result,
            diagnostics,
            install: progress.state,
            install_outcome: progress.outcome,
        }
    }

    /// Re-read every recorded SDC and rebuild the records without changing anything.
    ///
    /// Fails with a lookup error when a recorded SDC no longer exists.
    pub async fn refresh(&self, spec: &SdcFleetSpec, prior: &[SdcRecord]) -> CycleReport {
        let mut diagnostics = Diagnostics::new();
        let result = self.run_refresh(spec, prior).await;
        if let Err(e) = &result {
            diagnostics.error(e);
        }
        CycleReport {
            result,
            diagnostics,
            install: None,
            install_outcome: None,
        }
    }

    /// Unregister every SDC in `prior`.
    pub async fn teardown(&self, prior: &[SdcRecord]) -> CycleReport {
        let mut diagnostics = Diagnostics::new();
        let recorded: Vec<&SdcRecord> = prior.iter().filter(|record| record.is_sdc).collect();
        info!("Tearing down {} recorded SDC(s)", recorded.len());
        let result = delete_removed(self.array.as_ref(), &recorded, &mut diagnostics)
            .await
            .map(|_| Vec::new());
        if let Err(e) = &result {
            diagnostics.error(e);
        }
        CycleReport {
            result,
            diagnostics,
            install: None,
            install_outcome: None,
        }
    }

    async fn run_apply(
        &self,
        spec: &SdcFleetSpec,
        prior: &[SdcRecord],
        cancel: &CancellationToken,
        diagnostics: &mut Diagnostics,
        progress: &mut InstallProgress,
    ) -> Result<Vec<SdcRecord>, FleetError> {
        let entries = validate_hosts(&spec.hosts)?;
        let removed = removed_records(prior, &entries);
        let removed_ids: HashSet<&str> = removed
            .iter()
            .map(|record| record.sdc_id.as_str())
            .filter(|id| !id.is_empty())
            .collect();
        let classification = self.classify(&entries, prior, &removed_ids).await?;
        info!(
            "Fleet plan: {} registered, {} to install, {} to remove",
            classification.registered.len(),
            classification.to_install.len(),
            removed.len()
        );

        delete_removed(self.array.as_ref(), &removed, diagnostics).await?;

        let mut observed: Vec<Option<ObservedClient>> = vec![None; entries.len()];

        if !classification.to_install.is_empty() {
            let installed = self
                .install(&entries, &classification.to_install, spec, cancel, diagnostics, progress)
                .await?;
            for (index, sdc) in installed {
                observed[index] = Some(observe_client(self.array.as_ref(), &sdc.id).await?);
            }
        }

        for (index, current) in &classification.registered {
            let outcome = apply_mutations(self.array.as_ref(), &entries[*index], current).await;
            for failure in &outcome.failures {
                diagnostics.error(failure);
            }
            observed[*index] = Some(outcome.client);
        }

        Ok(build_records(&entries, &observed))
    }

    /// Look every SDC entry up; a miss on an IP-declared entry means "install".
    ///
    /// A hit on a client that is about to be deleted counts as a miss.
    async fn classify(
        &self,
        entries: &[HostEntry],
        prior: &[SdcRecord],
        removed_ids: &HashSet<&str>,
    ) -> Result<Classification, FleetError> {
        let mut classification = Classification {
            registered: Vec::new(),
            to_install: Vec::new(),
        };

        for (index, entry) in entries.iter().enumerate().filter(|(_, entry)| entry.is_sdc()) {
            let resolved_id = prior_record(prior, entry)
                .map(|record| record.sdc_id.as_str())
                .filter(|id| !id.is_empty());
            let keys = LookupKeys {
                id: entry.id().or(resolved_id),
                ip: entry.ip(),
                name: entry.name.as_deref(),
            };

            let found = find_client(self.array.as_ref(), &keys).await.and_then(|sdc| {
                if removed_ids.contains(sdc.id.as_str()) {
                    debug!("SDC {} matched {:?} but is being removed", sdc.id, entry.identity);
                    Err(LookupError::NotFound(format!("a kept SDC for {:?}", entry.identity)))
                } else {
                    Ok(sdc)
                }
            });

            match found {
                Ok(sdc) => classification.registered.push((index, sdc)),
                Err(e) if e.is_not_found() && entry.ip().is_some() => {
                    debug!("Host {:?} has no SDC yet", entry.ip());
                    classification.to_install.push(index);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(classification)
    }

    /// Run the installer for `to_install` and resolve the SDCs it created.
    async fn install(
        &self,
        entries: &[HostEntry],
        to_install: &[usize],
        spec: &SdcFleetSpec,
        cancel: &CancellationToken,
        diagnostics: &mut Diagnostics,
        progress: &mut InstallProgress,
    ) -> Result<Vec<(usize, Sdc)>, FleetError> {
        let _lease = self.installer_lease.lock().await;

        let targets: Vec<&HostEntry> = to_install.iter().map(|index| &entries[*index]).collect();
        let batch = InstallationBatch::new(entries, &targets, &spec.credentials);
        let mut orchestrator = BatchOrchestrator::new(self.gateway.as_ref());

        let run = orchestrator.run(&batch).await;
        progress.state = Some(orchestrator.state());
        let outcome = run?;
        progress.outcome = Some(outcome.state);

        if outcome.state == InstallState::InstallTriggered {
            let settings = PollSettings::new(
                self.poll_interval,
                Duration::from_secs(spec.install_timeout_minutes.saturating_mul(60)),
            );
            let polled = poll_until_terminal(|| self.gateway.installation_status(), settings, cancel).await;
            if let Some(message) = polled.failure() {
                return Err(FleetError::Poll(message));
            }
        }

        let system = self.array.resolve_system().await?;
        let mut installed = Vec::with_capacity(targets.len());
        for (index, entry) in to_install.iter().zip(&targets) {
            let keys = LookupKeys {
                ip: entry.ip(),
                ..Default::default()
            };
            let sdc = match find_client(self.array.as_ref(), &keys).await {
                Ok(sdc) => sdc,
                Err(e) if e.is_not_found() && outcome.state == InstallState::Skipped => {
                    warn!("Installer skipped {:?} but no SDC is registered for it", entry.ip());
                    diagnostics.warn(
                        "install",
                        format!("installer skipped {:?} but no SDC is registered for it", entry.identity),
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            self.approve(&system, &sdc).await?;
            installed.push((*index, sdc));
        }

        orchestrator.finish();
        progress.state = Some(orchestrator.state());
        Ok(installed)
    }

    /// Approve a new SDC when the system only admits approved clients.
    async fn approve(&self, system: &System, sdc: &Sdc) -> Result<(), FleetError> {
        if sdc.sdc_approved {
            return Ok(());
        }
        match system.restricted_mode() {
            RestrictedSdcMode::None => {}
            RestrictedSdcMode::Guid => {
                info!("Approving SDC {} by GUID {}", sdc.id, sdc.sdc_guid);
                self.array
                    .approve_client(&system.id, &ApprovalTarget::Guid(sdc.sdc_guid.clone()))
                    .await?;
            }
            RestrictedSdcMode::ApprovedIp => {
                info!("Approving SDC {} for IP {}", sdc.id, sdc.sdc_ip);
                self.array.set_approved_ips(&sdc.id, &[sdc.sdc_ip.clone()]).await?;
            }
        }
        Ok(())
    }

    async fn run_refresh(&self, spec: &SdcFleetSpec, prior: &[SdcRecord]) -> Result<Vec<SdcRecord>, FleetError> {
        let entries = validate_hosts(&spec.hosts)?;
        let mut observed: Vec<Option<ObservedClient>> = vec![None; entries.len()];

        for (index, entry) in entries.iter().enumerate().filter(|(_, entry)| entry.is_sdc()) {
            let id = entry
                .id()
                .or_else(|| {
                    prior_record(prior, entry)
                        .map(|record| record.sdc_id.as_str())
                        .filter(|id| !id.is_empty())
                })
                .ok_or_else(|| LookupError::NotFound(format!("a recorded SDC for {:?}", entry.identity)))?;

            let client = observe_client(self.array.as_ref(), id).await.map_err(|e| {
                if e.is_not_found() {
                    FleetError::Lookup(LookupError::NotFound(format!("id={}", id)))
                } else {
                    FleetError::Array(e)
                }
            })?;
            observed[index] = Some(client);
        }

        Ok(build_records(&entries, &observed))
    }
}

#[cfg(test)]
impl FleetEngine {
    pub(crate) fn installer_lease(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.installer_lease)
    }
}
