//! Batch Installation Orchestrator
//!
//! Drives the installer through a fixed sequence, one state machine per cycle:
//!
//! `NotStarted -> Staged -> QueueReset -> TargetResolved -> CredentialsValidated
//!  -> {Skipped | InstallTriggered} -> Done`
//!
//! A failing step leaves the machine at the last state it reached. Completed
//! steps are not undone.

use crate::reconciler::fleet_error::FleetError;
use crate::reconciler::host::HostEntry;
use crds::FleetCredentials;
use gateway_client::{GatewayClientTrait, MdmValidationRequest, SecurityConfiguration};
use std::collections::HashSet;
use tracing::{info, warn};

/// Position of the orchestrator in the installation sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    NotStarted,
    Staged,
    QueueReset,
    TargetResolved,
    CredentialsValidated,
    /// Every staged IP was already known to the MDM
    Skipped,
    InstallTriggered,
    Done,
}

/// Installer CSV columns, in order
const CSV_HEADER: [&str; 19] = [
    "IPs",
    "Username",
    "Password",
    "Operating System",
    "Is MDM/TB",
    "MDM Mgmt IP",
    "MDM IPs",
    "Is SDS",
    "SDS All IPs",
    "SDS Storage Device List",
    "StoragePool List",
    "Is SDC",
    "perfProfileForSDC",
    "SDC Name",
    "Is RFcache",
    "Is SDR",
    "SDR All IPs",
    "Virtual IPs",
    "Virtual IP NICs",
];

/// Hosts staged together in one installer run
#[derive(Debug, Clone)]
pub struct InstallationBatch<'a> {
    /// CSV rows, in declaration order
    pub rows: Vec<&'a HostEntry>,
    /// Hosts carrying the MDM/tie-breaker role
    pub mdm_hosts: Vec<&'a HostEntry>,
    pub credentials: &'a FleetCredentials,
}

impl<'a> InstallationBatch<'a> {
    /// Batch installing `targets`.
    ///
    /// Role-only hosts with an IP are added as rows so the installer sees the
    /// existing cluster topology next to the new SDCs.
    pub fn new(declared: &'a [HostEntry], targets: &[&'a HostEntry], credentials: &'a FleetCredentials) -> Self {
        let rows = declared
            .iter()
            .filter(|entry| {
                targets.iter().any(|target| std::ptr::eq(*target, *entry)) || (!entry.is_sdc() && entry.ip().is_some())
            })
            .collect();
        let mdm_hosts = declared.iter().filter(|entry| entry.is_mdm_or_tb.is_yes()).collect();
        Self {
            rows,
            mdm_hosts,
            credentials,
        }
    }

    /// Render the CSV uploaded to the installer
    pub fn to_csv(&self) -> String {
        let mut csv = CSV_HEADER.join(",");
        csv.push('\n');
        for entry in &self.rows {
            let install = &entry.install;
            let fields = [
                entry.ip().unwrap_or_default(),
                entry.username.as_deref().unwrap_or("root"),
                entry.password.as_deref().unwrap_or_default(),
                entry.operating_system.as_deref().unwrap_or("linux"),
                entry.is_mdm_or_tb.as_str(),
                install.mdm_mgmt_ip.as_deref().unwrap_or_default(),
                install.mdm_ips.as_deref().unwrap_or_default(),
                "No",
                install.sds_all_ips.as_deref().unwrap_or_default(),
                install.sds_storage_device_list.as_deref().unwrap_or_default(),
                install.storage_pool_list.as_deref().unwrap_or_default(),
                entry.is_sdc.as_str(),
                entry.performance_profile.map(|p| p.as_str()).unwrap_or_default(),
                entry.name.as_deref().unwrap_or_default(),
                entry.is_rfcache.as_str(),
                entry.is_sdr.as_str(),
                install.sdr_all_ips.as_deref().unwrap_or_default(),
                install.virtual_ips.as_deref().unwrap_or_default(),
                install.virtual_ip_nics.as_deref().unwrap_or_default(),
            ];
            let line: Vec<String> = fields.iter().map(|field| csv_field(field)).collect();
            csv.push_str(&line.join(","));
            csv.push('\n');
        }
        csv
    }

    /// MDM IPs the batch registers against.
    ///
    /// Each MDM/TB host contributes its declared MDM IPs, or its own IP when
    /// none are declared.
    pub fn mdm_target(&self) -> Vec<String> {
        let mut ips: Vec<String> = Vec::new();
        for host in &self.mdm_hosts {
            let declared: Vec<String> = host
                .install
                .mdm_ips
                .as_deref()
                .map(split_list)
                .unwrap_or_default();
            let candidates = if declared.is_empty() {
                host.ip().map(|ip| vec![ip.to_string()]).unwrap_or_default()
            } else {
                declared
            };
            for ip in candidates {
                if !ips.contains(&ip) {
                    ips.push(ip);
                }
            }
        }
        ips
    }

    /// Credential check for the installer against `mdm_ips`
    pub fn validation_request(&self, mdm_ips: Vec<String>) -> MdmValidationRequest {
        MdmValidationRequest {
            mdm_ips,
            mdm_user: self.credentials.mdm_user.clone(),
            mdm_password: self.credentials.mdm_password.clone(),
            lia_password: self.credentials.lia_password.clone(),
            security_configuration: SecurityConfiguration::default(),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';', ' '])
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .collect()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// `Skipped` or `InstallTriggered`
    pub state: InstallState,
    pub staged_ips: Vec<String>,
}

/// Runs one installation batch through the installer
pub struct BatchOrchestrator<'g> {
    gateway: &'g dyn GatewayClientTrait,
    state: InstallState,
}

impl std::fmt::Debug for BatchOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("gateway", &self.gateway.endpoint())
            .field("state", &self.state)
            .finish()
    }
}

impl<'g> BatchOrchestrator<'g> {
    pub fn new(gateway: &'g dyn GatewayClientTrait) -> Self {
        Self {
            gateway,
            state: InstallState::NotStarted,
        }
    }

    /// Last state reached
    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Stage, reset, resolve, validate, then skip or trigger.
    pub async fn run(&mut self, batch: &InstallationBatch<'_>) -> Result<BatchOutcome, FleetError> {
        info!("Staging {} host(s) with the installer at {}", batch.rows.len(), self.gateway.endpoint());

        let parsed = self.gateway.parse_batch(&batch.to_csv()).await.map_err(FleetError::Stage)?;
        self.state = InstallState::Staged;

        self.gateway.reset_queue().await.map_err(FleetError::Reset)?;
        self.state = InstallState::QueueReset;

        let mdm_ips = batch.mdm_target();
        if mdm_ips.is_empty() {
            return Err(FleetError::TargetResolution(
                "no host is marked isMdmOrTb with an MDM IP".to_string(),
            ));
        }
        self.state = InstallState::TargetResolved;

        let request = batch.validation_request(mdm_ips);
        let validation = self
            .gateway
            .validate_mdm_credentials(&request)
            .await
            .map_err(|e| FleetError::CredentialValidation {
                code: 0,
                message: e.to_string(),
            })?;
        if !validation.is_success() {
            return Err(FleetError::CredentialValidation {
                code: validation.status_code,
                message: validation.message,
            });
        }
        self.state = InstallState::CredentialsValidated;

        let known: HashSet<&str> = validation.known_ips.iter().map(String::as_str).collect();
        if parsed.staged_ips.iter().all(|ip| known.contains(ip.as_str())) {
            info!("All {} staged IP(s) are already known to the MDM, skipping installation", parsed.staged_ips.len());
            self.state = InstallState::Skipped;
            return Ok(BatchOutcome {
                state: self.state,
                staged_ips: parsed.staged_ips,
            });
        }

        self.gateway.begin_installation(&parsed).await.map_err(|e| {
            warn!("Installer refused to start: {}", e);
            FleetError::Install(e)
        })?;
        self.state = InstallState::InstallTriggered;
        info!("Installation triggered for {:?}", parsed.staged_ips);

        Ok(BatchOutcome {
            state: self.state,
            staged_ips: parsed.staged_ips,
        })
    }

    /// Close the machine once follow-up confirmation succeeded
    pub fn finish(&mut self) {
        if matches!(self.state, InstallState::Skipped | InstallState::InstallTriggered) {
            self.state = InstallState::Done;
        }
    }
}
