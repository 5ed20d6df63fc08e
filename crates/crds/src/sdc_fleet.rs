//! SdcFleet CRD
//!
//! Declares the hosts that should run a PowerFlex SDC against one array and
//! carries the reconciled per-client records in its status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer that keeps the resource until every recorded SDC is unregistered
pub const SDC_CLEANUP_FINALIZER: &str = "flexfleet.microscaler.io/sdc-cleanup";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "flexfleet.microscaler.io",
    version = "v1alpha1",
    kind = "SdcFleet",
    namespaced,
    status = "SdcFleetStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Clients","type":"integer","jsonPath":".status.clientCount"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SdcFleetSpec {
    /// Declared fleet members, in order
    pub hosts: Vec<SdcHostSpec>,

    /// MDM and LIA credentials used to authenticate installation batches
    #[serde(default)]
    pub credentials: FleetCredentials,

    /// How long to wait for the installer to finish (minutes)
    #[serde(default = "default_install_timeout_minutes")]
    pub install_timeout_minutes: u64,
}

fn default_install_timeout_minutes() -> u64 {
    30
}

/// One declared host
///
/// Role flags are kept as strings ("Yes"/"No", any case) so manifests can be
/// written the way the installer CSV is; they are validated by the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SdcHostSpec {
    /// SDC id on the array (mutually exclusive with `ip`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Host IP (mutually exclusive with `id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// SDC display name (max 31 characters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Host login password, only sent to the installer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mdm_or_tb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sdc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_rfcache: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sdr: Option<String>,

    /// "HighPerformance" or "Compact"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_profile: Option<String>,

    // Installation-only fields, passed through to the installer CSV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mdm_ips: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mdm_mgmt_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sds_storage_device_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_pool_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sds_all_ips: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdr_all_ips: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_ips: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_ip_nics: Option<String>,
}

/// MDM/LIA credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FleetCredentials {
    /// MDM user the installer authenticates as
    #[serde(default = "default_mdm_user")]
    pub mdm_user: String,
    #[serde(default)]
    pub mdm_password: String,
    #[serde(default)]
    pub lia_password: String,
}

impl Default for FleetCredentials {
    fn default() -> Self {
        Self {
            mdm_user: default_mdm_user(),
            mdm_password: String::new(),
            lia_password: String::new(),
        }
    }
}

fn default_mdm_user() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SdcFleetStatus {
    /// Reconciliation state
    pub state: FleetState,

    /// One record per declared host, in declaration order
    #[serde(default)]
    pub records: Vec<SdcRecord>,

    /// Number of records that resolved to a registered SDC
    #[serde(default)]
    pub client_count: u32,

    /// Diagnostics from the last cycle
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<DiagnosticRecord>,

    /// Generation of the spec the records were built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,
}

/// Reconciled state of one declared host
///
/// Mirrors the declared entry without its password, plus what the array
/// reports for the resolved SDC. Role-only hosts keep the client part empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SdcRecord {
    // Declared identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_mdm_or_tb: bool,
    #[serde(default)]
    pub is_sdc: bool,
    #[serde(default)]
    pub is_rfcache: bool,
    #[serde(default)]
    pub is_sdr: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,

    // Observed on the array
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sdc_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sdc_guid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sdc_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_id: String,
    #[serde(default)]
    pub sdc_approved: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mdm_connection_state: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<MappedDevice>,
}

/// Volume mapped to an SDC
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MappedDevice {
    pub volume_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub size_in_kb: u64,
}

/// Diagnostic emitted by a reconciliation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    /// "Warning" or "Error"
    pub severity: String,
    /// Step that produced it (stage, reset, validate, install, poll, rename, profile, delete, ...)
    pub step: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Fleet reconciliation state
///
/// Serializes as PascalCase but also accepts lowercase values.
#[serde(rename_all = "PascalCase")]
pub enum FleetState {
    #[default]
    #[serde(alias = "pending")]
    Pending,

    /// Declared hosts converged with the array
    #[serde(alias = "reconciled")]
    Reconciled,

    #[serde(alias = "failed")]
    Failed,
}
