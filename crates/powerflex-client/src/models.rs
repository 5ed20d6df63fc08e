//! PowerFlex API models
//!
//! These models match the JSON objects returned by the PowerFlex gateway
//! REST API (`/api/types/System/instances`, `/api/types/Sdc/instances`, ...).
//! Only the fields the fleet controller reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// PowerFlex system (cluster) object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub system_version_name: Option<String>,
    /// "None", "Guid" or "ApprovedIp"
    #[serde(default)]
    pub restricted_sdc_mode: Option<String>,
    #[serde(default)]
    pub restricted_sdc_mode_enabled: bool,
    #[serde(default)]
    pub mdm_management_ip_list: Vec<String>,
}

impl System {
    /// Restricted SDC mode in effect on the system.
    pub fn restricted_mode(&self) -> RestrictedSdcMode {
        if !self.restricted_sdc_mode_enabled {
            return RestrictedSdcMode::None;
        }
        match self.restricted_sdc_mode.as_deref() {
            Some(mode) if mode.eq_ignore_ascii_case("guid") => RestrictedSdcMode::Guid,
            Some(mode) if mode.eq_ignore_ascii_case("approvedip") => RestrictedSdcMode::ApprovedIp,
            _ => RestrictedSdcMode::None,
        }
    }
}

/// How the MDM admits new SDCs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictedSdcMode {
    /// Any SDC may connect
    None,
    /// SDCs must be approved by GUID
    Guid,
    /// SDCs must connect from an approved IP
    ApprovedIp,
}

/// SDC (storage data client) object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sdc {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sdc_guid: String,
    #[serde(default)]
    pub sdc_ip: String,
    #[serde(default)]
    pub sdc_ips: Vec<String>,
    #[serde(default)]
    pub system_id: String,
    #[serde(default)]
    pub sdc_approved: bool,
    /// "Connected" or "Disconnected"
    #[serde(default)]
    pub mdm_connection_state: String,
    /// "HighPerformance" or "Compact"
    #[serde(default)]
    pub perf_profile: String,
    #[serde(default)]
    pub os_type: String,
}

impl Sdc {
    /// Returns true when `ip` is the primary IP or one of the data IPs.
    pub fn has_ip(&self, ip: &str) -> bool {
        self.sdc_ip == ip || self.sdc_ips.iter().any(|candidate| candidate == ip)
    }
}

/// Volume mapped to an SDC (a device attached to the client)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedVolume {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size_in_kb: u64,
    /// "ThinProvisioned", "ThickProvisioned" or "Snapshot"
    #[serde(default)]
    pub volume_type: String,
}

/// SDC performance profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceProfile {
    HighPerformance,
    Compact,
}

impl PerformanceProfile {
    /// Wire name used by the array.
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceProfile::HighPerformance => "HighPerformance",
            PerformanceProfile::Compact => "Compact",
        }
    }

    /// Parse a profile name, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("HighPerformance") {
            Some(PerformanceProfile::HighPerformance)
        } else if value.eq_ignore_ascii_case("Compact") {
            Some(PerformanceProfile::Compact)
        } else {
            None
        }
    }
}

impl fmt::Display for PerformanceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key used to look an SDC up in the directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientSelector {
    Id(String),
    Ip(String),
    Name(String),
}

impl fmt::Display for ClientSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientSelector::Id(id) => write!(f, "id={}", id),
            ClientSelector::Ip(ip) => write!(f, "ip={}", ip),
            ClientSelector::Name(name) => write!(f, "name={}", name),
        }
    }
}

/// Identifies an SDC awaiting approval in restricted mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalTarget {
    Guid(String),
    Ip(String),
}

/// Request body for `System::approveSdc`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveSdcRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdc_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdc_ip: Option<String>,
}

impl From<&ApprovalTarget> for ApproveSdcRequest {
    fn from(target: &ApprovalTarget) -> Self {
        match target {
            ApprovalTarget::Guid(guid) => Self { sdc_guid: Some(guid.clone()), sdc_ip: None },
            ApprovalTarget::Ip(ip) => Self { sdc_guid: None, sdc_ip: Some(ip.clone()) },
        }
    }
}
