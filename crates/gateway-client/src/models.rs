//! Installer gateway models
//!
//! The installation manager (IM) works on a topology document: the CSV
//! upload is parsed into it, MDM validation answers with the cluster's current
//! topology, and the install action consumes it. The controller never edits
//! the topology, it only reads node IPs out of it.

use serde::{Deserialize, Serialize};

/// Topology produced by the CSV parse step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedBatch {
    /// Node IPs found in the staged topology, in document order
    pub staged_ips: Vec<String>,
    /// Raw topology, handed back unchanged to `begin_installation`
    pub topology: serde_json::Value,
}

impl ParsedBatch {
    /// Build from a topology document returned by the gateway
    pub fn from_topology(topology: serde_json::Value) -> Self {
        Self {
            staged_ips: collect_node_ips(&topology),
            topology,
        }
    }
}

/// Credentials and target for the MDM validation step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdmValidationRequest {
    pub mdm_ips: Vec<String>,
    pub mdm_user: String,
    pub mdm_password: String,
    pub lia_password: String,
    pub security_configuration: SecurityConfiguration,
}

/// Transport security settings sent with the MDM validation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfiguration {
    pub allow_non_secure_communication_with_mdm: bool,
    pub allow_non_secure_communication_with_lia: bool,
    pub disable_non_mgmt_components_auth: bool,
}

impl Default for SecurityConfiguration {
    fn default() -> Self {
        Self {
            allow_non_secure_communication_with_mdm: true,
            allow_non_secure_communication_with_lia: true,
            disable_non_mgmt_components_auth: false,
        }
    }
}

/// Raw gateway response envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    #[serde(default, alias = "httpStatusCode")]
    pub status_code: u16,
    #[serde(default)]
    pub message: String,
    /// JSON document encoded as a string
    #[serde(default)]
    pub data: Option<String>,
}

/// Outcome of MDM credential validation
#[derive(Debug, Clone, PartialEq)]
pub struct MdmValidation {
    pub status_code: u16,
    pub message: String,
    /// Node IPs the MDM already knows about
    pub known_ips: Vec<String>,
}

impl MdmValidation {
    /// Only HTTP 200 counts as a successful validation.
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

impl From<GatewayResponse> for MdmValidation {
    fn from(response: GatewayResponse) -> Self {
        let known_ips = response
            .data
            .as_deref()
            .and_then(|data| serde_json::from_str::<serde_json::Value>(data).ok())
            .map(|topology| collect_node_ips(&topology))
            .unwrap_or_default();
        Self {
            status_code: response.status_code,
            message: response.message,
            known_ips,
        }
    }
}

/// Installer phase status as reported by the gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatus {
    /// IM phase name ("query", "upload", "install", "configure", ...)
    #[serde(default)]
    pub phase: String,
    /// Phase state ("pending", "running", "completed", "failed", ...)
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: String,
}

impl InstallationStatus {
    /// Build a status value (mostly for tests and mocks)
    pub fn new(phase: &str, state: &str, message: &str) -> Self {
        Self {
            phase: phase.to_string(),
            state: state.to_string(),
            message: message.to_string(),
        }
    }

    /// Classify this status for the poller
    pub fn target_state(&self) -> TargetState {
        TargetState::classify(&self.state)
    }
}

/// Classification of a polled target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    /// Terminal success
    Available,
    /// Still moving; keep waiting
    Transitional,
    /// Terminal failure, carrying the raw state
    Error(String),
}

impl TargetState {
    /// Map a raw state string to a classification.
    ///
    /// Anything that is neither a success nor a known in-progress value is
    /// treated as a terminal error.
    pub fn classify(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "available" | "completed" | "complete" => TargetState::Available,
            "pending" | "running" | "copying" | "inprogress" | "in_progress" => TargetState::Transitional,
            _ => TargetState::Error(raw.to_string()),
        }
    }

    /// True for Available and Error.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TargetState::Transitional)
    }
}

/// Walk a topology document and collect every `nodeIPs` entry, deduplicated
/// in first-seen order.
pub fn collect_node_ips(topology: &serde_json::Value) -> Vec<String> {
    fn walk(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, child) in map {
                    if key == "nodeIPs" {
                        if let Some(ips) = child.as_array() {
                            for ip in ips.iter().filter_map(|ip| ip.as_str()) {
                                if !out.iter().any(|seen| seen == ip) {
                                    out.push(ip.to_string());
                                }
                            }
                        }
                    } else {
                        walk(child, out);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    walk(item, out);
                }
            }
            _ => {}
        }
    }

    let mut ips = Vec::new();
    walk(topology, &mut ips);
    ips
}
