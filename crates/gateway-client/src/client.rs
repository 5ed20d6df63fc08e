//! Installer gateway client
//!
//! Implements the installation manager (IM) calls used to expand a PowerFlex
//! cluster with new SDC hosts. Based on the IM API structure:
//! /im/types/{Type}/instances/actions/{action}

use crate::common::HttpClient;
use crate::error::GatewayError;
use crate::gateway_trait::GatewayClientTrait;
use crate::models::*;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info};

/// Installer gateway client
pub struct GatewayClient {
    http: HttpClient,
}

impl GatewayClient {
    /// Create a new gateway client
    ///
    /// # Arguments
    /// * `endpoint` - Gateway URL (e.g., "https://10.0.0.10")
    /// * `username` - Gateway admin user
    /// * `password` - Gateway admin password
    /// * `insecure` - Accept self-signed certificates
    pub fn new(
        endpoint: String,
        username: String,
        password: String,
        insecure: bool,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(GatewayError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, endpoint, username, password),
        })
    }
}

#[async_trait::async_trait]
impl GatewayClientTrait for GatewayClient {
    fn endpoint(&self) -> &str {
        self.http.base_url()
    }

    async fn validate_login(&self) -> Result<(), GatewayError> {
        debug!("Validating gateway credentials and connectivity");
        let version: serde_json::Value = self.http.get("/api/version").await?;
        debug!("Gateway version {}", version);
        Ok(())
    }

    /// Upload the CSV and get back the parsed topology.
    ///
    /// # Returns
    /// * `Ok(ParsedBatch)` - Topology and the node IPs it stages
    /// * `Err(GatewayError)` - The gateway rejected the CSV
    async fn parse_batch(&self, csv: &str) -> Result<ParsedBatch, GatewayError> {
        let part = Part::text(csv.to_string())
            .file_name("flexfleet.csv")
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let topology: serde_json::Value = self
            .http
            .post_multipart("/im/types/Configuration/instances/actions/parseFromCSV", form)
            .await?;
        let batch = ParsedBatch::from_topology(topology);
        if batch.staged_ips.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "parsed topology contains no node IPs".to_string(),
            ));
        }
        Ok(batch)
    }

    /// Clear queued commands and force the installer back to its idle phase.
    async fn reset_queue(&self) -> Result<(), GatewayError> {
        self.http
            .post_action("/im/types/Command/instances/actions/clear", &serde_json::json!({}))
            .await?;
        self.http
            .post_action("/im/types/ProcessPhase/actions/moveToIdlePhase", &serde_json::json!({}))
            .await
    }

    /// Validate MDM/LIA credentials against the target MDM.
    ///
    /// Non-200 answers are not errors here: the caller inspects the status code
    /// and message. Only transport failures return `Err`.
    async fn validate_mdm_credentials(&self, request: &MdmValidationRequest) -> Result<MdmValidation, GatewayError> {
        let body = serde_json::to_value(request)?;
        let (status, text) = self
            .http
            .post_raw("/im/types/Configuration/actions/retrieveScaleioConfiguration", &body)
            .await?;

        let mut envelope: GatewayResponse = serde_json::from_str(&text).unwrap_or_else(|_| GatewayResponse {
            status_code: status.as_u16(),
            message: text.chars().take(500).collect(),
            data: None,
        });
        if envelope.status_code == 0 {
            envelope.status_code = status.as_u16();
        }
        Ok(MdmValidation::from(envelope))
    }

    async fn begin_installation(&self, batch: &ParsedBatch) -> Result<(), GatewayError> {
        info!("Starting installation for {} staged node(s)", batch.staged_ips.len());
        self.http
            .post_action(
                "/im/types/Configuration/actions/install?noUpload=false&noInstall=false&noConfigure=false&extend=true",
                &batch.topology,
            )
            .await
    }

    async fn installation_status(&self) -> Result<InstallationStatus, GatewayError> {
        self.http.get("/im/types/ProcessPhase/actions/getPhaseStatus").await
    }
}
