//! PowerFlex API client
//!
//! Implements the PowerFlex REST API calls used for SDC fleet management.
//! Based on the PowerFlex API structure: /api/types/{Type}/instances and
//! /api/instances/{Type}::{id}/action/{action}

use crate::common::HttpClient;
use crate::error::PowerFlexError;
use crate::models::*;
use crate::powerflex_trait::PowerFlexClientTrait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// PowerFlex API client
pub struct PowerFlexClient {
    http: HttpClient,
}

impl PowerFlexClient {
    /// Create a new PowerFlex client
    ///
    /// # Arguments
    /// * `endpoint` - PowerFlex gateway URL (e.g., "https://10.0.0.10")
    /// * `username` - API user
    /// * `password` - API password
    /// * `insecure` - Accept self-signed certificates
    pub fn new(
        endpoint: String,
        username: String,
        password: String,
        insecure: bool,
    ) -> Result<Self, PowerFlexError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(PowerFlexError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, endpoint, username, password),
        })
    }

    fn sdc_action_path(id: &str, action: &str) -> String {
        format!("/api/instances/Sdc::{}/action/{}", id, action)
    }
}

#[async_trait::async_trait]
impl PowerFlexClientTrait for PowerFlexClient {
    fn endpoint(&self) -> &str {
        self.http.base_url()
    }

    /// Validate credentials by logging in.
    ///
    /// # Returns
    /// * `Ok(())` - Credentials are valid and the array is reachable
    /// * `Err(PowerFlexError)` - Credentials are invalid or the array is unreachable
    async fn validate_credentials(&self) -> Result<(), PowerFlexError> {
        debug!("Validating PowerFlex credentials and connectivity");
        self.http.login().await?;
        debug!("Credentials validated successfully");
        Ok(())
    }

    /// Resolve the (single) system the gateway fronts.
    async fn resolve_system(&self) -> Result<System, PowerFlexError> {
        let systems: Vec<System> = self.http.get("/api/types/System/instances").await?;
        systems
            .into_iter()
            .next()
            .ok_or_else(|| PowerFlexError::NotFound("no PowerFlex system behind this gateway".to_string()))
    }

    async fn approve_client(&self, system_id: &str, target: &ApprovalTarget) -> Result<(), PowerFlexError> {
        let body = serde_json::to_value(ApproveSdcRequest::from(target))?;
        self.http
            .post_action(&format!("/api/instances/System::{}/action/approveSdc", system_id), &body)
            .await
    }

    async fn list_clients(&self) -> Result<Vec<Sdc>, PowerFlexError> {
        self.http.get("/api/types/Sdc/instances").await
    }

    /// Find an SDC by id, IP or name.
    ///
    /// The array has no server-side filter for IP or name, so those selectors
    /// scan the SDC list.
    ///
    /// # Returns
    /// * `Ok(Sdc)` - The first matching SDC
    /// * `Err(PowerFlexError::NotFound)` - Nothing matched
    async fn find_client(&self, selector: &ClientSelector) -> Result<Sdc, PowerFlexError> {
        debug!("Looking up SDC by {}", selector);
        match selector {
            ClientSelector::Id(id) => self.get_client_by_id(id).await,
            ClientSelector::Ip(ip) => self
                .list_clients()
                .await?
                .into_iter()
                .find(|sdc| sdc.has_ip(ip))
                .ok_or_else(|| PowerFlexError::NotFound(format!("SDC with IP {} not found", ip))),
            ClientSelector::Name(name) => self
                .list_clients()
                .await?
                .into_iter()
                .find(|sdc| sdc.name.as_deref() == Some(name.as_str()))
                .ok_or_else(|| PowerFlexError::NotFound(format!("SDC with name {} not found", name))),
        }
    }

    async fn get_client_by_id(&self, id: &str) -> Result<Sdc, PowerFlexError> {
        self.http.get(&format!("/api/instances/Sdc::{}", id)).await
    }

    async fn get_client_devices(&self, id: &str) -> Result<Vec<MappedVolume>, PowerFlexError> {
        self.http
            .get(&format!("/api/instances/Sdc::{}/relationships/Volume", id))
            .await
    }

    async fn rename_client(&self, id: &str, name: &str) -> Result<(), PowerFlexError> {
        self.http
            .post_action(
                &Self::sdc_action_path(id, "setSdcName"),
                &serde_json::json!({ "sdcName": name }),
            )
            .await
    }

    async fn set_client_performance_profile(&self, id: &str, profile: PerformanceProfile) -> Result<(), PowerFlexError> {
        self.http
            .post_action(
                &Self::sdc_action_path(id, "setSdcPerformanceParameters"),
                &serde_json::json!({ "perfProfile": profile.as_str() }),
            )
            .await
    }

    async fn set_approved_ips(&self, id: &str, ips: &[String]) -> Result<(), PowerFlexError> {
        self.http
            .post_action(
                &Self::sdc_action_path(id, "setApprovedIps"),
                &serde_json::json!({ "sdcIps": ips }),
            )
            .await
    }

    async fn delete_client(&self, id: &str) -> Result<(), PowerFlexError> {
        self.http
            .post_action(&Self::sdc_action_path(id, "removeSdc"), &serde_json::json!({}))
            .await
    }
}
