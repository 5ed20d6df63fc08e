//! Mock GatewayClient for unit testing
//!
//! This module provides a mock implementation of GatewayClientTrait that can be used
//! in unit tests without requiring a running installation manager.
//!
//! The mock parses the first column of the uploaded CSV as the node IP, keeps
//! a list of IPs the MDM "already knows", replays a scripted sequence of
//! installer phase states, and records every call it receives.

use crate::error::GatewayError;
use crate::gateway_trait::GatewayClientTrait;
use crate::models::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Installer steps that can be made to fail in the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockStep {
    Login,
    Parse,
    Reset,
    Install,
    Status,
}

type InstallHook = Box<dyn Fn(&[String]) + Send + Sync>;

/// Mock GatewayClient for testing
///
/// Clones share the same state.
#[derive(Clone)]
pub struct MockGatewayClient {
    pub(crate) endpoint: String,
    pub(crate) known_ips: Arc<Mutex<Vec<String>>>,
    pub(crate) validation: Arc<Mutex<(u16, String)>>,
    pub(crate) statuses: Arc<Mutex<VecDeque<InstallationStatus>>>,
    pub(crate) failures: Arc<Mutex<HashMap<MockStep, String>>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    pub(crate) install_hook: Arc<Mutex<Option<InstallHook>>>,
}

impl MockGatewayClient {
    /// Create a new mock gateway whose installs complete on the first poll
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            known_ips: Arc::new(Mutex::new(Vec::new())),
            validation: Arc::new(Mutex::new((200, "OK".to_string()))),
            statuses: Arc::new(Mutex::new(VecDeque::from(vec![InstallationStatus::new(
                "configure",
                "completed",
                "",
            )]))),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            install_hook: Arc::new(Mutex::new(None)),
        }
    }

    /// IPs the MDM reports as already part of the cluster (for test setup)
    pub fn set_known_ips(&self, ips: &[&str]) {
        *self.known_ips.lock().unwrap() = ips.iter().map(|ip| ip.to_string()).collect();
    }

    /// Status code and message the credential validation answers with
    pub fn set_validation_response(&self, status_code: u16, message: &str) {
        *self.validation.lock().unwrap() = (status_code, message.to_string());
    }

    /// Phase states returned by successive polls; the last one repeats
    pub fn set_statuses(&self, states: &[&str]) {
        *self.statuses.lock().unwrap() = states
            .iter()
            .map(|state| InstallationStatus::new("install", state, ""))
            .collect();
    }

    /// Make `step` fail with `message`
    pub fn fail_on(&self, step: MockStep, message: &str) {
        self.failures.lock().unwrap().insert(step, message.to_string());
    }

    /// Called with the staged IPs when an installation is triggered
    pub fn on_install<F>(&self, hook: F)
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        *self.install_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many times `operation` was called
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| *call == operation).count()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }

    fn injected(&self, step: MockStep) -> Result<(), GatewayError> {
        match self.failures.lock().unwrap().get(&step) {
            Some(message) => Err(GatewayError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

/// First field of a CSV line, honouring double quotes
fn first_field(line: &str) -> String {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('"') {
        rest.split('"').next().unwrap_or_default().to_string()
    } else {
        line.split(',').next().unwrap_or_default().trim().to_string()
    }
}

#[async_trait::async_trait]
impl GatewayClientTrait for MockGatewayClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn validate_login(&self) -> Result<(), GatewayError> {
        self.record("validate_login");
        self.injected(MockStep::Login)
    }

    async fn parse_batch(&self, csv: &str) -> Result<ParsedBatch, GatewayError> {
        self.record("parse_batch");
        self.injected(MockStep::Parse)?;

        let ips: Vec<String> = csv
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .map(first_field)
            .filter(|ip| !ip.is_empty())
            .collect();
        if ips.is_empty() {
            return Err(GatewayError::InvalidRequest("CSV contains no hosts".to_string()));
        }

        let nodes: Vec<serde_json::Value> = ips
            .iter()
            .map(|ip| serde_json::json!({ "node": { "nodeIPs": [ip] } }))
            .collect();
        Ok(ParsedBatch::from_topology(serde_json::json!({ "sdcList": nodes })))
    }

    async fn reset_queue(&self) -> Result<(), GatewayError> {
        self.record("reset_queue");
        self.injected(MockStep::Reset)
    }

    async fn validate_mdm_credentials(&self, _request: &MdmValidationRequest) -> Result<MdmValidation, GatewayError> {
        self.record("validate_mdm_credentials");
        let (status_code, message) = self.validation.lock().unwrap().clone();
        Ok(MdmValidation {
            status_code,
            message,
            known_ips: self.known_ips.lock().unwrap().clone(),
        })
    }

    async fn begin_installation(&self, batch: &ParsedBatch) -> Result<(), GatewayError> {
        self.record("begin_installation");
        self.injected(MockStep::Install)?;
        if let Some(hook) = self.install_hook.lock().unwrap().as_ref() {
            hook(&batch.staged_ips);
        }
        let mut known = self.known_ips.lock().unwrap();
        for ip in &batch.staged_ips {
            if !known.contains(ip) {
                known.push(ip.clone());
            }
        }
        Ok(())
    }

    async fn installation_status(&self) -> Result<InstallationStatus, GatewayError> {
        self.record("installation_status");
        self.injected(MockStep::Status)?;
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        status.ok_or_else(|| GatewayError::Api("no installer status scripted".to_string()))
    }
}
