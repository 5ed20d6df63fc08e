//! Mock PowerFlexClient for unit testing
//!
//! This module provides a mock implementation of PowerFlexClientTrait that can be used
//! in unit tests without requiring a running PowerFlex array.
//!
//! Besides the in-memory SDC directory, the mock records every call it receives
//! and can be told to fail a specific operation for a specific SDC.

mod helpers;

pub use helpers::sample_sdc;

use crate::error::PowerFlexError;
use crate::models::*;
use crate::powerflex_trait::PowerFlexClientTrait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Operations that can be made to fail in the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Find,
    Get,
    Rename,
    SetPerformanceProfile,
    SetApprovedIps,
    Approve,
    Delete,
}

/// Mock PowerFlexClient for testing
///
/// Clones share the same state, so a test can keep a handle while the
/// engine owns another.
#[derive(Clone)]
pub struct MockPowerFlexClient {
    pub(crate) endpoint: String,
    pub(crate) system: Arc<Mutex<System>>,
    pub(crate) clients: Arc<Mutex<BTreeMap<String, Sdc>>>,
    pub(crate) devices: Arc<Mutex<HashMap<String, Vec<MappedVolume>>>>,
    pub(crate) failures: Arc<Mutex<HashMap<(MockOperation, String), String>>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
}

impl MockPowerFlexClient {
    /// Create a new mock client fronting an unrestricted system
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            system: Arc::new(Mutex::new(System {
                id: "system-1".to_string(),
                name: Some("mock-system".to_string()),
                ..Default::default()
            })),
            clients: Arc::new(Mutex::new(BTreeMap::new())),
            devices: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the system object (for test setup)
    pub fn set_system(&self, system: System) {
        *self.system.lock().unwrap() = system;
    }

    /// Add an SDC to the mock directory (for test setup)
    pub fn add_client(&self, sdc: Sdc) {
        self.clients.lock().unwrap().insert(sdc.id.clone(), sdc);
    }

    /// Attach mapped volumes to an SDC (for test setup)
    pub fn set_devices(&self, sdc_id: &str, volumes: Vec<MappedVolume>) {
        self.devices.lock().unwrap().insert(sdc_id.to_string(), volumes);
    }

    /// Make `operation` fail for `key` (an SDC id, or the selector value for `Find`)
    pub fn fail_on(&self, operation: MockOperation, key: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert((operation, key.to_string()), message.to_string());
    }

    /// Snapshot of an SDC as the mock currently holds it
    pub fn client(&self, id: &str) -> Option<Sdc> {
        self.clients.lock().unwrap().get(id).cloned()
    }

    /// Number of SDCs in the directory
    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    /// Every call received so far, formatted as `operation:key`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose operation name matches `operation`
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{}:", operation);
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(&prefix))
            .collect()
    }

    fn record(&self, operation: &str, key: &str) {
        self.calls.lock().unwrap().push(format!("{}:{}", operation, key));
    }

    fn injected(&self, operation: MockOperation, key: &str) -> Result<(), PowerFlexError> {
        match self.failures.lock().unwrap().get(&(operation, key.to_string())) {
            Some(message) => Err(PowerFlexError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn with_client<F>(&self, id: &str, update: F) -> Result<(), PowerFlexError>
    where
        F: FnOnce(&mut Sdc),
    {
        let mut clients = self.clients.lock().unwrap();
        let sdc = clients
            .get_mut(id)
            .ok_or_else(|| PowerFlexError::NotFound(format!("SDC {} not found", id)))?;
        update(sdc);
        Ok(())
    }
}

#[async_trait::async_trait]
impl PowerFlexClientTrait for MockPowerFlexClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn validate_credentials(&self) -> Result<(), PowerFlexError> {
        Ok(())
    }

    async fn resolve_system(&self) -> Result<System, PowerFlexError> {
        self.record("resolve_system", "");
        Ok(self.system.lock().unwrap().clone())
    }

    async fn approve_client(&self, system_id: &str, target: &ApprovalTarget) -> Result<(), PowerFlexError> {
        let key = match target {
            ApprovalTarget::Guid(guid) => guid.clone(),
            ApprovalTarget::Ip(ip) => ip.clone(),
        };
        self.record("approve_client", &key);
        self.injected(MockOperation::Approve, &key)?;
        if system_id != self.system.lock().unwrap().id {
            return Err(PowerFlexError::NotFound(format!("System {} not found", system_id)));
        }
        let mut clients = self.clients.lock().unwrap();
        let sdc = clients
            .values_mut()
            .find(|sdc| match target {
                ApprovalTarget::Guid(guid) => sdc.sdc_guid == *guid,
                ApprovalTarget::Ip(ip) => sdc.has_ip(ip),
            })
            .ok_or_else(|| PowerFlexError::NotFound(format!("SDC {} not found", key)))?;
        sdc.sdc_approved = true;
        Ok(())
    }

    async fn list_clients(&self) -> Result<Vec<Sdc>, PowerFlexError> {
        self.record("list_clients", "");
        Ok(self.clients.lock().unwrap().values().cloned().collect())
    }

    async fn find_client(&self, selector: &ClientSelector) -> Result<Sdc, PowerFlexError> {
        let key = match selector {
            ClientSelector::Id(value) | ClientSelector::Ip(value) | ClientSelector::Name(value) => value.as_str(),
        };
        self.record("find_client", &selector.to_string());
        self.injected(MockOperation::Find, key)?;
        let clients = self.clients.lock().unwrap();
        let found = match selector {
            ClientSelector::Id(id) => clients.get(id).cloned(),
            ClientSelector::Ip(ip) => clients.values().find(|sdc| sdc.has_ip(ip)).cloned(),
            ClientSelector::Name(name) => clients
                .values()
                .find(|sdc| sdc.name.as_deref() == Some(name.as_str()))
                .cloned(),
        };
        found.ok_or_else(|| PowerFlexError::NotFound(format!("SDC {} not found", selector)))
    }

    async fn get_client_by_id(&self, id: &str) -> Result<Sdc, PowerFlexError> {
        self.record("get_client_by_id", id);
        self.injected(MockOperation::Get, id)?;
        self.client(id)
            .ok_or_else(|| PowerFlexError::NotFound(format!("SDC {} not found", id)))
    }

    async fn get_client_devices(&self, id: &str) -> Result<Vec<MappedVolume>, PowerFlexError> {
        Ok(self.devices.lock().unwrap().get(id).cloned().unwrap_or_default())
    }

    async fn rename_client(&self, id: &str, name: &str) -> Result<(), PowerFlexError> {
        self.record("rename_client", id);
        self.injected(MockOperation::Rename, id)?;
        self.with_client(id, |sdc| sdc.name = Some(name.to_string()))
    }

    async fn set_client_performance_profile(&self, id: &str, profile: PerformanceProfile) -> Result<(), PowerFlexError> {
        self.record("set_client_performance_profile", id);
        self.injected(MockOperation::SetPerformanceProfile, id)?;
        self.with_client(id, |sdc| sdc.perf_profile = profile.as_str().to_string())
    }

    async fn set_approved_ips(&self, id: &str, ips: &[String]) -> Result<(), PowerFlexError> {
        self.record("set_approved_ips", id);
        self.injected(MockOperation::SetApprovedIps, id)?;
        self.with_client(id, |sdc| {
            sdc.sdc_ips = ips.to_vec();
            sdc.sdc_approved = true;
        })
    }

    async fn delete_client(&self, id: &str) -> Result<(), PowerFlexError> {
        self.record("delete_client", id);
        self.injected(MockOperation::Delete, id)?;
        self.clients
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PowerFlexError::NotFound(format!("SDC {} not found", id)))
    }
}
