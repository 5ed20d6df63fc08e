//! Test utilities for unit testing the fleet engine
//!
//! Builders for declared hosts and fleet specs, plus an engine wired to the
//! mock array and gateway.

use crate::reconciler::host::HostEntry;
use crate::reconciler::FleetEngine;
use crds::{FleetCredentials, SdcFleetSpec, SdcHostSpec};
use gateway_client::MockGatewayClient;
use powerflex_client::{sample_sdc, MockPowerFlexClient};
use std::sync::Arc;
use std::time::Duration;

/// SDC host declared by IP with every other field defaulted
pub fn sdc_host(ip: &str) -> SdcHostSpec {
    SdcHostSpec {
        ip: Some(ip.to_string()),
        ..Default::default()
    }
}

/// MDM/tie-breaker host that is not an SDC
pub fn mdm_host(ip: &str) -> SdcHostSpec {
    SdcHostSpec {
        ip: Some(ip.to_string()),
        is_mdm_or_tb: Some("Yes".to_string()),
        is_sdc: Some("No".to_string()),
        ..Default::default()
    }
}

/// Validated entry for a spec row known to be valid
pub fn host_entry(spec: &SdcHostSpec) -> HostEntry {
    HostEntry::from_spec(spec).expect("test host should be valid")
}

pub fn fleet_spec(hosts: Vec<SdcHostSpec>) -> SdcFleetSpec {
    SdcFleetSpec {
        hosts,
        credentials: FleetCredentials {
            mdm_user: "admin".to_string(),
            mdm_password: "mdm-secret".to_string(),
            lia_password: "lia-secret".to_string(),
        },
        install_timeout_minutes: 30,
    }
}

pub fn mock_array() -> MockPowerFlexClient {
    MockPowerFlexClient::new("https://pflex.test")
}

pub fn mock_gateway() -> MockGatewayClient {
    MockGatewayClient::new("https://gateway.test")
}

/// Engine over clones of the mocks; the test keeps its own handles
pub fn engine(array: &MockPowerFlexClient, gateway: &MockGatewayClient) -> FleetEngine {
    FleetEngine::new(Arc::new(array.clone()), Arc::new(gateway.clone()), Duration::from_secs(60))
}

/// Make installations register an SDC on the array for every staged IP
/// that has none yet, except `skip` (MDM-only hosts).
pub fn register_on_install(array: &MockPowerFlexClient, gateway: &MockGatewayClient, skip: &[&str], approved: bool) {
    let array = array.clone();
    let skip: Vec<String> = skip.iter().map(|ip| ip.to_string()).collect();
    gateway.on_install(move |ips| {
        for ip in ips.iter().filter(|ip| !skip.contains(ip)) {
            let id = format!("sdc-{}", ip.rsplit('.').next().unwrap_or(ip));
            if array.client(&id).is_none() {
                let mut sdc = sample_sdc(&id, ip, None);
                sdc.sdc_approved = approved;
                array.add_client(sdc);
            }
        }
    });
}
