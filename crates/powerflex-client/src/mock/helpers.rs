//! Helper functions for building PowerFlex model fixtures

use crate::models::Sdc;

/// Build a connected, approved SDC with sensible defaults
pub fn sample_sdc(id: &str, ip: &str, name: Option<&str>) -> Sdc {
    Sdc {
        id: id.to_string(),
        name: name.map(str::to_string),
        sdc_guid: format!("guid-{}", id),
        sdc_ip: ip.to_string(),
        sdc_ips: vec![ip.to_string()],
        system_id: "system-1".to_string(),
        sdc_approved: true,
        mdm_connection_state: "Connected".to_string(),
        perf_profile: "HighPerformance".to_string(),
        os_type: "Linux".to_string(),
    }
}
