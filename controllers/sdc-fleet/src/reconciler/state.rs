//! State Builder
//!
//! Assembles the status records: exactly one per declared host, in
//! declaration order. Role-only hosts and hosts without an observed SDC get a
//! record whose client part is empty. Passwords never reach a record.

use crate::reconciler::host::HostEntry;
use crds::{MappedDevice, SdcRecord};
use powerflex_client::{MappedVolume, PowerFlexClientTrait, PowerFlexError, Sdc};

/// An SDC as freshly read from the array, with its mapped volumes
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedClient {
    pub sdc: Sdc,
    pub devices: Vec<MappedVolume>,
}

/// Read an SDC and its mapped volumes by id
pub async fn observe_client(array: &dyn PowerFlexClientTrait, id: &str) -> Result<ObservedClient, PowerFlexError> {
    let sdc = array.get_client_by_id(id).await?;
    let devices = array.get_client_devices(id).await?;
    Ok(ObservedClient { sdc, devices })
}

/// Build one record per entry; `observed[i]` belongs to `entries[i]`.
pub fn build_records(entries: &[HostEntry], observed: &[Option<ObservedClient>]) -> Vec<SdcRecord> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| record_for(entry, observed.get(index).and_then(Option::as_ref)))
        .collect()
}

/// Record for one entry
pub fn record_for(entry: &HostEntry, client: Option<&ObservedClient>) -> SdcRecord {
    let mut record = SdcRecord {
        declared_id: entry.id().map(str::to_string),
        declared_ip: entry.ip().map(str::to_string),
        name: entry.name.clone(),
        is_mdm_or_tb: entry.is_mdm_or_tb.is_yes(),
        is_sdc: entry.is_sdc(),
        is_rfcache: entry.is_rfcache.is_yes(),
        is_sdr: entry.is_sdr.is_yes(),
        performance_profile: entry.performance_profile.map(|p| p.as_str().to_string()),
        operating_system: entry.operating_system.clone(),
        ..Default::default()
    };

    let Some(client) = client.filter(|_| entry.is_sdc()) else {
        return record;
    };

    let sdc = &client.sdc;
    if sdc.name.is_some() {
        record.name = sdc.name.clone();
    }
    if !sdc.perf_profile.is_empty() {
        record.performance_profile = Some(sdc.perf_profile.clone());
    }
    if !sdc.os_type.is_empty() {
        record.operating_system = Some(sdc.os_type.clone());
    }
    record.sdc_id = sdc.id.clone();
    record.sdc_guid = sdc.sdc_guid.clone();
    record.sdc_ip = sdc.sdc_ip.clone();
    record.system_id = sdc.system_id.clone();
    record.sdc_approved = sdc.sdc_approved;
    record.mdm_connection_state = sdc.mdm_connection_state.clone();
    record.devices = client
        .devices
        .iter()
        .map(|volume| MappedDevice {
            volume_id: volume.id.clone(),
            volume_name: volume.name.clone(),
            size_in_kb: volume.size_in_kb,
        })
        .collect();
    record
}

/// Records that resolved to a registered SDC
pub fn client_count(records: &[SdcRecord]) -> u32 {
    u32::try_from(records.iter().filter(|r| !r.sdc_id.is_empty()).count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{host_entry, sdc_host};
    use powerflex_client::sample_sdc;

    #[test]
    fn test_one_record_per_entry_in_order() {
        let mut mdm = sdc_host("10.0.0.1");
        mdm.is_sdc = Some("No".to_string());
        mdm.is_mdm_or_tb = Some("Yes".to_string());
        let entries = vec![host_entry(&sdc_host("10.0.0.21")), host_entry(&mdm), host_entry(&sdc_host("10.0.0.22"))];
        let observed = vec![
            Some(ObservedClient {
                sdc: sample_sdc("sdc-1", "10.0.0.21", Some("worker-1")),
                devices: vec![MappedVolume {
                    id: "vol-1".to_string(),
                    size_in_kb: 8_388_608,
                    ..Default::default()
                }],
            }),
            None,
            Some(ObservedClient {
                sdc: sample_sdc("sdc-2", "10.0.0.22", None),
                devices: Vec::new(),
            }),
        ];

        let records = build_records(&entries, &observed);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].sdc_id, "sdc-1");
        assert_eq!(records[0].name.as_deref(), Some("worker-1"));
        assert_eq!(records[0].devices[0].volume_id, "vol-1");
        assert_eq!(records[1].declared_ip.as_deref(), Some("10.0.0.1"));
        assert!(records[1].is_mdm_or_tb);
        assert!(records[1].sdc_id.is_empty());
        assert_eq!(records[2].sdc_guid, "guid-sdc-2");
        assert_eq!(client_count(&records), 2);
    }

    #[test]
    fn test_role_only_entry_ignores_observed_client() {
        let mut spec = sdc_host("10.0.0.1");
        spec.is_sdc = Some("no".to_string());
        let entry = host_entry(&spec);
        let observed = ObservedClient {
            sdc: sample_sdc("sdc-9", "10.0.0.1", None),
            devices: Vec::new(),
        };
        assert!(record_for(&entry, Some(&observed)).sdc_id.is_empty());
    }

    #[test]
    fn test_password_is_not_recorded() {
        let mut spec = sdc_host("10.0.0.21");
        spec.password = Some("hunter2".to_string());
        let record = record_for(&host_entry(&spec), None);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
