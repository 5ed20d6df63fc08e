//! Deletion Executor
//!
//! Unregisters the SDCs of removed hosts. The first failure stops the run;
//! later deletions are not attempted. An SDC that is already gone only
//! produces a warning.

use crate::reconciler::diagnostics::Diagnostics;
use crate::reconciler::fleet_error::FleetError;
use crate::reconciler::lookup::{find_client, LookupKeys};
use crds::SdcRecord;
use powerflex_client::PowerFlexClientTrait;
use tracing::info;

/// Delete the SDC behind each record, in order. Returns how many were deleted.
pub async fn delete_removed(
    array: &dyn PowerFlexClientTrait,
    removed: &[&SdcRecord],
    diagnostics: &mut Diagnostics,
) -> Result<usize, FleetError> {
    let mut deleted = 0;

    for record in removed.iter().filter(|record| record.is_sdc) {
        let id = if record.sdc_id.is_empty() {
            let keys = LookupKeys {
                id: record.declared_id.as_deref(),
                ip: record.declared_ip.as_deref(),
                name: record.name.as_deref(),
            };
            match find_client(array, &keys).await {
                Ok(sdc) => sdc.id,
                Err(e) if e.is_not_found() => {
                    diagnostics.warn("delete", format!("nothing to delete: {}", e));
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            record.sdc_id.clone()
        };

        match array.delete_client(&id).await {
            Ok(()) => {
                info!("Deleted SDC {}", id);
                deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                diagnostics.warn("delete", format!("SDC {} was already removed", id));
            }
            Err(source) => return Err(FleetError::Delete { id, source }),
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerflex_client::{sample_sdc, MockOperation, MockPowerFlexClient};

    fn record(sdc_id: &str, ip: &str) -> SdcRecord {
        SdcRecord {
            declared_ip: Some(ip.to_string()),
            is_sdc: true,
            sdc_id: sdc_id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_halts_on_first_failure() {
        let array = MockPowerFlexClient::new("https://pflex");
        for (id, ip) in [("sdc-1", "10.0.0.21"), ("sdc-2", "10.0.0.22"), ("sdc-3", "10.0.0.23")] {
            array.add_client(sample_sdc(id, ip, None));
        }
        array.fail_on(MockOperation::Delete, "sdc-2", "SDC has mapped volumes");

        let records = [record("sdc-1", "10.0.0.21"), record("sdc-2", "10.0.0.22"), record("sdc-3", "10.0.0.23")];
        let removed: Vec<&SdcRecord> = records.iter().collect();
        let mut diagnostics = Diagnostics::new();

        let err = delete_removed(&array, &removed, &mut diagnostics).await.unwrap_err();

        assert!(matches!(&err, FleetError::Delete { id, .. } if id == "sdc-2"));
        assert_eq!(array.calls_to("delete_client"), vec!["delete_client:sdc-1", "delete_client:sdc-2"]);
        assert!(array.client("sdc-3").is_some());
    }

    #[tokio::test]
    async fn test_missing_id_is_resolved_by_lookup() {
        let array = MockPowerFlexClient::new("https://pflex");
        array.add_client(sample_sdc("sdc-7", "10.0.0.27", None));

        let records = [record("", "10.0.0.27")];
        let removed: Vec<&SdcRecord> = records.iter().collect();
        let deleted = delete_removed(&array, &removed, &mut Diagnostics::new()).await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(array.client_count(), 0);
    }

    #[tokio::test]
    async fn test_already_gone_is_a_warning() {
        let array = MockPowerFlexClient::new("https://pflex");
        let records = [record("sdc-9", "10.0.0.29")];
        let removed: Vec<&SdcRecord> = records.iter().collect();
        let mut diagnostics = Diagnostics::new();

        let deleted = delete_removed(&array, &removed, &mut diagnostics).await.unwrap();

        assert_eq!(deleted, 0);
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.steps(), vec!["delete"]);
    }
}
