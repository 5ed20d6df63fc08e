//! Unit tests for the fleet engine against the mock array and installer

#[cfg(test)]
mod tests {
    use crate::reconciler::fleet_error::FleetError;
    use crate::reconciler::install::InstallState;
    use crate::test_utils::*;
    use crds::SdcRecord;
    use powerflex_client::{sample_sdc, MockOperation, System};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn restricted(mode: &str) -> System {
        System {
            id: "system-1".to_string(),
            restricted_sdc_mode: Some(mode.to_string()),
            restricted_sdc_mode_enabled: true,
            ..Default::default()
        }
    }

    fn recorded(sdc_id: &str, ip: &str) -> SdcRecord {
        SdcRecord {
            declared_ip: Some(ip.to_string()),
            is_sdc: true,
            sdc_id: sdc_id.to_string(),
            sdc_ip: ip.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_fleet_installs_and_records_in_order() {
        let array = mock_array();
        let gateway = mock_gateway();
        register_on_install(&array, &gateway, &["10.0.0.1"], true);
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21"), sdc_host("10.0.0.22")]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        assert!(report.is_clean(), "{:?}", report.diagnostics);
        assert_eq!(report.install, Some(InstallState::Done));
        assert_eq!(report.install_outcome, Some(InstallState::InstallTriggered));
        let records = report.result.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].declared_ip.as_deref(), Some("10.0.0.1"));
        assert!(records[0].sdc_id.is_empty());
        assert_eq!(records[1].sdc_id, "sdc-21");
        assert_eq!(records[2].sdc_id, "sdc-22");
        assert_eq!(records[2].system_id, "system-1");
        assert_eq!(gateway.call_count("begin_installation"), 1);
    }

    #[tokio::test]
    async fn test_second_apply_is_a_no_op() {
        let array = mock_array();
        let gateway = mock_gateway();
        register_on_install(&array, &gateway, &["10.0.0.1"], true);
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21")]);
        let first = engine.apply(&spec, &[], &CancellationToken::new()).await.result.unwrap();
        let gateway_calls = gateway.calls().len();

        let second = engine.apply(&spec, &first, &CancellationToken::new()).await;

        assert!(second.is_clean());
        assert_eq!(second.install, None);
        assert_eq!(second.result.unwrap(), first);
        assert_eq!(gateway.calls().len(), gateway_calls);
        assert!(array.calls_to("rename_client").is_empty());
        assert!(array.calls_to("delete_client").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_hosts_make_no_remote_calls() {
        let array = mock_array();
        let gateway = mock_gateway();
        let engine = engine(&array, &gateway);
        let mut conflicting = sdc_host("10.0.0.21");
        conflicting.id = Some("sdc-21".to_string());
        let spec = fleet_spec(vec![conflicting]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        assert!(matches!(report.result, Err(FleetError::Validation(_))));
        assert_eq!(report.diagnostics.steps(), vec!["validate-hosts"]);
        assert!(array.calls().is_empty());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_failures_are_independent() {
        let array = mock_array();
        let gateway = mock_gateway();
        array.add_client(sample_sdc("sdc-21", "10.0.0.21", Some("old-21")));
        array.add_client(sample_sdc("sdc-22", "10.0.0.22", Some("old-22")));
        array.fail_on(MockOperation::Rename, "sdc-21", "name already in use");
        let engine = engine(&array, &gateway);

        let mut first = sdc_host("10.0.0.21");
        first.name = Some("worker-21".to_string());
        first.performance_profile = Some("Compact".to_string());
        let mut second = sdc_host("10.0.0.22");
        second.name = Some("worker-22".to_string());
        let spec = fleet_spec(vec![first, second]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        assert!(!report.is_clean());
        assert_eq!(report.diagnostics.steps(), vec!["rename"]);
        let records = report.result.unwrap();
        assert_eq!(records[0].name.as_deref(), Some("old-21"));
        assert_eq!(records[0].performance_profile.as_deref(), Some("Compact"));
        assert_eq!(records[1].name.as_deref(), Some("worker-22"));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_halts_on_first_failure() {
        let array = mock_array();
        let gateway = mock_gateway();
        for (id, ip) in [("sdc-30", "10.0.0.30"), ("sdc-31", "10.0.0.31"), ("sdc-32", "10.0.0.32"), ("sdc-40", "10.0.0.40")] {
            array.add_client(sample_sdc(id, ip, None));
        }
        array.fail_on(MockOperation::Delete, "sdc-31", "SDC has mapped volumes");
        let engine = engine(&array, &gateway);
        let prior = vec![
            recorded("sdc-30", "10.0.0.30"),
            recorded("sdc-31", "10.0.0.31"),
            recorded("sdc-32", "10.0.0.32"),
            recorded("sdc-40", "10.0.0.40"),
        ];
        let spec = fleet_spec(vec![sdc_host("10.0.0.40")]);

        let report = engine.apply(&spec, &prior, &CancellationToken::new()).await;

        match report.result {
            Err(FleetError::Delete { id, .. }) => assert_eq!(id, "sdc-31"),
            other => panic!("expected delete failure, got {:?}", other),
        }
        assert_eq!(array.calls_to("delete_client"), vec!["delete_client:sdc-30", "delete_client:sdc-31"]);
        assert!(array.client("sdc-32").is_some());
        assert!(array.calls_to("get_client_by_id").is_empty());
    }

    #[tokio::test]
    async fn test_new_host_reusing_a_removed_name_is_installed() {
        let array = mock_array();
        let gateway = mock_gateway();
        array.add_client(sample_sdc("sdc-21", "10.0.0.21", Some("worker")));
        register_on_install(&array, &gateway, &[], true);
        let engine = engine(&array, &gateway);
        let mut previous = recorded("sdc-21", "10.0.0.21");
        previous.name = Some("worker".to_string());
        let mut replacement = sdc_host("10.0.0.22");
        replacement.name = Some("worker".to_string());
        let spec = fleet_spec(vec![replacement]);

        let report = engine.apply(&spec, &[previous], &CancellationToken::new()).await;

        assert!(report.is_clean(), "{:?}", report.diagnostics);
        assert_eq!(array.calls_to("delete_client"), vec!["delete_client:sdc-21"]);
        assert_eq!(gateway.call_count("begin_installation"), 1);
        let records = report.result.unwrap();
        assert_eq!(records[0].declared_ip.as_deref(), Some("10.0.0.22"));
        assert_eq!(records[0].sdc_id, "sdc-22");
        assert_eq!(records[0].sdc_ip, "10.0.0.22");
        assert!(array.client("sdc-21").is_none());
        assert!(array.client("sdc-22").is_some());
    }

    #[tokio::test]
    async fn test_skipped_install_leaves_unresolved_hosts_empty() {
        let array = mock_array();
        let gateway = mock_gateway();
        gateway.set_known_ips(&["10.0.0.1", "10.0.0.21"]);
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21")]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        assert!(report.is_clean(), "{:?}", report.diagnostics);
        assert_eq!(report.install_outcome, Some(InstallState::Skipped));
        assert_eq!(report.install, Some(InstallState::Done));
        assert_eq!(report.diagnostics.steps(), vec!["install"]);
        let records = report.result.unwrap();
        assert_eq!(records[1].declared_ip.as_deref(), Some("10.0.0.21"));
        assert!(records[1].sdc_id.is_empty());
        assert_eq!(gateway.call_count("begin_installation"), 0);
    }

    #[tokio::test]
    async fn test_rejected_credentials_stop_before_install() {
        let array = mock_array();
        let gateway = mock_gateway();
        gateway.set_validation_response(401, "Invalid MDM credentials");
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21")]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        match report.result {
            Err(FleetError::CredentialValidation { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "Invalid MDM credentials");
            }
            other => panic!("expected credential failure, got {:?}", other),
        }
        assert_eq!(report.install, Some(InstallState::TargetResolved));
        assert_eq!(report.install_outcome, None);
        assert_eq!(gateway.call_count("begin_installation"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_timeout_is_a_hard_failure() {
        let array = mock_array();
        let gateway = mock_gateway();
        gateway.set_statuses(&["running"]);
        let engine = engine(&array, &gateway);
        let mut spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21")]);
        spec.install_timeout_minutes = 2;

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        assert!(matches!(report.result, Err(FleetError::Poll(_))));
        assert_eq!(report.install, Some(InstallState::InstallTriggered));
        assert_eq!(gateway.call_count("installation_status"), 3);
        assert!(array.calls_to("resolve_system").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_install_phase_is_reported() {
        let array = mock_array();
        let gateway = mock_gateway();
        gateway.set_statuses(&["running", "failed"]);
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21")]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        assert!(matches!(report.result, Err(FleetError::Poll(_))));
        assert_eq!(report.diagnostics.steps(), vec!["poll"]);
        assert_eq!(gateway.call_count("installation_status"), 2);
    }

    #[tokio::test]
    async fn test_guid_mode_approves_new_clients_by_guid() {
        let array = mock_array();
        array.set_system(restricted("Guid"));
        let gateway = mock_gateway();
        register_on_install(&array, &gateway, &["10.0.0.1"], false);
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21")]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        let records = report.result.unwrap();
        assert_eq!(array.calls_to("approve_client"), vec!["approve_client:guid-sdc-21"]);
        assert!(records[1].sdc_approved);
    }

    #[tokio::test]
    async fn test_approved_ip_mode_sets_the_client_ip() {
        let array = mock_array();
        array.set_system(restricted("ApprovedIp"));
        let gateway = mock_gateway();
        register_on_install(&array, &gateway, &["10.0.0.1"], false);
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21")]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        assert!(report.is_clean());
        assert_eq!(array.calls_to("set_approved_ips"), vec!["set_approved_ips:sdc-21"]);
        assert!(array.calls_to("approve_client").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_declared_id_is_fatal() {
        let array = mock_array();
        let gateway = mock_gateway();
        let engine = engine(&array, &gateway);
        let declared = crds::SdcHostSpec {
            id: Some("sdc-missing".to_string()),
            ..Default::default()
        };
        let spec = fleet_spec(vec![declared]);

        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;

        match report.result {
            Err(FleetError::Lookup(e)) => assert!(e.is_not_found()),
            other => panic!("expected lookup failure, got {:?}", other),
        }
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rereads_recorded_clients() {
        let array = mock_array();
        let gateway = mock_gateway();
        array.add_client(sample_sdc("sdc-21", "10.0.0.21", Some("worker-21")));
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![sdc_host("10.0.0.21")]);
        let records = engine.apply(&spec, &[], &CancellationToken::new()).await.result.unwrap();

        let mut moved = sample_sdc("sdc-21", "10.0.0.21", Some("worker-21"));
        moved.mdm_connection_state = "Disconnected".to_string();
        array.add_client(moved);
        let report = engine.refresh(&spec, &records).await;

        let refreshed = report.result.unwrap();
        assert_eq!(refreshed[0].mdm_connection_state, "Disconnected");
        assert!(array.calls_to("rename_client").is_empty());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_reports_drift_as_lookup_failure() {
        let array = mock_array();
        let gateway = mock_gateway();
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![sdc_host("10.0.0.21")]);

        let report = engine.refresh(&spec, &[recorded("sdc-21", "10.0.0.21")]).await;

        match report.result {
            Err(FleetError::Lookup(e)) => assert!(e.is_not_found()),
            other => panic!("expected lookup failure, got {:?}", other),
        }
        assert_eq!(report.diagnostics.steps(), vec!["lookup"]);
    }

    #[tokio::test]
    async fn test_teardown_unregisters_every_recorded_client() {
        let array = mock_array();
        let gateway = mock_gateway();
        array.add_client(sample_sdc("sdc-21", "10.0.0.21", None));
        array.add_client(sample_sdc("sdc-22", "10.0.0.22", None));
        let engine = engine(&array, &gateway);
        let mdm_record = SdcRecord {
            declared_ip: Some("10.0.0.1".to_string()),
            is_mdm_or_tb: true,
            ..Default::default()
        };
        let prior = vec![mdm_record, recorded("sdc-21", "10.0.0.21"), recorded("sdc-22", "10.0.0.22")];

        let report = engine.teardown(&prior).await;

        assert!(report.is_clean());
        assert_eq!(array.client_count(), 0);
        assert_eq!(array.calls_to("delete_client").len(), 2);
    }

    #[tokio::test]
    async fn test_installer_lease_serializes_installs() {
        let array = mock_array();
        let gateway = mock_gateway();
        register_on_install(&array, &gateway, &["10.0.0.1"], true);
        let engine = engine(&array, &gateway);
        let spec = fleet_spec(vec![mdm_host("10.0.0.1"), sdc_host("10.0.0.21")]);
        let lease = engine.installer_lease();

        let guard = lease.lock().await;
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            engine.apply(&spec, &[], &CancellationToken::new()),
        )
        .await;
        assert!(blocked.is_err());
        assert_eq!(gateway.call_count("parse_batch"), 0);

        drop(guard);
        let report = engine.apply(&spec, &[], &CancellationToken::new()).await;
        assert!(report.is_clean());
    }
}
