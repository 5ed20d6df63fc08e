//! Diff Engine
//!
//! Finds the previously reconciled records whose host is no longer declared.
//! Pure; the result only drives the Deletion Executor.

use crate::reconciler::host::HostEntry;
use crds::SdcRecord;

/// Identity of a host across cycles
///
/// A prior record knows both what was declared and what it resolved to, so
/// its id falls back to the resolved SDC id and its ip to the observed ip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryIdentity<'a> {
    pub id: Option<&'a str>,
    pub ip: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> EntryIdentity<'a> {
    pub fn of_entry(entry: &'a HostEntry) -> Self {
        Self {
            id: entry.id(),
            ip: entry.ip(),
            name: entry.name.as_deref(),
        }
    }

    pub fn of_record(record: &'a SdcRecord) -> Self {
        Self {
            id: record.declared_id.as_deref().or(non_empty(&record.sdc_id)),
            ip: record.declared_ip.as_deref().or(non_empty(&record.sdc_ip)),
            name: record.name.as_deref(),
        }
    }

    /// Compare by id when both sides have one, else by ip, else by name.
    /// Ids compare case-sensitively.
    pub fn matches(&self, other: &EntryIdentity<'_>) -> bool {
        if let (Some(a), Some(b)) = (self.id, other.id) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.ip, other.ip) {
            return a == b;
        }
        match (self.name, other.name) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// Prior SDC records absent from `declared`.
///
/// Records of role-only hosts are never returned.
pub fn removed_records<'p>(prior: &'p [SdcRecord], declared: &[HostEntry]) -> Vec<&'p SdcRecord> {
    let declared: Vec<EntryIdentity<'_>> = declared.iter().map(EntryIdentity::of_entry).collect();
    prior
        .iter()
        .filter(|record| record.is_sdc)
        .filter(|record| {
            let identity = EntryIdentity::of_record(record);
            !declared.iter().any(|candidate| identity.matches(candidate))
        })
        .collect()
}

/// The prior record for `entry`, if any
pub fn prior_record<'p>(prior: &'p [SdcRecord], entry: &HostEntry) -> Option<&'p SdcRecord> {
    let identity = EntryIdentity::of_entry(entry);
    prior
        .iter()
        .find(|record| EntryIdentity::of_record(record).matches(&identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::host::{HostIdentity, InstallFields, RoleFlag};

    fn entry(identity: HostIdentity, name: Option<&str>, is_sdc: RoleFlag) -> HostEntry {
        HostEntry {
            identity,
            name: name.map(str::to_string),
            username: None,
            password: None,
            operating_system: None,
            is_mdm_or_tb: RoleFlag::No,
            is_sdc,
            is_rfcache: RoleFlag::No,
            is_sdr: RoleFlag::No,
            performance_profile: None,
            install: InstallFields::default(),
        }
    }

    fn by_ip(ip: &str) -> HostEntry {
        entry(HostIdentity::Ip(ip.to_string()), None, RoleFlag::Yes)
    }

    fn record_for(entry: &HostEntry, sdc_id: &str) -> SdcRecord {
        SdcRecord {
            declared_id: entry.id().map(str::to_string),
            declared_ip: entry.ip().map(str::to_string),
            name: entry.name.clone(),
            is_sdc: entry.is_sdc(),
            sdc_id: sdc_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_diff_of_same_set_is_empty() {
        let entries = vec![by_ip("10.0.0.21"), by_ip("10.0.0.22")];
        let prior: Vec<SdcRecord> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| record_for(e, &format!("sdc-{}", i)))
            .collect();
        assert!(removed_records(&prior, &entries).is_empty());
    }

    #[test]
    fn test_diff_returns_exactly_the_dropped_entries() {
        let old = vec![by_ip("10.0.0.21"), by_ip("10.0.0.22"), by_ip("10.0.0.23")];
        let prior: Vec<SdcRecord> = old
            .iter()
            .enumerate()
            .map(|(i, e)| record_for(e, &format!("sdc-{}", i)))
            .collect();
        let new = vec![by_ip("10.0.0.22"), by_ip("10.0.0.24")];

        let removed: Vec<&str> = removed_records(&prior, &new)
            .iter()
            .map(|r| r.sdc_id.as_str())
            .collect();
        assert_eq!(removed, vec!["sdc-0", "sdc-2"]);
    }

    #[test]
    fn test_attribute_changes_are_not_removals() {
        let old = entry(HostIdentity::Ip("10.0.0.21".to_string()), Some("old-name"), RoleFlag::Yes);
        let prior = vec![record_for(&old, "sdc-1")];
        let new = vec![entry(HostIdentity::Ip("10.0.0.21".to_string()), Some("new-name"), RoleFlag::Yes)];
        assert!(removed_records(&prior, &new).is_empty());
    }

    #[test]
    fn test_resolved_id_keeps_host_redeclared_by_id() {
        let prior = vec![record_for(&by_ip("10.0.0.21"), "sdc-1")];
        let new = vec![entry(HostIdentity::Id("sdc-1".to_string()), None, RoleFlag::Yes)];
        assert!(removed_records(&prior, &new).is_empty());
    }

    #[test]
    fn test_ids_compare_case_sensitively() {
        let old = entry(HostIdentity::Id("abc".to_string()), None, RoleFlag::Yes);
        let prior = vec![record_for(&old, "abc")];
        let new = vec![entry(HostIdentity::Id("ABC".to_string()), None, RoleFlag::Yes)];
        assert_eq!(removed_records(&prior, &new).len(), 1);
    }

    #[test]
    fn test_role_only_records_are_never_removed() {
        let mdm = entry(HostIdentity::Ip("10.0.0.1".to_string()), None, RoleFlag::No);
        let prior = vec![record_for(&mdm, "")];
        assert!(removed_records(&prior, &[]).is_empty());
    }

    #[test]
    fn test_prior_record_lookup() {
        let prior = vec![record_for(&by_ip("10.0.0.21"), "sdc-1")];
        assert_eq!(prior_record(&prior, &by_ip("10.0.0.21")).map(|r| r.sdc_id.as_str()), Some("sdc-1"));
        assert!(prior_record(&prior, &by_ip("10.0.0.99")).is_none());
    }
}
