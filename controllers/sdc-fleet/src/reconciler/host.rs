//! Host Entry Model
//!
//! Converts the loosely typed `SdcHostSpec` rows of an `SdcFleet` into
//! validated `HostEntry` values. Every problem across every row is collected
//! before the caller is told, so a manifest can be fixed in one pass.

use crate::reconciler::fleet_error::FleetError;
use crds::SdcHostSpec;
use powerflex_client::PerformanceProfile;
use std::collections::HashSet;

/// Longest SDC name the array accepts
pub const MAX_NAME_LEN: usize = 31;

/// Yes/No role flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFlag {
    Yes,
    No,
}

impl RoleFlag {
    /// Parse a flag, ignoring case. Absent or blank values take `default`.
    pub fn parse(raw: Option<&str>, default: RoleFlag) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(default),
            Some(value) if value.eq_ignore_ascii_case("yes") => Ok(RoleFlag::Yes),
            Some(value) if value.eq_ignore_ascii_case("no") => Ok(RoleFlag::No),
            Some(value) => Err(format!("expected Yes or No, got {:?}", value)),
        }
    }

    pub fn is_yes(self) -> bool {
        self == RoleFlag::Yes
    }

    /// Value written to the installer CSV
    pub fn as_str(self) -> &'static str {
        match self {
            RoleFlag::Yes => "Yes",
            RoleFlag::No => "No",
        }
    }
}

/// The authoritative identity of a declared host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostIdentity {
    /// Existing SDC id on the array
    Id(String),
    /// Host IP; the SDC may not exist yet
    Ip(String),
}

/// Fields only the installer reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallFields {
    pub mdm_ips: Option<String>,
    pub mdm_mgmt_ip: Option<String>,
    pub sds_storage_device_list: Option<String>,
    pub storage_pool_list: Option<String>,
    pub sds_all_ips: Option<String>,
    pub sdr_all_ips: Option<String>,
    pub virtual_ips: Option<String>,
    pub virtual_ip_nics: Option<String>,
}

/// A validated fleet member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub identity: HostIdentity,
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub operating_system: Option<String>,
    pub is_mdm_or_tb: RoleFlag,
    pub is_sdc: RoleFlag,
    pub is_rfcache: RoleFlag,
    pub is_sdr: RoleFlag,
    pub performance_profile: Option<PerformanceProfile>,
    pub install: InstallFields,
}

impl HostEntry {
    /// Validate one declared row.
    ///
    /// Returns every problem found in the row, not just the first.
    pub fn from_spec(spec: &SdcHostSpec) -> Result<Self, Vec<String>> {
        let mut problems = Vec::new();

        let id = non_empty(&spec.id);
        let ip = non_empty(&spec.ip);
        let identity = match (id, ip) {
            (Some(id), None) => Some(HostIdentity::Id(id)),
            (None, Some(ip)) => Some(HostIdentity::Ip(ip)),
            (Some(_), Some(_)) => {
                problems.push("id and ip are mutually exclusive".to_string());
                None
            }
            (None, None) => {
                problems.push("one of id or ip is required".to_string());
                None
            }
        };

        let name = non_empty(&spec.name);
        if let Some(name) = &name {
            if name.chars().count() > MAX_NAME_LEN {
                problems.push(format!("name {:?} is longer than {} characters", name, MAX_NAME_LEN));
            }
        }

        let mut flag = |field: &str, raw: &Option<String>, default: RoleFlag| {
            RoleFlag::parse(raw.as_deref(), default).unwrap_or_else(|e| {
                problems.push(format!("{}: {}", field, e));
                default
            })
        };
        let is_mdm_or_tb = flag("isMdmOrTb", &spec.is_mdm_or_tb, RoleFlag::No);
        let is_sdc = flag("isSdc", &spec.is_sdc, RoleFlag::Yes);
        let is_rfcache = flag("isRfcache", &spec.is_rfcache, RoleFlag::No);
        let is_sdr = flag("isSdr", &spec.is_sdr, RoleFlag::No);

        let performance_profile = match non_empty(&spec.performance_profile) {
            Some(raw) => match PerformanceProfile::parse(&raw) {
                Some(profile) => Some(profile),
                None => {
                    problems.push(format!("performanceProfile must be HighPerformance or Compact, got {:?}", raw));
                    None
                }
            },
            None => None,
        };

        match identity {
            Some(identity) if problems.is_empty() => Ok(Self {
                identity,
                name,
                username: non_empty(&spec.username),
                password: non_empty(&spec.password),
                operating_system: non_empty(&spec.operating_system),
                is_mdm_or_tb,
                is_sdc,
                is_rfcache,
                is_sdr,
                performance_profile,
                install: InstallFields {
                    mdm_ips: non_empty(&spec.mdm_ips),
                    mdm_mgmt_ip: non_empty(&spec.mdm_mgmt_ip),
                    sds_storage_device_list: non_empty(&spec.sds_storage_device_list),
                    storage_pool_list: non_empty(&spec.storage_pool_list),
                    sds_all_ips: non_empty(&spec.sds_all_ips),
                    sdr_all_ips: non_empty(&spec.sdr_all_ips),
                    virtual_ips: non_empty(&spec.virtual_ips),
                    virtual_ip_nics: non_empty(&spec.virtual_ip_nics),
                },
            }),
            _ => Err(problems),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match &self.identity {
            HostIdentity::Id(id) => Some(id),
            HostIdentity::Ip(_) => None,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        match &self.identity {
            HostIdentity::Ip(ip) => Some(ip),
            HostIdentity::Id(_) => None,
        }
    }

    /// Entries that are not SDCs are descriptive only
    pub fn is_sdc(&self) -> bool {
        self.is_sdc.is_yes()
    }
}

/// Validate every declared row, rejecting duplicates.
///
/// Fails with all problems of all rows joined into one `Validation` error.
pub fn validate_hosts(specs: &[SdcHostSpec]) -> Result<Vec<HostEntry>, FleetError> {
    let mut entries = Vec::with_capacity(specs.len());
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    for (index, spec) in specs.iter().enumerate() {
        match HostEntry::from_spec(spec) {
            Ok(entry) => {
                if !seen.insert(entry.identity.clone()) {
                    problems.push(format!("hosts[{}]: duplicate identity {:?}", index, entry.identity));
                }
                entries.push(entry);
            }
            Err(row_problems) => {
                problems.extend(row_problems.into_iter().map(|p| format!("hosts[{}]: {}", index, p)));
            }
        }
    }

    if problems.is_empty() {
        Ok(entries)
    } else {
        Err(FleetError::Validation(problems.join("; ")))
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
