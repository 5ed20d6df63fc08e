//! Attribute Mutator
//!
//! Applies declared name and performance profile to an SDC that already
//! exists. The two changes are independent: one failing does not stop the
//! other, and both failures are reported.

use crate::reconciler::fleet_error::FleetError;
use crate::reconciler::host::HostEntry;
use crate::reconciler::state::{observe_client, ObservedClient};
use powerflex_client::{PowerFlexClientTrait, Sdc};
use tracing::{info, warn};

/// Result of mutating one SDC
#[derive(Debug)]
pub struct MutationOutcome {
    /// SDC as re-read after the mutations
    pub client: ObservedClient,
    pub failures: Vec<FleetError>,
}

/// Rename when the declared name differs, always re-apply a declared
/// profile, then re-read the SDC.
pub async fn apply_mutations(array: &dyn PowerFlexClientTrait, entry: &HostEntry, current: &Sdc) -> MutationOutcome {
    let mut failures = Vec::new();

    if let Some(name) = entry.name.as_deref() {
        if current.name.as_deref() != Some(name) {
            match array.rename_client(&current.id, name).await {
                Ok(()) => info!("Renamed SDC {} to {}", current.id, name),
                Err(source) => {
                    warn!("Failed to rename SDC {}: {}", current.id, source);
                    failures.push(FleetError::Mutation {
                        id: current.id.clone(),
                        action: "rename",
                        source,
                    });
                }
            }
        }
    }

    if let Some(profile) = entry.performance_profile {
        if let Err(source) = array.set_client_performance_profile(&current.id, profile).await {
            warn!("Failed to set performance profile of SDC {}: {}", current.id, source);
            failures.push(FleetError::Mutation {
                id: current.id.clone(),
                action: "profile",
                source,
            });
        }
    }

    let client = match observe_client(array, &current.id).await {
        Ok(client) => client,
        Err(e) => {
            failures.push(FleetError::Array(e));
            ObservedClient {
                sdc: current.clone(),
                devices: Vec::new(),
            }
        }
    };

    MutationOutcome { client, failures }
}
