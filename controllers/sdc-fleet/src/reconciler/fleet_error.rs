//! Errors raised by the fleet engine, one variant per failing step.

use crate::reconciler::lookup::LookupError;
use gateway_client::GatewayError;
use powerflex_client::PowerFlexError;
use thiserror::Error;

/// Failure of one step of a fleet reconciliation cycle
#[derive(Debug, Error)]
pub enum FleetError {
    /// Declared hosts are malformed; nothing was sent to the array
    #[error("invalid host entries: {0}")]
    Validation(String),

    #[error("SDC lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("PowerFlex request failed: {0}")]
    Array(#[from] PowerFlexError),

    #[error("installer rejected the CSV batch: {0}")]
    Stage(#[source] GatewayError),

    #[error("failed to reset the installer queue: {0}")]
    Reset(#[source] GatewayError),

    #[error("cannot resolve MDM target: {0}")]
    TargetResolution(String),

    /// Non-200 answer from the MDM credential check
    #[error("MDM credential validation failed with status {code}: {message}")]
    CredentialValidation { code: u16, message: String },

    #[error("failed to start installation: {0}")]
    Install(#[source] GatewayError),

    #[error("installation did not complete: {0}")]
    Poll(String),

    #[error("failed to delete SDC {id}: {source}")]
    Delete {
        id: String,
        #[source]
        source: PowerFlexError,
    },

    #[error("failed to {action} SDC {id}: {source}")]
    Mutation {
        id: String,
        action: &'static str,
        #[source]
        source: PowerFlexError,
    },
}

impl FleetError {
    /// Name of the step that failed, as reported in diagnostics
    pub fn step(&self) -> &'static str {
        match self {
            FleetError::Validation(_) => "validate-hosts",
            FleetError::Lookup(_) => "lookup",
            FleetError::Array(_) => "array",
            FleetError::Stage(_) => "stage",
            FleetError::Reset(_) => "reset",
            FleetError::TargetResolution(_) => "resolve-target",
            FleetError::CredentialValidation { .. } => "validate",
            FleetError::Install(_) => "install",
            FleetError::Poll(_) => "poll",
            FleetError::Delete { .. } => "delete",
            FleetError::Mutation { action, .. } => *action,
        }
    }
}
