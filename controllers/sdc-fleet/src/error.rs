//! Controller-specific error types.
//!
//! This module defines error types specific to the SDC Fleet Controller
//! that are not covered by upstream library errors.

use crate::reconciler::FleetError;
use gateway_client::GatewayError;
use kube::Error as KubeError;
use powerflex_client::PowerFlexError;
use thiserror::Error;

/// Errors that can occur in the SDC Fleet Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// PowerFlex array API error
    #[error("PowerFlex error: {0}")]
    PowerFlex(#[from] PowerFlexError),

    /// Installer gateway API error
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Fleet reconciliation failed
    #[error("Fleet reconciliation failed: {0}")]
    Fleet(#[from] FleetError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Probe/metrics server failed
    #[error("Metrics server error: {0}")]
    Metrics(String),
}
