//! GatewayClient trait for mocking
//!
//! This trait abstracts the installer gateway so the batch installation
//! workflow can be unit tested without a live installation manager.

use crate::error::GatewayError;
use crate::models::*;

/// Trait for installer gateway operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait GatewayClientTrait: Send + Sync {
    /// Get the gateway endpoint
    fn endpoint(&self) -> &str;

    /// Check credentials and connectivity
    async fn validate_login(&self) -> Result<(), GatewayError>;

    // Installation workflow, in the order it is driven
    async fn parse_batch(&self, csv: &str) -> Result<ParsedBatch, GatewayError>;
    async fn reset_queue(&self) -> Result<(), GatewayError>;
    async fn validate_mdm_credentials(&self, request: &MdmValidationRequest) -> Result<MdmValidation, GatewayError>;
    async fn begin_installation(&self, batch: &ParsedBatch) -> Result<(), GatewayError>;
    async fn installation_status(&self) -> Result<InstallationStatus, GatewayError>;
}
