//! PowerFlexClient trait for mocking
//!
//! This trait abstracts the PowerFlexClient to enable mocking in unit tests.
//! The concrete PowerFlexClient implements this trait, and tests can use mock implementations.

use crate::error::PowerFlexError;
use crate::models::*;

/// Trait for PowerFlex array API operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait PowerFlexClientTrait: Send + Sync {
    /// Get the array endpoint
    fn endpoint(&self) -> &str;

    /// Check credentials and connectivity
    async fn validate_credentials(&self) -> Result<(), PowerFlexError>;

    // System
    async fn resolve_system(&self) -> Result<System, PowerFlexError>;
    async fn approve_client(&self, system_id: &str, target: &ApprovalTarget) -> Result<(), PowerFlexError>;

    // SDC directory
    async fn list_clients(&self) -> Result<Vec<Sdc>, PowerFlexError>;
    async fn find_client(&self, selector: &ClientSelector) -> Result<Sdc, PowerFlexError>;
    async fn get_client_by_id(&self, id: &str) -> Result<Sdc, PowerFlexError>;
    async fn get_client_devices(&self, id: &str) -> Result<Vec<MappedVolume>, PowerFlexError>;

    // SDC mutations
    async fn rename_client(&self, id: &str, name: &str) -> Result<(), PowerFlexError>;
    async fn set_client_performance_profile(&self, id: &str, profile: PerformanceProfile) -> Result<(), PowerFlexError>;
    async fn set_approved_ips(&self, id: &str, ips: &[String]) -> Result<(), PowerFlexError>;
    async fn delete_client(&self, id: &str) -> Result<(), PowerFlexError>;
}
