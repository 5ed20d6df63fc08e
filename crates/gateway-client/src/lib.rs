//! PowerFlex Installer Gateway Client
//!
//! Client for the installation manager (IM) exposed by the PowerFlex gateway.
//! The IM installs SDC packages on new hosts from a CSV description of the
//! cluster topology.
//!
//! # Example
//!
//! ```no_run
//! use gateway_client::{GatewayClient, GatewayClientTrait, MdmValidationRequest};
//!
//! # async fn example(csv: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = GatewayClient::new(
//!     "https://powerflex-gw:443".to_string(),
//!     "admin".to_string(),
//!     "password".to_string(),
//!     false,
//! )?;
//!
//! let batch = gateway.parse_batch(csv).await?;
//! gateway.reset_queue().await?;
//! let validation = gateway
//!     .validate_mdm_credentials(&MdmValidationRequest::default())
//!     .await?;
//! if validation.is_success() {
//!     gateway.begin_installation(&batch).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod gateway_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::GatewayClient;
pub use common::HttpClient;
pub use error::GatewayError;
pub use models::*;
pub use gateway_trait::GatewayClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockGatewayClient, MockStep};
