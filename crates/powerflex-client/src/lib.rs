//! PowerFlex REST API Client
//!
//! A Rust client library for the PowerFlex array management API.
//! Provides type-safe models and methods for the SDC (storage data client)
//! directory and the SDC lifecycle actions used by FlexFleet.
//!
//! # Example
//!
//! ```no_run
//! use powerflex_client::{ClientSelector, PowerFlexClient, PowerFlexClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PowerFlexClient::new(
//!     "https://powerflex-gw:443".to_string(),
//!     "admin".to_string(),
//!     "password".to_string(),
//!     false,
//! )?;
//!
//! let system = client.resolve_system().await?;
//! let sdc = client.find_client(&ClientSelector::Ip("10.0.0.21".to_string())).await?;
//! client.rename_client(&sdc.id, "worker-21").await?;
//! # let _ = system;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod powerflex_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::PowerFlexClient;
pub use common::HttpClient;
pub use error::PowerFlexError;
pub use models::*;
pub use powerflex_trait::PowerFlexClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{sample_sdc, MockOperation, MockPowerFlexClient};
