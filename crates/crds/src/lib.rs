//! FlexFleet CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for FlexFleet controllers.

pub mod sdc_fleet;

pub use sdc_fleet::*;
