//! Client for extracting the operational state of a Cisco ACI fabric.
//!
//! The APIC exposes its object tree over a REST API; this crate logs in,
//! keeps the session token fresh, and normalizes the hierarchical managed
//! objects into flat records: tenants, application profiles, EPGs, bridge
//! domains, VRFs, contracts, fabric nodes (including FEXes), interfaces and
//! static path bindings.

pub mod client;
pub mod config;
pub mod dn;
pub mod error;
pub mod model;
pub mod session;

mod tenancy;
mod topology;

pub use client::AciClient;
pub use config::ApicConfig;
pub use error::{AciError, AciResult};
