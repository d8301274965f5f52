//! Async client for the OPNsense REST API.
//!
//! Covers the slice of the appliance API the mirror needs: system version
//! (connectivity test), interfaces, VLANs, filter rules, NAT port forwards,
//! and DHCPv4 scopes with their static mappings. Every endpoint is an
//! inherent method on [`OpnClient`], grouped by resource under
//! [`endpoints`].

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::ApiCredentials;
pub use client::OpnClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
