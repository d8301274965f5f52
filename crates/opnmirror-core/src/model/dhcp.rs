// ── DHCPv4 domain types ──

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::ids::MacAddress;

/// A DHCPv4 scope bound to one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpServer {
    pub interface: String,
    pub enabled: bool,
    pub range_from: String,
    pub range_to: String,
    pub gateway: String,
    pub dns_servers: Vec<String>,
    pub domain: String,
}

/// A static `(mac, ip)` reservation inside a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpStaticMapping {
    /// Interface name of the owning scope.
    pub scope: String,
    pub mac_address: MacAddress,
    pub ip_address: Ipv4Addr,
    pub hostname: String,
    pub description: String,
    pub remote_id: Option<String>,
}

impl DhcpStaticMapping {
    pub fn key_for(scope: &str, mac: &MacAddress) -> String {
        format!("{scope}/{mac}")
    }
}
