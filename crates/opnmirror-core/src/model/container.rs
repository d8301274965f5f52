// ── Locally-originated container records ──
//
// Containers are never pulled from the appliance. Their network identity
// (IP, MAC, published ports) shares the conflict space with the mirrored
// entities.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{MacAddress, VlanTag};
use super::ports::{PortSpec, Protocol};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerNetwork {
    pub vlan_id: VlanTag,
    pub ip_address: Ipv4Addr,
    pub mac_address: MacAddress,
    /// Physical interface carrying the container's VLAN.
    pub parent_interface: String,
    pub allow_internet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn host_spec(&self) -> PortSpec {
        PortSpec::Range {
            start: self.host_port,
            end: self.host_port,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContainerStatus {
    #[default]
    Deployed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub network: ContainerNetwork,
    pub ports: Vec<PortMapping>,
    /// Interface the published ports are forwarded from.
    pub wan_interface: String,
    pub status: ContainerStatus,
    pub deployed_at: DateTime<Utc>,
}

impl Container {
    /// Whether a published port claims `(interface, protocol, port)`.
    pub fn publishes(&self, interface: &str, protocol: &Protocol, port: &PortSpec) -> bool {
        self.wan_interface == interface
            && self
                .ports
                .iter()
                .any(|p| p.protocol.overlaps(protocol) && p.host_spec().overlaps(port))
    }
}
