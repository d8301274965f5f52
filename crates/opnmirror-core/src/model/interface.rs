// ── Interface and VLAN domain types ──

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::ids::VlanTag;

/// A logical interface assignment (`lan`, `wan`, `opt1`) bound to a
/// device (`igc0`, `vlan0.100`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    /// Device the assignment is bound to. For VLAN interfaces this is the
    /// VLAN device, not the physical parent.
    pub device: String,
    pub description: String,
    pub ip_address: Option<Ipv4Addr>,
    pub subnet_bits: Option<u8>,
    pub enabled: bool,
}

/// An 802.1Q VLAN device on a parent interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub parent_interface: String,
    pub tag: VlanTag,
    /// Resulting VLAN device name (`vlan0.100`).
    pub device: String,
    pub description: String,
    /// 802.1p priority code point, 0-7.
    pub priority: u8,
    pub remote_id: Option<String>,
}

impl Vlan {
    /// Natural key for a `(parent, tag)` pair.
    pub fn key_for(parent_interface: &str, tag: VlanTag) -> String {
        format!("{parent_interface}/{tag}")
    }
}
