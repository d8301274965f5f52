// ── Declared resources ──
//
// What an operator asks for. Scalar validation (MAC format, VLAN range,
// IPv4 syntax) happens during deserialization through the model's
// validated types; `validate()` covers the cross-field rules.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{
    Container, ContainerNetwork, ContainerStatus, MacAddress, PortMapping, PortSpec, Protocol,
    RuleAction, Vlan, VlanTag,
};

fn default_protocol() -> Protocol {
    Protocol::Tcp
}

fn require(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn require_port(field: &str, port: u16) -> Result<(), CoreError> {
    if port == 0 {
        return Err(CoreError::validation(field, "must be 1-65535"));
    }
    Ok(())
}

// ── VLAN ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanSpec {
    pub parent_interface: String,
    pub tag: VlanTag,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: u8,
}

impl VlanSpec {
    pub fn natural_key(&self) -> String {
        Vlan::key_for(&self.parent_interface, self.tag)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require("parent_interface", &self.parent_interface)?;
        if self.priority > 7 {
            return Err(CoreError::validation("priority", "must be 0-7"));
        }
        Ok(())
    }
}

// ── Port forward ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForwardSpec {
    pub interface: String,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    pub external_port: u16,
    pub internal_ip: Ipv4Addr,
    /// Defaults to `external_port`.
    #[serde(default)]
    pub internal_port: Option<u16>,
    #[serde(default)]
    pub description: String,
}

impl PortForwardSpec {
    pub fn external(&self) -> PortSpec {
        PortSpec::Range {
            start: self.external_port,
            end: self.external_port,
        }
    }

    pub fn internal(&self) -> PortSpec {
        let port = self.internal_port.unwrap_or(self.external_port);
        PortSpec::Range {
            start: port,
            end: port,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require("interface", &self.interface)?;
        require_port("external_port", self.external_port)?;
        if let Some(port) = self.internal_port {
            require_port("internal_port", port)?;
        }
        if matches!(self.protocol, Protocol::Any | Protocol::Other(_)) {
            return Err(CoreError::validation(
                "protocol",
                format!("'{}' cannot be forwarded (use tcp, udp, or tcp/udp)", self.protocol),
            ));
        }
        Ok(())
    }
}

// ── Container ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerNetworkSpec {
    pub vlan_id: VlanTag,
    pub ip_address: Ipv4Addr,
    pub mac_address: MacAddress,
    pub parent_interface: String,
    #[serde(default)]
    pub allow_internet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMappingSpec {
    pub host_port: u16,
    pub container_port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub network: ContainerNetworkSpec,
    #[serde(default)]
    pub ports: Vec<PortMappingSpec>,
    /// Interface published ports are forwarded from; the mirror's default
    /// WAN interface when unset.
    #[serde(default)]
    pub wan_interface: Option<String>,
}

impl ContainerSpec {
    pub fn validate(&self) -> Result<(), CoreError> {
        require("name", &self.name)?;
        require("image", &self.image)?;
        require("network.parent_interface", &self.network.parent_interface)?;
        for (i, port) in self.ports.iter().enumerate() {
            require_port(&format!("ports[{i}].host_port"), port.host_port)?;
            require_port(&format!("ports[{i}].container_port"), port.container_port)?;
            if matches!(port.protocol, Protocol::Any | Protocol::Other(_)) {
                return Err(CoreError::validation(
                    format!("ports[{i}].protocol"),
                    "must be tcp, udp, or tcp/udp",
                ));
            }
        }
        for (i, a) in self.ports.iter().enumerate() {
            for b in &self.ports[i + 1..] {
                if a.host_port == b.host_port && a.protocol.overlaps(&b.protocol) {
                    return Err(CoreError::validation(
                        "ports",
                        format!("host port {}/{} is published twice", a.host_port, a.protocol),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The VLAN this container lives on.
    pub fn vlan(&self) -> VlanSpec {
        VlanSpec {
            parent_interface: self.network.parent_interface.clone(),
            tag: self.network.vlan_id,
            description: format!("Container {} VLAN", self.name),
            priority: 0,
        }
    }

    pub fn port_mappings(&self) -> Vec<PortMapping> {
        self.ports
            .iter()
            .map(|p| PortMapping {
                host_port: p.host_port,
                container_port: p.container_port,
                protocol: p.protocol.clone(),
            })
            .collect()
    }

    /// The record written once every deployment step succeeded.
    pub fn to_record(&self, wan_interface: &str) -> Container {
        Container {
            name: self.name.clone(),
            image: self.image.clone(),
            network: ContainerNetwork {
                vlan_id: self.network.vlan_id,
                ip_address: self.network.ip_address,
                mac_address: self.network.mac_address.clone(),
                parent_interface: self.network.parent_interface.clone(),
                allow_internet: self.network.allow_internet,
            },
            ports: self.port_mappings(),
            wan_interface: wan_interface.to_owned(),
            status: ContainerStatus::Deployed,
            deployed_at: chrono::Utc::now(),
        }
    }
}

// ── Proposal ────────────────────────────────────────────────────────

/// One declared resource, as read from a declaration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Proposal {
    Vlan(VlanSpec),
    PortForward(PortForwardSpec),
    Container(ContainerSpec),
}

impl Proposal {
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::Vlan(v) => v.validate(),
            Self::PortForward(p) => p.validate(),
            Self::Container(c) => c.validate(),
        }
    }

    /// Short human label (`vlan igc0/100`, `container web`).
    pub fn label(&self) -> String {
        match self {
            Self::Vlan(v) => format!("vlan {}", v.natural_key()),
            Self::PortForward(p) => {
                format!("port_forward {}/{}/{}", p.interface, p.protocol, p.external_port)
            }
            Self::Container(c) => format!("container {}", c.name),
        }
    }
}

// ── Appliance-side requests issued by the orchestrator ─────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRuleSpec {
    pub interface: String,
    pub action: RuleAction,
    pub protocol: String,
    pub source: String,
    pub destination: String,
    pub destination_port: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMappingSpec {
    pub scope: String,
    pub mac_address: MacAddress,
    pub ip_address: Ipv4Addr,
    pub hostname: String,
    pub description: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn container_yaml() -> serde_json::Value {
        serde_json::json!({
            "kind": "container",
            "name": "web",
            "image": "nginx:1.27",
            "network": {
                "vlan_id": 100,
                "ip_address": "10.0.100.5",
                "mac_address": "AA:BB:CC:DD:EE:01",
                "parent_interface": "igc0",
                "allow_internet": true
            },
            "ports": [{ "host_port": 80, "container_port": 8080 }]
        })
    }

    #[test]
    fn container_proposal_parses_with_defaults() {
        let p: Proposal = serde_json::from_value(container_yaml()).unwrap();
        let Proposal::Container(c) = p else {
            panic!("expected container");
        };
        assert_eq!(c.network.mac_address.as_str(), "aa:bb:cc:dd:ee:01");
        assert_eq!(c.ports[0].protocol, Protocol::Tcp);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn invalid_vlan_tag_fails_to_parse() {
        let raw = serde_json::json!({ "kind": "vlan", "parent_interface": "igc0", "tag": 4095 });
        assert!(serde_json::from_value::<Proposal>(raw).is_err());
    }

    #[test]
    fn zero_port_fails_validation() {
        let p: Proposal = serde_json::from_value(serde_json::json!({
            "kind": "port_forward", "interface": "wan", "external_port": 0, "internal_ip": "10.0.0.5"
        }))
        .unwrap();
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("external_port"));
    }

    #[test]
    fn duplicate_published_port_fails_validation() {
        let mut raw = container_yaml();
        raw["ports"] = serde_json::json!([
            { "host_port": 53, "container_port": 53, "protocol": "udp" },
            { "host_port": 53, "container_port": 5353, "protocol": "tcp/udp" }
        ]);
        let p: Proposal = serde_json::from_value(raw).unwrap();
        assert!(p.validate().is_err());
    }

    #[test]
    fn container_vlan_uses_container_description() {
        let Proposal::Container(c) = serde_json::from_value::<Proposal>(container_yaml()).unwrap() else {
            panic!("expected container");
        };
        assert_eq!(c.vlan().description, "Container web VLAN");
        assert_eq!(c.vlan().natural_key(), "igc0/100");
    }
}
