// ── Firewall domain types ──

use serde::{Deserialize, Serialize};

use super::ports::{PortSpec, Protocol};

/// Prefix of locally generated rule ids awaiting reconciliation.
pub const PENDING_RULE_PREFIX: &str = "pending:";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RuleAction {
    Pass,
    Block,
    Reject,
}

/// A filter rule. Keyed by the appliance-assigned id, or by a
/// `pending:<uuid>` placeholder until the next sync replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub id: String,
    pub interface: String,
    pub action: RuleAction,
    pub direction: String,
    pub protocol: String,
    pub source: String,
    pub source_port: String,
    pub destination: String,
    pub destination_port: String,
    pub enabled: bool,
    pub description: String,
}

impl FirewallRule {
    pub fn pending_id() -> String {
        format!("{PENDING_RULE_PREFIX}{}", uuid::Uuid::new_v4())
    }

    pub fn is_pending(&self) -> bool {
        self.id.starts_with(PENDING_RULE_PREFIX)
    }
}

/// A destination-NAT port forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForward {
    pub interface: String,
    pub protocol: Protocol,
    pub external_port: PortSpec,
    /// Target host; an address or an alias name.
    pub internal_ip: String,
    pub internal_port: PortSpec,
    pub enabled: bool,
    pub description: String,
    pub remote_id: Option<String>,
}

impl PortForward {
    pub fn key_for(interface: &str, protocol: &Protocol, external_port: &PortSpec) -> String {
        format!("{interface}/{protocol}/{external_port}")
    }

    /// Whether this forward claims any part of `(interface, protocol, port)`.
    pub fn claims(&self, interface: &str, protocol: &Protocol, port: &PortSpec) -> bool {
        self.interface == interface
            && self.protocol.overlaps(protocol)
            && self.external_port.overlaps(port)
    }
}
