// ── Entity kinds and the kind-erased resource view ──

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

use super::{Container, DhcpServer, DhcpStaticMapping, FirewallRule, Interface, PortForward, Vlan};

/// Every entity type the mirror tracks.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntityKind {
    Interface,
    Vlan,
    FirewallRule,
    PortForward,
    DhcpServer,
    DhcpStaticMapping,
    Container,
}

impl EntityKind {
    /// Kinds pulled from the appliance, in sync order.
    pub const SYNCED: [Self; 6] = [
        Self::Interface,
        Self::Vlan,
        Self::FirewallRule,
        Self::PortForward,
        Self::DhcpServer,
        Self::DhcpStaticMapping,
    ];

    /// Whether the synchronizer owns this kind (vs. locally-originated).
    pub fn is_synced(self) -> bool {
        !matches!(self, Self::Container)
    }
}

/// Any mirrored entity, tagged by kind for listing and serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Interface(Interface),
    Vlan(Vlan),
    FirewallRule(FirewallRule),
    PortForward(PortForward),
    DhcpServer(DhcpServer),
    DhcpStaticMapping(DhcpStaticMapping),
    Container(Container),
}

impl Resource {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Interface(_) => EntityKind::Interface,
            Self::Vlan(_) => EntityKind::Vlan,
            Self::FirewallRule(_) => EntityKind::FirewallRule,
            Self::PortForward(_) => EntityKind::PortForward,
            Self::DhcpServer(_) => EntityKind::DhcpServer,
            Self::DhcpStaticMapping(_) => EntityKind::DhcpStaticMapping,
            Self::Container(_) => EntityKind::Container,
        }
    }
}
