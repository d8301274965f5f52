// ── Domain model ──
//
// Canonical types for everything the mirror tracks. Conversion from the
// appliance's wire records lives in `crate::convert`.

pub mod container;
pub mod dhcp;
pub mod firewall;
pub mod ids;
pub mod interface;
pub mod kind;
pub mod ports;
pub mod server;

pub use container::{Container, ContainerNetwork, ContainerStatus, PortMapping};
pub use dhcp::{DhcpServer, DhcpStaticMapping};
pub use firewall::{FirewallRule, PENDING_RULE_PREFIX, PortForward, RuleAction};
pub use ids::{MacAddress, ServerId, VlanTag};
pub use interface::{Interface, Vlan};
pub use kind::{EntityKind, Resource};
pub use ports::{PortSpec, Protocol};
pub use server::Server;
