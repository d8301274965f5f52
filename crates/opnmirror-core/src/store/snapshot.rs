// ── Serializable mirror state ──
//
// Plain serde structs; where they are written is the caller's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{
    Container, DhcpServer, DhcpStaticMapping, FirewallRule, Interface, PortForward, Server, Vlan,
};
use crate::sync::SyncInfo;

use super::collection::Collection;
use super::mirror_store::MirrorStore;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// All entities of one store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub vlans: Vec<Vlan>,
    #[serde(default)]
    pub firewall_rules: Vec<FirewallRule>,
    #[serde(default)]
    pub port_forwards: Vec<PortForward>,
    #[serde(default)]
    pub dhcp_servers: Vec<DhcpServer>,
    #[serde(default)]
    pub dhcp_static_mappings: Vec<DhcpStaticMapping>,
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// One registered server with its metadata and mirrored state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub server: Server,
    #[serde(default)]
    pub sync_info: Option<SyncInfo>,
    #[serde(default)]
    pub store: StoreSnapshot,
}

/// Everything the mirror knows, for persistence between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorSnapshot {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub servers: Vec<ServerSnapshot>,
}

impl Default for MirrorSnapshot {
    fn default() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            servers: Vec::new(),
        }
    }
}

impl MirrorSnapshot {
    /// Reject snapshots written by a newer format.
    pub fn check_version(&self) -> Result<(), CoreError> {
        if self.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(CoreError::Config {
                message: format!(
                    "state file format {} is newer than supported format {SNAPSHOT_FORMAT_VERSION}",
                    self.format_version
                ),
            });
        }
        Ok(())
    }
}

impl MirrorStore {
    pub fn to_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            interfaces: self.interfaces.to_vec(),
            vlans: self.vlans.to_vec(),
            firewall_rules: self.firewall_rules.to_vec(),
            port_forwards: self.port_forwards.to_vec(),
            dhcp_servers: self.dhcp_servers.to_vec(),
            dhcp_static_mappings: self.dhcp_static_mappings.to_vec(),
            containers: self.containers.to_vec(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, CoreError> {
        Ok(Self {
            interfaces: Collection::from_entities(snapshot.interfaces)?,
            vlans: Collection::from_entities(snapshot.vlans)?,
            firewall_rules: Collection::from_entities(snapshot.firewall_rules)?,
            port_forwards: Collection::from_entities(snapshot.port_forwards)?,
            dhcp_servers: Collection::from_entities(snapshot.dhcp_servers)?,
            dhcp_static_mappings: Collection::from_entities(snapshot.dhcp_static_mappings)?,
            containers: Collection::from_entities(snapshot.containers)?,
        })
    }
}
