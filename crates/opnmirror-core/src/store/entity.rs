// ── Natural keys ──
//
// `MirrorEntity` ties each domain type to its natural key, its optional
// uniqueness constraint, and its collection inside a `MirrorStore`.

use crate::model::{
    Container, DhcpServer, DhcpStaticMapping, EntityKind, FirewallRule, Interface, PortForward,
    Resource, Vlan,
};

use super::collection::Collection;
use super::mirror_store::MirrorStore;

/// A type the mirror can store and reconcile.
pub trait MirrorEntity: Clone + PartialEq + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Identity used to diff local and remote sets.
    fn natural_key(&self) -> String;

    /// A second key that must also be unique across a set, if any.
    fn secondary_key(&self) -> Option<String> {
        None
    }

    /// Inactive duplicates of a natural key yield to an active one instead
    /// of making the set inconsistent.
    fn is_active(&self) -> bool {
        true
    }

    fn collection(store: &MirrorStore) -> &Collection<Self>;

    fn into_resource(self) -> Resource;
}

impl MirrorEntity for Interface {
    const KIND: EntityKind = EntityKind::Interface;

    fn natural_key(&self) -> String {
        self.name.clone()
    }

    fn collection(store: &MirrorStore) -> &Collection<Self> {
        &store.interfaces
    }

    fn into_resource(self) -> Resource {
        Resource::Interface(self)
    }
}

impl MirrorEntity for Vlan {
    const KIND: EntityKind = EntityKind::Vlan;

    fn natural_key(&self) -> String {
        Vlan::key_for(&self.parent_interface, self.tag)
    }

    fn collection(store: &MirrorStore) -> &Collection<Self> {
        &store.vlans
    }

    fn into_resource(self) -> Resource {
        Resource::Vlan(self)
    }
}

impl MirrorEntity for FirewallRule {
    const KIND: EntityKind = EntityKind::FirewallRule;

    fn natural_key(&self) -> String {
        self.id.clone()
    }

    fn collection(store: &MirrorStore) -> &Collection<Self> {
        &store.firewall_rules
    }

    fn into_resource(self) -> Resource {
        Resource::FirewallRule(self)
    }
}

impl MirrorEntity for PortForward {
    const KIND: EntityKind = EntityKind::PortForward;

    fn natural_key(&self) -> String {
        PortForward::key_for(&self.interface, &self.protocol, &self.external_port)
    }

    fn is_active(&self) -> bool {
        self.enabled
    }

    fn collection(store: &MirrorStore) -> &Collection<Self> {
        &store.port_forwards
    }

    fn into_resource(self) -> Resource {
        Resource::PortForward(self)
    }
}

impl MirrorEntity for DhcpServer {
    const KIND: EntityKind = EntityKind::DhcpServer;

    fn natural_key(&self) -> String {
        self.interface.clone()
    }

    fn collection(store: &MirrorStore) -> &Collection<Self> {
        &store.dhcp_servers
    }

    fn into_resource(self) -> Resource {
        Resource::DhcpServer(self)
    }
}

impl MirrorEntity for DhcpStaticMapping {
    const KIND: EntityKind = EntityKind::DhcpStaticMapping;

    fn natural_key(&self) -> String {
        DhcpStaticMapping::key_for(&self.scope, &self.mac_address)
    }

    fn secondary_key(&self) -> Option<String> {
        Some(format!("{}/{}", self.scope, self.ip_address))
    }

    fn collection(store: &MirrorStore) -> &Collection<Self> {
        &store.dhcp_static_mappings
    }

    fn into_resource(self) -> Resource {
        Resource::DhcpStaticMapping(self)
    }
}

impl MirrorEntity for Container {
    const KIND: EntityKind = EntityKind::Container;

    fn natural_key(&self) -> String {
        self.name.clone()
    }

    fn collection(store: &MirrorStore) -> &Collection<Self> {
        &store.containers
    }

    fn into_resource(self) -> Resource {
        Resource::Container(self)
    }
}
