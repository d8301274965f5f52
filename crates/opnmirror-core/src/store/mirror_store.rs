// ── Per-appliance mirror store ──
//
// One `MirrorStore` per registered server. Holds a `Collection` per entity
// type plus helpers that need more than one collection at once (resolving
// the L2 domain an address lives in).

use std::sync::Arc;

use crate::error::CoreError;
use crate::model::{
    Container, DhcpServer, DhcpStaticMapping, EntityKind, FirewallRule, Interface, PortForward,
    Resource, Vlan,
};

use super::collection::{ChangeCounts, Collection, Reconciled, UpsertOutcome};
use super::entity::MirrorEntity;

/// Last known appliance state plus locally-originated records.
#[derive(Default)]
pub struct MirrorStore {
    pub(crate) interfaces: Collection<Interface>,
    pub(crate) vlans: Collection<Vlan>,
    pub(crate) firewall_rules: Collection<FirewallRule>,
    pub(crate) port_forwards: Collection<PortForward>,
    pub(crate) dhcp_servers: Collection<DhcpServer>,
    pub(crate) dhcp_static_mappings: Collection<DhcpStaticMapping>,
    pub(crate) containers: Collection<Container>,
}

impl MirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection<T: MirrorEntity>(&self) -> &Collection<T> {
        T::collection(self)
    }

    // ── Typed access ─────────────────────────────────────────────────

    pub fn upsert<T: MirrorEntity>(&self, entity: T) -> UpsertOutcome {
        self.collection::<T>().upsert(entity)
    }

    pub fn list<T: MirrorEntity>(&self) -> Vec<Arc<T>> {
        self.collection::<T>().list()
    }

    pub fn find<T: MirrorEntity>(&self, natural_key: &str) -> Option<Arc<T>> {
        self.collection::<T>().get(natural_key)
    }

    pub fn remove<T: MirrorEntity>(&self, natural_key: &str) -> Option<Arc<T>> {
        self.collection::<T>().remove(natural_key)
    }

    /// Unconditionally reconcile one type against a remote set.
    pub fn reconcile<T: MirrorEntity>(&self, remote: Vec<T>) -> Result<ChangeCounts, CoreError> {
        match self.collection::<T>().reconcile(remote, None)? {
            Reconciled::Applied(counts) => Ok(counts),
            Reconciled::Stale => Err(CoreError::Internal(format!(
                "unguarded reconcile of {} reported stale",
                T::KIND
            ))),
        }
    }

    // ── Kind-erased access ───────────────────────────────────────────

    pub fn list_kind(&self, kind: EntityKind) -> Vec<Resource> {
        fn erase<T: MirrorEntity>(col: &Collection<T>) -> Vec<Resource> {
            col.to_vec().into_iter().map(T::into_resource).collect()
        }
        match kind {
            EntityKind::Interface => erase(&self.interfaces),
            EntityKind::Vlan => erase(&self.vlans),
            EntityKind::FirewallRule => erase(&self.firewall_rules),
            EntityKind::PortForward => erase(&self.port_forwards),
            EntityKind::DhcpServer => erase(&self.dhcp_servers),
            EntityKind::DhcpStaticMapping => erase(&self.dhcp_static_mappings),
            EntityKind::Container => erase(&self.containers),
        }
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Interface => self.interfaces.len(),
            EntityKind::Vlan => self.vlans.len(),
            EntityKind::FirewallRule => self.firewall_rules.len(),
            EntityKind::PortForward => self.port_forwards.len(),
            EntityKind::DhcpServer => self.dhcp_servers.len(),
            EntityKind::DhcpStaticMapping => self.dhcp_static_mappings.len(),
            EntityKind::Container => self.containers.len(),
        }
    }

    // ── L2 domain resolution ─────────────────────────────────────────

    /// Physical interface a device's traffic leaves through: a VLAN
    /// device resolves to its parent, anything else to itself.
    pub fn l2_domain_of_device(&self, device: &str) -> String {
        self.vlans
            .snapshot()
            .values()
            .find(|v| v.device == device)
            .map_or_else(|| device.to_owned(), |v| v.parent_interface.clone())
    }

    /// L2 domain of a logical interface name (`lan`, `opt2`). Unknown
    /// names are treated as device names.
    pub fn l2_domain_of_interface(&self, name: &str) -> String {
        match self.interfaces.get(name) {
            Some(iface) => self.l2_domain_of_device(&iface.device),
            None => self.l2_domain_of_device(name),
        }
    }

    /// Logical interface bound to `device`, if assigned.
    pub fn interface_for_device(&self, device: &str) -> Option<Arc<Interface>> {
        self.interfaces
            .snapshot()
            .values()
            .find(|i| i.device == device)
            .cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::model::VlanTag;

    fn iface(name: &str, device: &str) -> Interface {
        Interface {
            name: name.into(),
            device: device.into(),
            description: String::new(),
            ip_address: Some(Ipv4Addr::new(10, 0, 0, 1)),
            subnet_bits: Some(24),
            enabled: true,
        }
    }

    #[test]
    fn vlan_interface_resolves_to_physical_parent() {
        let store = MirrorStore::new();
        store.upsert(iface("lan", "igc1"));
        store.upsert(iface("opt2", "vlan0.100"));
        store.upsert(Vlan {
            parent_interface: "igc0".into(),
            tag: VlanTag::new(100).unwrap(),
            device: "vlan0.100".into(),
            description: String::new(),
            priority: 0,
            remote_id: None,
        });

        assert_eq!(store.l2_domain_of_interface("opt2"), "igc0");
        assert_eq!(store.l2_domain_of_interface("lan"), "igc1");
        assert_eq!(store.l2_domain_of_interface("igc3"), "igc3");
    }

    #[test]
    fn list_kind_erases_types() {
        let store = MirrorStore::new();
        store.upsert(iface("lan", "igc1"));
        let resources = store.list_kind(EntityKind::Interface);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].kind(), EntityKind::Interface);
        assert!(store.list_kind(EntityKind::Container).is_empty());
        assert_eq!(store.count(EntityKind::Interface), 1);
    }
}
