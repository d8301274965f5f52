// ── Conflict detection ──
//
// Read-only checks of a proposed resource against one server's mirror.
// Rules are independent and may all fire for one proposal:
//
// - vlan_tag:    an existing VLAN shares (parent interface, tag)
// - ip_address:  a container, reservation, or interface holds the address
//                in the same L2 domain (physical parent interface)
// - mac_address: a container or reservation holds the MAC anywhere
// - port:        an enabled port forward or a published container port
//                overlaps (interface, protocol, external port)
//
// A holder that is exactly what the proposal would create, or that
// belongs to the previous record of the same container, is not a
// conflict. That keeps redeploys and retries after a partial deployment
// clean.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::model::{
    Container, DhcpStaticMapping, EntityKind, Interface, MacAddress, PortForward, PortSpec,
    Protocol, Vlan, VlanTag,
};
use crate::spec::{ContainerSpec, Proposal};
use crate::store::{MirrorEntity, MirrorStore};

// ── Report types ────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictKind {
    VlanTag,
    IpAddress,
    MacAddress,
    Port,
}

/// The entity (or earlier batch proposal) holding a contested value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictHolder {
    pub kind: EntityKind,
    pub key: String,
    pub description: String,
    /// Held by an earlier proposal in the same batch, not by the mirror.
    pub pending: bool,
}

impl ConflictHolder {
    fn entity<T: MirrorEntity>(entity: &T, description: &str) -> Self {
        Self {
            kind: T::KIND,
            key: entity.natural_key(),
            description: description.to_owned(),
            pending: false,
        }
    }

    fn proposal(index: usize, proposal: &Proposal) -> Self {
        let kind = match proposal {
            Proposal::Vlan(_) => EntityKind::Vlan,
            Proposal::PortForward(_) => EntityKind::PortForward,
            Proposal::Container(_) => EntityKind::Container,
        };
        Self {
            kind,
            key: format!("#{}", index + 1),
            description: proposal.label(),
            pending: true,
        }
    }
}

impl fmt::Display for ConflictHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pending {
            return write!(f, "{} (proposal {} in this batch)", self.description, self.key);
        }
        write!(f, "{} '{}'", self.kind, self.key)?;
        if !self.description.is_empty() {
            write!(f, " ({})", self.description)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// The contested value (`igc0/100`, `10.0.100.5`, `wan/tcp/80`).
    pub value: String,
    pub holder: ConflictHolder,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConflictKind::VlanTag => {
                write!(f, "VLAN {} is already in use by {}", self.value, self.holder)
            }
            ConflictKind::IpAddress => write!(
                f,
                "IP address {} is already assigned to {}",
                self.value, self.holder
            ),
            ConflictKind::MacAddress => write!(
                f,
                "MAC address {} is already assigned to {}",
                self.value, self.holder
            ),
            ConflictKind::Port => {
                write!(f, "port {} is already claimed by {}", self.value, self.holder)
            }
        }
    }
}

/// Every conflict found for one proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
    pub clean: bool,
}

impl ConflictReport {
    pub fn new(mut conflicts: Vec<Conflict>) -> Self {
        let mut seen = std::collections::HashSet::new();
        conflicts.retain(|c| seen.insert(c.clone()));
        Self {
            clean: conflicts.is_empty(),
            conflicts,
        }
    }

    pub fn clean() -> Self {
        Self::new(Vec::new())
    }

    pub fn of_kind(&self, kind: ConflictKind) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(move |c| c.kind == kind)
    }

    /// One line per conflict.
    pub fn summary(&self) -> String {
        self.conflicts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Ownership ───────────────────────────────────────────────────────

/// Holders a container proposal may overlap with without conflicting.
struct Ownership {
    name: String,
    identities: Vec<(MacAddress, Ipv4Addr)>,
    forwards: Vec<(String, Protocol, PortSpec, String)>,
}

impl Ownership {
    fn for_container(spec: &ContainerSpec, wan: &str, previous: Option<&Container>) -> Self {
        let mut own = Self {
            name: spec.name.clone(),
            identities: vec![(spec.network.mac_address.clone(), spec.network.ip_address)],
            forwards: spec
                .ports
                .iter()
                .map(|p| {
                    (
                        wan.to_owned(),
                        p.protocol.clone(),
                        PortSpec::Range {
                            start: p.host_port,
                            end: p.host_port,
                        },
                        spec.network.ip_address.to_string(),
                    )
                })
                .collect(),
        };
        if let Some(prev) = previous {
            own.identities
                .push((prev.network.mac_address.clone(), prev.network.ip_address));
            own.forwards.extend(prev.ports.iter().map(|p| {
                (
                    prev.wan_interface.clone(),
                    p.protocol.clone(),
                    p.host_spec(),
                    prev.network.ip_address.to_string(),
                )
            }));
        }
        own
    }

    fn owns_mapping(&self, m: &DhcpStaticMapping) -> bool {
        self.identities
            .iter()
            .any(|(mac, ip)| *mac == m.mac_address && *ip == m.ip_address)
    }

    fn owns_forward(&self, pf: &PortForward) -> bool {
        self.forwards.iter().any(|(iface, proto, port, target)| {
            pf.interface == *iface
                && pf.protocol == *proto
                && pf.external_port == *port
                && pf.internal_ip == *target
        })
    }

    fn owns_container(&self, c: &Container) -> bool {
        c.name == self.name
    }
}

// ── Detector ────────────────────────────────────────────────────────

/// Conflict checks against one server's mirror.
pub struct ConflictDetector<'a> {
    store: &'a MirrorStore,
    default_wan: &'a str,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(store: &'a MirrorStore, default_wan: &'a str) -> Self {
        Self { store, default_wan }
    }

    /// Check one proposal against the mirror.
    pub fn check(&self, proposal: &Proposal) -> ConflictReport {
        ConflictReport::new(self.mirror_conflicts(proposal))
    }

    /// Check proposals against the mirror and against every earlier
    /// proposal in the same batch. Reports are returned in input order.
    pub fn check_batch(&self, proposals: &[Proposal]) -> Vec<ConflictReport> {
        proposals
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut found = self.mirror_conflicts(p);
                for (j, earlier) in proposals.iter().enumerate().take(i) {
                    found.extend(self.batch_conflicts(p, j, earlier));
                }
                ConflictReport::new(found)
            })
            .collect()
    }

    fn wan_for<'s>(&'s self, spec: &'s ContainerSpec) -> &'s str {
        spec.wan_interface.as_deref().unwrap_or(self.default_wan)
    }

    // ── Against the mirror ───────────────────────────────────────────

    fn mirror_conflicts(&self, proposal: &Proposal) -> Vec<Conflict> {
        let mut found = Vec::new();
        match proposal {
            Proposal::Vlan(v) => self.vlan_rule(&v.parent_interface, v.tag, &mut found),
            Proposal::PortForward(p) => {
                self.port_rule(&p.interface, &p.protocol, &p.external(), None, &mut found);
            }
            Proposal::Container(c) => {
                let wan = self.wan_for(c);
                let previous = self.store.find::<Container>(&c.name);
                let own = Ownership::for_container(c, wan, previous.as_deref());
                let domain = self.store.l2_domain_of_device(&c.network.parent_interface);

                self.ip_rule(c.network.ip_address, &domain, &own, &mut found);
                self.mac_rule(&c.network.mac_address, &own, &mut found);
                for port in &c.ports {
                    let spec = PortSpec::Range {
                        start: port.host_port,
                        end: port.host_port,
                    };
                    self.port_rule(wan, &port.protocol, &spec, Some(&own), &mut found);
                }
            }
        }
        found
    }

    fn vlan_rule(&self, parent: &str, tag: VlanTag, found: &mut Vec<Conflict>) {
        let key = Vlan::key_for(parent, tag);
        if let Some(existing) = self.store.find::<Vlan>(&key) {
            found.push(Conflict {
                kind: ConflictKind::VlanTag,
                value: key,
                holder: ConflictHolder::entity(&*existing, &existing.description),
            });
        }
    }

    fn ip_rule(&self, ip: Ipv4Addr, domain: &str, own: &Ownership, found: &mut Vec<Conflict>) {
        let value = ip.to_string();

        for c in self.store.list::<Container>() {
            if !own.owns_container(&c)
                && c.network.ip_address == ip
                && self.store.l2_domain_of_device(&c.network.parent_interface) == domain
            {
                found.push(Conflict {
                    kind: ConflictKind::IpAddress,
                    value: value.clone(),
                    holder: ConflictHolder::entity(&*c, &c.image),
                });
            }
        }
        for m in self.store.list::<DhcpStaticMapping>() {
            if !own.owns_mapping(&m)
                && m.ip_address == ip
                && self.store.l2_domain_of_interface(&m.scope) == domain
            {
                found.push(Conflict {
                    kind: ConflictKind::IpAddress,
                    value: value.clone(),
                    holder: ConflictHolder::entity(&*m, &m.hostname),
                });
            }
        }
        for i in self.store.list::<Interface>() {
            if i.ip_address == Some(ip) && self.store.l2_domain_of_device(&i.device) == domain {
                found.push(Conflict {
                    kind: ConflictKind::IpAddress,
                    value: value.clone(),
                    holder: ConflictHolder::entity(&*i, &i.description),
                });
            }
        }
    }

    fn mac_rule(&self, mac: &MacAddress, own: &Ownership, found: &mut Vec<Conflict>) {
        for c in self.store.list::<Container>() {
            if !own.owns_container(&c) && c.network.mac_address == *mac {
                found.push(Conflict {
                    kind: ConflictKind::MacAddress,
                    value: mac.to_string(),
                    holder: ConflictHolder::entity(&*c, &c.image),
                });
            }
        }
        for m in self.store.list::<DhcpStaticMapping>() {
            if !own.owns_mapping(&m) && m.mac_address == *mac {
                found.push(Conflict {
                    kind: ConflictKind::MacAddress,
                    value: mac.to_string(),
                    holder: ConflictHolder::entity(&*m, &m.hostname),
                });
            }
        }
    }

    fn port_rule(
        &self,
        interface: &str,
        protocol: &Protocol,
        port: &PortSpec,
        own: Option<&Ownership>,
        found: &mut Vec<Conflict>,
    ) {
        let value = PortForward::key_for(interface, protocol, port);

        for pf in self.store.list::<PortForward>() {
            if pf.enabled
                && pf.claims(interface, protocol, port)
                && !own.is_some_and(|o| o.owns_forward(&pf))
            {
                found.push(Conflict {
                    kind: ConflictKind::Port,
                    value: value.clone(),
                    holder: ConflictHolder::entity(&*pf, &pf.description),
                });
            }
        }
        for c in self.store.list::<Container>() {
            if c.publishes(interface, protocol, port) && !own.is_some_and(|o| o.owns_container(&c))
            {
                found.push(Conflict {
                    kind: ConflictKind::Port,
                    value: value.clone(),
                    holder: ConflictHolder::entity(&*c, &c.image),
                });
            }
        }
    }

    // ── Against earlier proposals ────────────────────────────────────

    fn batch_conflicts(&self, proposal: &Proposal, index: usize, earlier: &Proposal) -> Vec<Conflict> {
        let holder = || ConflictHolder::proposal(index, earlier);
        let mut found = Vec::new();

        match (proposal, earlier) {
            (Proposal::Vlan(v), Proposal::Vlan(e)) if v.natural_key() == e.natural_key() => {
                found.push(Conflict {
                    kind: ConflictKind::VlanTag,
                    value: v.natural_key(),
                    holder: holder(),
                });
            }
            (Proposal::Vlan(v), Proposal::Container(e)) if v.natural_key() == e.vlan().natural_key() => {
                found.push(Conflict {
                    kind: ConflictKind::VlanTag,
                    value: v.natural_key(),
                    holder: holder(),
                });
            }
            (Proposal::Vlan(_), _) => {}

            (Proposal::PortForward(p), _) => {
                for (iface, proto, port) in self.claimed_ports(earlier) {
                    if iface == p.interface && proto.overlaps(&p.protocol) && port.overlaps(&p.external())
                    {
                        found.push(Conflict {
                            kind: ConflictKind::Port,
                            value: PortForward::key_for(&p.interface, &p.protocol, &p.external()),
                            holder: holder(),
                        });
                    }
                }
            }

            (Proposal::Container(c), _) => {
                if let Proposal::Container(e) = earlier {
                    if e.name != c.name {
                        let domain = self.store.l2_domain_of_device(&c.network.parent_interface);
                        let other = self.store.l2_domain_of_device(&e.network.parent_interface);
                        if e.network.ip_address == c.network.ip_address && domain == other {
                            found.push(Conflict {
                                kind: ConflictKind::IpAddress,
                                value: c.network.ip_address.to_string(),
                                holder: holder(),
                            });
                        }
                        if e.network.mac_address == c.network.mac_address {
                            found.push(Conflict {
                                kind: ConflictKind::MacAddress,
                                value: c.network.mac_address.to_string(),
                                holder: holder(),
                            });
                        }
                    }
                }
                let wan = self.wan_for(c);
                for port in &c.ports {
                    let spec = PortSpec::Range {
                        start: port.host_port,
                        end: port.host_port,
                    };
                    let clash = self.claimed_ports(earlier).into_iter().any(|(iface, proto, p)| {
                        iface == wan && proto.overlaps(&port.protocol) && p.overlaps(&spec)
                    });
                    if clash {
                        found.push(Conflict {
                            kind: ConflictKind::Port,
                            value: PortForward::key_for(wan, &port.protocol, &spec),
                            holder: holder(),
                        });
                    }
                }
            }
        }
        found
    }

    /// `(interface, protocol, port)` triples a proposal will forward.
    fn claimed_ports(&self, proposal: &Proposal) -> Vec<(String, Protocol, PortSpec)> {
        match proposal {
            Proposal::Vlan(_) => Vec::new(),
            Proposal::PortForward(p) => vec![(p.interface.clone(), p.protocol.clone(), p.external())],
            Proposal::Container(c) => {
                let wan = self.wan_for(c).to_owned();
                c.ports
                    .iter()
                    .map(|p| {
                        (
                            wan.clone(),
                            p.protocol.clone(),
                            PortSpec::Range {
                                start: p.host_port,
                                end: p.host_port,
                            },
                        )
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use chrono::Utc;

    use super::*;
    use crate::model::{ContainerNetwork, ContainerStatus, PortMapping};
    use crate::spec::{ContainerNetworkSpec, PortForwardSpec, PortMappingSpec, VlanSpec};

    fn tag(t: u16) -> VlanTag {
        VlanTag::new(t).unwrap()
    }

    fn mac(s: &str) -> MacAddress {
        MacAddress::parse(s).unwrap()
    }

    fn vlan_proposal(parent: &str, t: u16) -> Proposal {
        Proposal::Vlan(VlanSpec {
            parent_interface: parent.into(),
            tag: tag(t),
            description: String::new(),
            priority: 0,
        })
    }

    fn forward_proposal(proto: Protocol, port: u16) -> Proposal {
        Proposal::PortForward(PortForwardSpec {
            interface: "wan".into(),
            protocol: proto,
            external_port: port,
            internal_ip: Ipv4Addr::new(10, 0, 0, 9),
            internal_port: None,
            description: String::new(),
        })
    }

    fn container_spec(name: &str, ip: [u8; 4], mac_addr: &str, parent: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.into(),
            image: "nginx:1.27".into(),
            network: ContainerNetworkSpec {
                vlan_id: tag(100),
                ip_address: Ipv4Addr::from(ip),
                mac_address: mac(mac_addr),
                parent_interface: parent.into(),
                allow_internet: false,
            },
            ports: vec![PortMappingSpec {
                host_port: 8080,
                container_port: 80,
                protocol: Protocol::Tcp,
            }],
            wan_interface: None,
        }
    }

    fn seeded() -> MirrorStore {
        let store = MirrorStore::new();
        store.upsert(Interface {
            name: "opt2".into(),
            device: "vlan0.100".into(),
            description: "servers".into(),
            ip_address: Some(Ipv4Addr::new(10, 0, 100, 1)),
            subnet_bits: Some(24),
            enabled: true,
        });
        store.upsert(Vlan {
            parent_interface: "igc0".into(),
            tag: tag(100),
            device: "vlan0.100".into(),
            description: "servers".into(),
            priority: 0,
            remote_id: Some("v-1".into()),
        });
        store.upsert(PortForward {
            interface: "wan".into(),
            protocol: Protocol::Tcp,
            external_port: PortSpec::single(80).unwrap(),
            internal_ip: "10.0.100.20".into(),
            internal_port: PortSpec::single(80).unwrap(),
            enabled: true,
            description: "web".into(),
            remote_id: Some("n-1".into()),
        });
        store.upsert(DhcpStaticMapping {
            scope: "opt2".into(),
            mac_address: mac("aa:bb:cc:00:00:20"),
            ip_address: Ipv4Addr::new(10, 0, 100, 20),
            hostname: "nas".into(),
            description: String::new(),
            remote_id: Some("m-1".into()),
        });
        store
    }

    #[test]
    fn existing_vlan_tag_conflicts_once() {
        let store = seeded();
        let detector = ConflictDetector::new(&store, "wan");

        let report = detector.check(&vlan_proposal("igc0", 100));
        assert!(!report.clean);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kind, ConflictKind::VlanTag);
        assert_eq!(report.conflicts[0].value, "igc0/100");

        assert!(detector.check(&vlan_proposal("igc1", 100)).clean);
    }

    #[test]
    fn port_conflicts_respect_protocol_overlap() {
        let store = seeded();
        let detector = ConflictDetector::new(&store, "wan");

        let tcp = detector.check(&forward_proposal(Protocol::Tcp, 80));
        assert_eq!(tcp.of_kind(ConflictKind::Port).count(), 1);
        assert!(detector.check(&forward_proposal(Protocol::Udp, 80)).clean);
        assert!(!detector.check(&forward_proposal(Protocol::TcpUdp, 80)).clean);
    }

    #[test]
    fn disabled_forward_does_not_claim_its_port() {
        let store = seeded();
        store.upsert(PortForward {
            interface: "wan".into(),
            protocol: Protocol::Udp,
            external_port: PortSpec::single(53).unwrap(),
            internal_ip: "10.0.100.2".into(),
            internal_port: PortSpec::single(53).unwrap(),
            enabled: false,
            description: String::new(),
            remote_id: None,
        });
        let detector = ConflictDetector::new(&store, "wan");
        assert!(detector.check(&forward_proposal(Protocol::Udp, 53)).clean);
    }

    #[test]
    fn ip_conflicts_only_within_the_same_l2_domain() {
        let store = seeded();
        let detector = ConflictDetector::new(&store, "wan");

        // 10.0.100.20 is reserved on opt2, which rides igc0.
        let same = container_spec("web", [10, 0, 100, 20], "aa:bb:cc:00:00:99", "igc0");
        let report = detector.check(&Proposal::Container(same));
        assert_eq!(report.of_kind(ConflictKind::IpAddress).count(), 1);

        let other = container_spec("web", [10, 0, 100, 20], "aa:bb:cc:00:00:99", "igc1");
        let report = detector.check(&Proposal::Container(other));
        assert_eq!(report.of_kind(ConflictKind::IpAddress).count(), 0);
    }

    /// A deployed container `db` at 192.168.100.10 / 00:00:00:00:00:01 on igc0.
    fn store_with_db() -> MirrorStore {
        let store = MirrorStore::new();
        let mut db = container_spec("db", [192, 168, 100, 10], "00:00:00:00:00:01", "igc0");
        db.ports.clear();
        store.upsert(db.to_record("wan"));
        store
    }

    #[test]
    fn containers_share_an_ip_only_on_the_same_parent() {
        let store = store_with_db();
        let detector = ConflictDetector::new(&store, "wan");

        let same = container_spec("web", [192, 168, 100, 10], "00:00:00:00:00:02", "igc0");
        let report = detector.check(&Proposal::Container(same));
        let conflict = report.of_kind(ConflictKind::IpAddress).next().unwrap();
        assert_eq!(conflict.holder.kind, EntityKind::Container);
        assert_eq!(conflict.holder.key, "db");

        let other = container_spec("web", [192, 168, 100, 10], "00:00:00:00:00:02", "igc1");
        let report = detector.check(&Proposal::Container(other));
        assert!(report.clean, "{}", report.summary());
    }

    #[test]
    fn containers_sharing_a_mac_conflict_across_parents() {
        let store = store_with_db();
        let detector = ConflictDetector::new(&store, "wan");

        let spec = container_spec("web", [192, 168, 200, 10], "00:00:00:00:00:01", "igc1");
        let report = detector.check(&Proposal::Container(spec));
        assert_eq!(report.conflicts.len(), 1, "{}", report.summary());
        let conflict = report.of_kind(ConflictKind::MacAddress).next().unwrap();
        assert_eq!(conflict.holder.kind, EntityKind::Container);
        assert_eq!(conflict.holder.key, "db");
    }

    #[test]
    fn interface_address_is_an_ip_holder() {
        let store = seeded();
        let detector = ConflictDetector::new(&store, "wan");
        let spec = container_spec("web", [10, 0, 100, 1], "aa:bb:cc:00:00:99", "igc0");
        let report = detector.check(&Proposal::Container(spec));
        let conflict = report.of_kind(ConflictKind::IpAddress).next().unwrap();
        assert_eq!(conflict.holder.kind, EntityKind::Interface);
        assert_eq!(conflict.holder.key, "opt2");
    }

    #[test]
    fn mac_conflicts_anywhere() {
        let store = seeded();
        let detector = ConflictDetector::new(&store, "wan");
        let spec = container_spec("web", [192, 168, 9, 9], "AA:BB:CC:00:00:20", "igc3");
        let report = detector.check(&Proposal::Container(spec));
        assert_eq!(report.of_kind(ConflictKind::MacAddress).count(), 1);
        assert_eq!(report.of_kind(ConflictKind::IpAddress).count(), 0);
    }

    #[test]
    fn container_vlan_is_reused_not_conflicted() {
        let store = seeded();
        let detector = ConflictDetector::new(&store, "wan");
        let spec = container_spec("web", [10, 0, 100, 5], "aa:bb:cc:00:00:05", "igc0");
        assert!(detector.check(&Proposal::Container(spec)).clean);
    }

    #[test]
    fn container_does_not_conflict_with_its_own_record() {
        let store = seeded();
        let spec = container_spec("web", [10, 0, 100, 5], "aa:bb:cc:00:00:05", "igc0");
        store.upsert(spec.to_record("wan"));
        // What a previous deployment of the same container created.
        store.upsert(DhcpStaticMapping {
            scope: "opt2".into(),
            mac_address: mac("aa:bb:cc:00:00:05"),
            ip_address: Ipv4Addr::new(10, 0, 100, 5),
            hostname: "web".into(),
            description: String::new(),
            remote_id: None,
        });
        store.upsert(PortForward {
            interface: "wan".into(),
            protocol: Protocol::Tcp,
            external_port: PortSpec::single(8080).unwrap(),
            internal_ip: "10.0.100.5".into(),
            internal_port: PortSpec::single(80).unwrap(),
            enabled: true,
            description: String::new(),
            remote_id: None,
        });

        let detector = ConflictDetector::new(&store, "wan");
        let report = detector.check(&Proposal::Container(spec));
        assert!(report.clean, "{}", report.summary());
    }

    #[test]
    fn other_container_claims_ip_mac_and_port() {
        let store = seeded();
        store.upsert(Container {
            name: "db".into(),
            image: "postgres:16".into(),
            network: ContainerNetwork {
                vlan_id: tag(100),
                ip_address: Ipv4Addr::new(10, 0, 100, 5),
                mac_address: mac("aa:bb:cc:00:00:05"),
                parent_interface: "igc0".into(),
                allow_internet: false,
            },
            ports: vec![PortMapping {
                host_port: 8080,
                container_port: 5432,
                protocol: Protocol::Tcp,
            }],
            wan_interface: "wan".into(),
            status: ContainerStatus::Deployed,
            deployed_at: Utc::now(),
        });

        let detector = ConflictDetector::new(&store, "wan");
        let spec = container_spec("web", [10, 0, 100, 5], "aa:bb:cc:00:00:05", "igc0");
        let report = detector.check(&Proposal::Container(spec));
        assert_eq!(report.of_kind(ConflictKind::IpAddress).count(), 1);
        assert_eq!(report.of_kind(ConflictKind::MacAddress).count(), 1);
        assert_eq!(report.of_kind(ConflictKind::Port).count(), 1);
        assert!(report.conflicts.iter().all(|c| c.holder.key == "db"));
    }

    #[test]
    fn batch_checks_against_earlier_proposals() {
        let store = MirrorStore::new();
        let detector = ConflictDetector::new(&store, "wan");
        let reports = detector.check_batch(&[
            vlan_proposal("igc0", 200),
            vlan_proposal("igc0", 200),
            forward_proposal(Protocol::Tcp, 443),
            forward_proposal(Protocol::TcpUdp, 443),
        ]);

        assert!(reports[0].clean);
        assert_eq!(reports[1].conflicts.len(), 1);
        assert!(reports[1].conflicts[0].holder.pending);
        assert_eq!(reports[1].conflicts[0].holder.key, "#1");
        assert!(reports[2].clean);
        assert_eq!(reports[3].of_kind(ConflictKind::Port).count(), 1);
    }

    #[test]
    fn batch_containers_collide_on_identity() {
        let store = MirrorStore::new();
        let detector = ConflictDetector::new(&store, "wan");
        let a = container_spec("a", [10, 0, 100, 5], "aa:bb:cc:00:00:05", "igc0");
        let b = container_spec("b", [10, 0, 100, 5], "aa:bb:cc:00:00:05", "igc0");
        let reports = detector.check_batch(&[Proposal::Container(a), Proposal::Container(b)]);

        assert!(reports[0].clean);
        let kinds: Vec<ConflictKind> = reports[1].conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ConflictKind::IpAddress, ConflictKind::MacAddress, ConflictKind::Port]
        );
    }

    #[test]
    fn conflict_text_names_value_and_holder() {
        let store = seeded();
        let detector = ConflictDetector::new(&store, "wan");
        let report = detector.check(&forward_proposal(Protocol::Tcp, 80));
        assert_eq!(
            report.summary(),
            "port wan/tcp/80 is already claimed by port_forward 'wan/tcp/80' (web)"
        );
    }
}
