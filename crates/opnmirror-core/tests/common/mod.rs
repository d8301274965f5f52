// Scripted appliance for mirror, sync, and deploy tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Notify;

use opnmirror_core::{
    ConnectionConfig, ConnectionInfo, Connector, CoreError, DhcpServer, DhcpStaticMapping,
    EntityKind, FirewallRule, FirewallRuleSpec, Interface, MacAddress, Mirror, MirrorSettings,
    PortForward, PortForwardSpec, RegisterRequest, RemoteState, ServerCredentials,
    StaticMappingSpec, Vlan, VlanSpec, VlanTag,
};

// ── Remote data ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RemoteData {
    pub interfaces: Vec<Interface>,
    pub vlans: Vec<Vlan>,
    pub firewall_rules: Vec<FirewallRule>,
    pub port_forwards: Vec<PortForward>,
    pub dhcp_servers: Vec<DhcpServer>,
    pub dhcp_static_mappings: Vec<DhcpStaticMapping>,
}

/// Pauses a fetch until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct FakeRemote {
    pub data: Mutex<RemoteData>,
    failing_fetches: Mutex<HashSet<EntityKind>>,
    failing_creates: Mutex<HashSet<EntityKind>>,
    reject_credentials: AtomicBool,
    gate: Mutex<Option<Arc<Gate>>>,
    before_vlan_reply: Mutex<Option<Hook>>,
    pub vlan_fetches: AtomicUsize,
    pub creates: AtomicUsize,
}

impl FakeRemote {
    pub fn new(data: RemoteData) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data),
            ..Self::default()
        })
    }

    pub fn fail_fetch(&self, kind: EntityKind) {
        self.failing_fetches.lock().unwrap().insert(kind);
    }

    pub fn heal_fetch(&self, kind: EntityKind) {
        self.failing_fetches.lock().unwrap().remove(&kind);
    }

    pub fn fail_create(&self, kind: EntityKind) {
        self.failing_creates.lock().unwrap().insert(kind);
    }

    pub fn heal_create(&self, kind: EntityKind) {
        self.failing_creates.lock().unwrap().remove(&kind);
    }

    pub fn reject_credentials(&self) {
        self.reject_credentials.store(true, Ordering::SeqCst);
    }

    /// Hold the next interface fetch until `release` is notified.
    pub fn gate_next_fetch(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Run `hook` after the next VLAN set is read but before it is returned.
    pub fn before_vlan_reply(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_vlan_reply.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn edit(&self, f: impl FnOnce(&mut RemoteData)) {
        f(&mut self.data.lock().unwrap());
    }

    fn check_fetch(&self, kind: EntityKind) -> Result<(), CoreError> {
        if self.failing_fetches.lock().unwrap().contains(&kind) {
            return Err(CoreError::RemoteUnavailable {
                operation: format!("fetch {kind}"),
                reason: "HTTP 503: service unavailable".into(),
            });
        }
        Ok(())
    }

    fn check_create(&self, kind: EntityKind) -> Result<(), CoreError> {
        if self.failing_creates.lock().unwrap().contains(&kind) {
            return Err(CoreError::RemoteRejected {
                operation: format!("create {kind}"),
                reason: "validation failed".into(),
                validations: BTreeMap::from([("field".into(), "invalid".into())]),
            });
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RemoteState for FakeRemote {
    async fn test_connection(&self) -> Result<ConnectionInfo, CoreError> {
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(CoreError::AuthenticationFailed {
                message: "invalid API key or secret".into(),
            });
        }
        Ok(ConnectionInfo {
            product_name: "OPNsense".into(),
            product_version: "24.7.1".into(),
            interfaces: self.data.lock().unwrap().interfaces.clone(),
        })
    }

    async fn fetch_interfaces(&self) -> Result<Vec<Interface>, CoreError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.check_fetch(EntityKind::Interface)?;
        Ok(self.data.lock().unwrap().interfaces.clone())
    }

    async fn fetch_vlans(&self) -> Result<Vec<Vlan>, CoreError> {
        self.vlan_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_fetch(EntityKind::Vlan)?;
        let vlans = self.data.lock().unwrap().vlans.clone();
        let hook = self.before_vlan_reply.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(vlans)
    }

    async fn fetch_firewall_rules(&self) -> Result<Vec<FirewallRule>, CoreError> {
        self.check_fetch(EntityKind::FirewallRule)?;
        Ok(self.data.lock().unwrap().firewall_rules.clone())
    }

    async fn fetch_port_forwards(&self) -> Result<Vec<PortForward>, CoreError> {
        self.check_fetch(EntityKind::PortForward)?;
        Ok(self.data.lock().unwrap().port_forwards.clone())
    }

    async fn fetch_dhcp_servers(&self) -> Result<Vec<DhcpServer>, CoreError> {
        self.check_fetch(EntityKind::DhcpServer)?;
        Ok(self.data.lock().unwrap().dhcp_servers.clone())
    }

    async fn fetch_dhcp_static_mappings(&self) -> Result<Vec<DhcpStaticMapping>, CoreError> {
        self.check_fetch(EntityKind::DhcpStaticMapping)?;
        Ok(self.data.lock().unwrap().dhcp_static_mappings.clone())
    }

    async fn create_vlan(&self, spec: &VlanSpec) -> Result<Vlan, CoreError> {
        self.check_create(EntityKind::Vlan)?;
        let vlan = Vlan {
            parent_interface: spec.parent_interface.clone(),
            tag: spec.tag,
            device: format!("vlan0.{}", spec.tag),
            description: spec.description.clone(),
            priority: spec.priority,
            remote_id: Some(format!("vlan-{}", spec.tag)),
        };
        self.data.lock().unwrap().vlans.push(vlan.clone());
        Ok(vlan)
    }

    async fn create_firewall_rule(
        &self,
        spec: &FirewallRuleSpec,
    ) -> Result<FirewallRule, CoreError> {
        self.check_create(EntityKind::FirewallRule)?;
        let mut data = self.data.lock().unwrap();
        let rule = FirewallRule {
            id: format!("rule-{}", data.firewall_rules.len() + 1),
            interface: spec.interface.clone(),
            action: spec.action,
            direction: "in".into(),
            protocol: spec.protocol.clone(),
            source: spec.source.clone(),
            source_port: String::new(),
            destination: spec.destination.clone(),
            destination_port: spec.destination_port.clone(),
            enabled: true,
            description: spec.description.clone(),
        };
        data.firewall_rules.push(rule.clone());
        Ok(rule)
    }

    async fn create_port_forward(&self, spec: &PortForwardSpec) -> Result<PortForward, CoreError> {
        self.check_create(EntityKind::PortForward)?;
        let pf = PortForward {
            interface: spec.interface.clone(),
            protocol: spec.protocol.clone(),
            external_port: spec.external(),
            internal_ip: spec.internal_ip.to_string(),
            internal_port: spec.internal(),
            enabled: true,
            description: spec.description.clone(),
            remote_id: Some(format!("nat-{}", spec.external_port)),
        };
        self.data.lock().unwrap().port_forwards.push(pf.clone());
        Ok(pf)
    }

    async fn create_static_mapping(
        &self,
        spec: &StaticMappingSpec,
    ) -> Result<DhcpStaticMapping, CoreError> {
        self.check_create(EntityKind::DhcpStaticMapping)?;
        let mapping = DhcpStaticMapping {
            scope: spec.scope.clone(),
            mac_address: spec.mac_address.clone(),
            ip_address: spec.ip_address,
            hostname: spec.hostname.clone(),
            description: spec.description.clone(),
            remote_id: Some(format!("map-{}", spec.mac_address)),
        };
        self.data.lock().unwrap().dhcp_static_mappings.push(mapping.clone());
        Ok(mapping)
    }
}

pub struct FakeConnector {
    pub remote: Arc<FakeRemote>,
}

impl Connector for FakeConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn RemoteState>, CoreError> {
        if config.hostname.is_empty() {
            return Err(CoreError::Config {
                message: "hostname is empty".into(),
            });
        }
        Ok(Arc::clone(&self.remote) as Arc<dyn RemoteState>)
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn tag(t: u16) -> VlanTag {
    VlanTag::new(t).unwrap()
}

pub fn mac(s: &str) -> MacAddress {
    MacAddress::parse(s).unwrap()
}

pub fn interface(name: &str, device: &str, ip: Option<[u8; 4]>) -> Interface {
    Interface {
        name: name.into(),
        device: device.into(),
        description: name.to_uppercase(),
        ip_address: ip.map(Ipv4Addr::from),
        subnet_bits: ip.map(|_| 24),
        enabled: true,
    }
}

pub fn vlan(parent: &str, t: u16) -> Vlan {
    Vlan {
        parent_interface: parent.into(),
        tag: tag(t),
        device: format!("vlan0.{t}"),
        description: format!("vlan {t}"),
        priority: 0,
        remote_id: Some(format!("vlan-{t}")),
    }
}

/// wan on igc0, lan on igc1, and a VLAN 100 on igc1 assigned as opt1.
pub fn appliance() -> RemoteData {
    RemoteData {
        interfaces: vec![
            interface("wan", "igc0", Some([203, 0, 113, 10])),
            interface("lan", "igc1", Some([192, 168, 1, 1])),
            interface("opt1", "vlan0.100", Some([10, 0, 100, 1])),
        ],
        vlans: vec![vlan("igc1", 100)],
        dhcp_servers: vec![DhcpServer {
            interface: "lan".into(),
            enabled: true,
            range_from: "192.168.1.100".into(),
            range_to: "192.168.1.199".into(),
            gateway: String::new(),
            dns_servers: Vec::new(),
            domain: String::new(),
        }],
        ..RemoteData::default()
    }
}

pub fn connection(hostname: &str) -> ConnectionConfig {
    ConnectionConfig::new(
        hostname,
        ServerCredentials {
            api_key: "key".into(),
            api_secret: SecretString::from("secret".to_owned()),
        },
    )
}

pub fn register_request(name: &str) -> RegisterRequest {
    RegisterRequest {
        name: name.into(),
        connection: connection("fw.example.net"),
        credential_ref: format!("opnmirror/{name}/api-secret"),
    }
}

pub fn mirror_with(remote: &Arc<FakeRemote>) -> Mirror {
    Mirror::new(
        Arc::new(FakeConnector {
            remote: Arc::clone(remote),
        }),
        MirrorSettings::default(),
    )
}
