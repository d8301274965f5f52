// ── Remote state client ──
//
// `RemoteState` is the typed seam between the mirror and an appliance:
// fetch per entity type, create per entity type, connectivity test.
// `OpnRemote` implements it over `opnmirror_api::OpnClient`; tests plug in
// scripted fakes through `Connector`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use opnmirror_api::models::{NewFilterRule, NewNatRule, NewStaticMap, NewVlan};
use opnmirror_api::{ApiCredentials, OpnClient};

use crate::config::ConnectionConfig;
use crate::convert;
use crate::error::CoreError;
use crate::model::{
    DhcpServer, DhcpStaticMapping, FirewallRule, Interface, PortForward, Protocol, Vlan,
};
use crate::spec::{FirewallRuleSpec, PortForwardSpec, StaticMappingSpec, VlanSpec};

/// Result of a successful connectivity and credential test.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub product_name: String,
    pub product_version: String,
    pub interfaces: Vec<Interface>,
}

/// Typed accessor over one appliance.
#[async_trait]
pub trait RemoteState: Send + Sync {
    async fn test_connection(&self) -> Result<ConnectionInfo, CoreError>;

    async fn fetch_interfaces(&self) -> Result<Vec<Interface>, CoreError>;
    async fn fetch_vlans(&self) -> Result<Vec<Vlan>, CoreError>;
    async fn fetch_firewall_rules(&self) -> Result<Vec<FirewallRule>, CoreError>;
    async fn fetch_port_forwards(&self) -> Result<Vec<PortForward>, CoreError>;
    async fn fetch_dhcp_servers(&self) -> Result<Vec<DhcpServer>, CoreError>;
    async fn fetch_dhcp_static_mappings(&self) -> Result<Vec<DhcpStaticMapping>, CoreError>;

    async fn create_vlan(&self, spec: &VlanSpec) -> Result<Vlan, CoreError>;
    async fn create_firewall_rule(&self, spec: &FirewallRuleSpec)
    -> Result<FirewallRule, CoreError>;
    async fn create_port_forward(&self, spec: &PortForwardSpec) -> Result<PortForward, CoreError>;
    async fn create_static_mapping(
        &self,
        spec: &StaticMappingSpec,
    ) -> Result<DhcpStaticMapping, CoreError>;
}

/// Opens a `RemoteState` for a connection config.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn RemoteState>, CoreError>;
}

/// Bound a remote call; an elapsed timeout is `RemoteUnavailable`.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    operation: &str,
    call: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| {
            Err(CoreError::RemoteUnavailable {
                operation: operation.to_owned(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            })
        })
}

// ── OPNsense implementation ─────────────────────────────────────────

/// Builds `OpnRemote`s over HTTPS.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpnConnector;

impl Connector for OpnConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn RemoteState>, CoreError> {
        let credentials = ApiCredentials::new(
            config.credentials.api_key.clone(),
            config.credentials.api_secret.clone(),
        );
        let client = OpnClient::new(&config.hostname, credentials, &config.transport())
            .map_err(|e| CoreError::remote("connect", e))?;
        debug!(host = %client.base_url(), "opened appliance client");
        Ok(Arc::new(OpnRemote { client }))
    }
}

pub struct OpnRemote {
    client: OpnClient,
}

impl OpnRemote {
    pub fn new(client: OpnClient) -> Self {
        Self { client }
    }
}

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_owned()
}

#[async_trait]
impl RemoteState for OpnRemote {
    async fn test_connection(&self) -> Result<ConnectionInfo, CoreError> {
        let version = self
            .client
            .system_version()
            .await
            .map_err(|e| CoreError::remote("test connection", e))?;
        let interfaces = self.fetch_interfaces().await?;
        Ok(ConnectionInfo {
            product_name: version.product_name,
            product_version: version.product_version,
            interfaces,
        })
    }

    async fn fetch_interfaces(&self) -> Result<Vec<Interface>, CoreError> {
        let rows = self
            .client
            .list_interfaces()
            .await
            .map_err(|e| CoreError::remote("fetch interfaces", e))?;
        Ok(rows
            .into_iter()
            .map(|(name, entry)| convert::interface_from_entry(name, entry))
            .collect())
    }

    async fn fetch_vlans(&self) -> Result<Vec<Vlan>, CoreError> {
        let rows = self
            .client
            .list_vlans()
            .await
            .map_err(|e| CoreError::remote("fetch vlans", e))?;
        rows.into_iter().map(Vlan::try_from).collect()
    }

    async fn fetch_firewall_rules(&self) -> Result<Vec<FirewallRule>, CoreError> {
        let rows = self
            .client
            .search_filter_rules()
            .await
            .map_err(|e| CoreError::remote("fetch firewall rules", e))?;
        rows.into_iter().map(FirewallRule::try_from).collect()
    }

    async fn fetch_port_forwards(&self) -> Result<Vec<PortForward>, CoreError> {
        let rows = self
            .client
            .list_port_forwards()
            .await
            .map_err(|e| CoreError::remote("fetch port forwards", e))?;
        rows.into_iter().map(PortForward::try_from).collect()
    }

    async fn fetch_dhcp_servers(&self) -> Result<Vec<DhcpServer>, CoreError> {
        let scopes = self
            .client
            .list_dhcp_scopes()
            .await
            .map_err(|e| CoreError::remote("fetch dhcp servers", e))?;
        Ok(scopes
            .into_iter()
            .map(|(name, scope)| convert::dhcp_server_from_scope(name, &scope))
            .collect())
    }

    async fn fetch_dhcp_static_mappings(&self) -> Result<Vec<DhcpStaticMapping>, CoreError> {
        let scopes = self
            .client
            .list_dhcp_scopes()
            .await
            .map_err(|e| CoreError::remote("fetch dhcp static mappings", e))?;
        let mut mappings = Vec::new();
        for (name, scope) in scopes {
            for entry in scope.staticmap {
                mappings.push(convert::static_mapping_from_entry(&name, entry)?);
            }
        }
        Ok(mappings)
    }

    async fn create_vlan(&self, spec: &VlanSpec) -> Result<Vlan, CoreError> {
        let op = format!("create vlan {}", spec.natural_key());
        let uuid = self
            .client
            .add_vlan(&NewVlan {
                parent: spec.parent_interface.clone(),
                tag: spec.tag.to_string(),
                pcp: spec.priority.to_string(),
                descr: spec.description.clone(),
            })
            .await
            .map_err(|e| CoreError::remote(&op, e))?;
        self.client
            .reconfigure_vlans()
            .await
            .map_err(|e| CoreError::remote(&op, e))?;

        // The device name is assigned by the appliance. Without it the VLAN
        // is recorded with an empty device until the next sync fills it in.
        let device = match self.client.list_vlans().await {
            Ok(rows) => match rows.into_iter().find(|r| r.uuid == uuid) {
                Some(row) => row.vlanif,
                None => {
                    warn!(%uuid, vlan = %spec.natural_key(), "created vlan missing from listing");
                    String::new()
                }
            },
            Err(e) => {
                warn!(%uuid, vlan = %spec.natural_key(), error = %e, "could not read device of created vlan");
                String::new()
            }
        };

        Ok(Vlan {
            parent_interface: spec.parent_interface.clone(),
            tag: spec.tag,
            device,
            description: spec.description.clone(),
            priority: spec.priority,
            remote_id: Some(uuid).filter(|u| !u.is_empty()),
        })
    }

    async fn create_firewall_rule(
        &self,
        spec: &FirewallRuleSpec,
    ) -> Result<FirewallRule, CoreError> {
        let op = format!("create firewall rule on {}", spec.interface);
        let uuid = self
            .client
            .add_filter_rule(&NewFilterRule {
                enabled: flag(true),
                action: spec.action.to_string(),
                interface: spec.interface.clone(),
                direction: "in".into(),
                ipprotocol: "inet".into(),
                protocol: spec.protocol.clone(),
                source_net: spec.source.clone(),
                destination_net: spec.destination.clone(),
                destination_port: spec.destination_port.clone(),
                description: spec.description.clone(),
            })
            .await
            .map_err(|e| CoreError::remote(&op, e))?;
        self.client
            .apply_filter()
            .await
            .map_err(|e| CoreError::remote(&op, e))?;

        Ok(FirewallRule {
            id: if uuid.is_empty() {
                FirewallRule::pending_id()
            } else {
                uuid
            },
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
        })
    }

    async fn create_port_forward(&self, spec: &PortForwardSpec) -> Result<PortForward, CoreError> {
        let op = format!(
            "create port forward {}/{}/{}",
            spec.interface, spec.protocol, spec.external_port
        );
        let protocol = match &spec.protocol {
            Protocol::TcpUdp => "TCP/UDP".to_owned(),
            other => other.as_wire().to_ascii_uppercase(),
        };
        let uuid = self
            .client
            .add_nat_rule(&NewNatRule {
                kind: "port_forward".into(),
                enabled: flag(true),
                interface: spec.interface.clone(),
                protocol,
                source_port: spec.external().to_string(),
                target: spec.internal_ip.to_string(),
                target_port: spec.internal().to_string(),
                description: spec.description.clone(),
            })
            .await
            .map_err(|e| CoreError::remote(&op, e))?;
        self.client
            .apply_filter()
            .await
            .map_err(|e| CoreError::remote(&op, e))?;

        Ok(PortForward {
            interface: spec.interface.clone(),
            protocol: spec.protocol.clone(),
            external_port: spec.external(),
            internal_ip: spec.internal_ip.to_string(),
            internal_port: spec.internal(),
            enabled: true,
            description: spec.description.clone(),
            remote_id: Some(uuid).filter(|u| !u.is_empty()),
        })
    }

    async fn create_static_mapping(
        &self,
        spec: &StaticMappingSpec,
    ) -> Result<DhcpStaticMapping, CoreError> {
        let op = format!(
            "create dhcp reservation {}/{}",
            spec.scope, spec.mac_address
        );
        let uuid = self
            .client
            .add_static_map(
                &spec.scope,
                &NewStaticMap {
                    mac: spec.mac_address.to_string(),
                    ipaddr: spec.ip_address.to_string(),
                    hostname: spec.hostname.clone(),
                    descr: spec.description.clone(),
                },
            )
            .await
            .map_err(|e| CoreError::remote(&op, e))?;
        self.client
            .reconfigure_dhcp()
            .await
            .map_err(|e| CoreError::remote(&op, e))?;

        Ok(DhcpStaticMapping {
            scope: spec.scope.clone(),
            mac_address: spec.mac_address.clone(),
            ip_address: spec.ip_address,
            hostname: spec.hostname.clone(),
            description: spec.description.clone(),
            remote_id: Some(uuid).filter(|u| !u.is_empty()),
        })
    }
}
