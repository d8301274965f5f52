// ── API-to-domain type conversions ──
//
// Bridges raw `opnmirror_api::models` records into canonical domain types.
// Values the appliance leaves blank get the appliance's own defaults; a
// value that is present but unparseable fails the record with a
// `CoreError::Conversion` naming the field.

use std::net::Ipv4Addr;

use opnmirror_api::models::{
    DhcpScopeEntry, FilterRuleEntry, InterfaceEntry, NatRuleEntry, StaticMapEntry, VlanEntry,
};

use crate::error::CoreError;
use crate::model::{
    DhcpServer, DhcpStaticMapping, EntityKind, FirewallRule, Interface, MacAddress, PortForward,
    PortSpec, Protocol, RuleAction, Vlan, VlanTag,
};

// ── Helpers ────────────────────────────────────────────────────────

fn conversion(kind: EntityKind, key: &str, field: &str, reason: impl Into<String>) -> CoreError {
    CoreError::Conversion {
        kind,
        key: key.to_owned(),
        field: field.to_owned(),
        reason: reason.into(),
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Address fields may carry `dhcp`, `track6`, or a CIDR suffix.
fn parse_ipv4(raw: &str) -> Option<Ipv4Addr> {
    raw.split('/').next().and_then(|s| s.trim().parse().ok())
}

// ── Interfaces ─────────────────────────────────────────────────────

pub(crate) fn interface_from_entry(name: String, entry: InterfaceEntry) -> Interface {
    Interface {
        ip_address: parse_ipv4(&entry.ipaddr),
        subnet_bits: entry.subnet.and_then(|s| u8::try_from(s).ok()).filter(|s| *s <= 32),
        device: entry.device,
        description: entry.descr,
        enabled: entry.enable,
        name,
    }
}

// ── VLANs ──────────────────────────────────────────────────────────

impl TryFrom<VlanEntry> for Vlan {
    type Error = CoreError;

    fn try_from(entry: VlanEntry) -> Result<Self, Self::Error> {
        let key = if entry.uuid.is_empty() {
            entry.vlanif.clone()
        } else {
            entry.uuid.clone()
        };
        let raw_tag = entry
            .tag
            .ok_or_else(|| conversion(EntityKind::Vlan, &key, "tag", "is missing"))?;
        let tag = u16::try_from(raw_tag)
            .ok()
            .and_then(|t| VlanTag::new(t).ok())
            .ok_or_else(|| {
                conversion(EntityKind::Vlan, &key, "tag", format!("{raw_tag} is not 1-4094"))
            })?;
        if entry.parent.trim().is_empty() {
            return Err(conversion(EntityKind::Vlan, &key, "if", "is missing"));
        }

        Ok(Self {
            parent_interface: entry.parent,
            tag,
            device: entry.vlanif,
            description: entry.descr,
            priority: entry
                .pcp
                .and_then(|p| u8::try_from(p).ok())
                .filter(|p| *p <= 7)
                .unwrap_or(0),
            remote_id: non_empty(entry.uuid),
        })
    }
}

// ── Filter rules ───────────────────────────────────────────────────

impl TryFrom<FilterRuleEntry> for FirewallRule {
    type Error = CoreError;

    fn try_from(entry: FilterRuleEntry) -> Result<Self, Self::Error> {
        let action = if entry.action.trim().is_empty() {
            RuleAction::Pass
        } else {
            entry.action.parse().map_err(|_| {
                conversion(
                    EntityKind::FirewallRule,
                    &entry.uuid,
                    "action",
                    format!("'{}' is not pass/block/reject", entry.action),
                )
            })?
        };
        if entry.uuid.trim().is_empty() {
            return Err(conversion(
                EntityKind::FirewallRule,
                &entry.description,
                "uuid",
                "is missing",
            ));
        }

        Ok(Self {
            id: entry.uuid,
            interface: entry.interface,
            action,
            direction: non_empty(entry.direction).unwrap_or_else(|| "in".into()),
            protocol: non_empty(entry.protocol).unwrap_or_else(|| "any".into()),
            source: non_empty(entry.source).unwrap_or_else(|| "any".into()),
            source_port: entry.source_port,
            destination: non_empty(entry.destination).unwrap_or_else(|| "any".into()),
            destination_port: entry.destination_port,
            enabled: !entry.disabled,
            description: entry.description,
        })
    }
}

// ── Port forwards ──────────────────────────────────────────────────

impl TryFrom<NatRuleEntry> for PortForward {
    type Error = CoreError;

    fn try_from(entry: NatRuleEntry) -> Result<Self, Self::Error> {
        let key = entry.uuid.clone();
        let protocol: Protocol = if entry.protocol.trim().is_empty() {
            Protocol::Tcp
        } else {
            entry.protocol.parse().map_err(|e: CoreError| {
                conversion(EntityKind::PortForward, &key, "protocol", e.to_string())
            })?
        };
        let external_port: PortSpec = entry.source_port.parse().map_err(|e: CoreError| {
            conversion(EntityKind::PortForward, &key, "source_port", e.to_string())
        })?;
        let internal_port = if entry.target_port.trim().is_empty() {
            external_port.clone()
        } else {
            entry.target_port.parse().map_err(|e: CoreError| {
                conversion(EntityKind::PortForward, &key, "target_port", e.to_string())
            })?
        };

        Ok(Self {
            interface: entry.interface,
            protocol,
            external_port,
            internal_ip: entry.target,
            internal_port,
            enabled: !entry.disabled,
            description: entry.description,
            remote_id: non_empty(entry.uuid),
        })
    }
}

// ── DHCP ───────────────────────────────────────────────────────────

pub(crate) fn dhcp_server_from_scope(interface: String, scope: &DhcpScopeEntry) -> DhcpServer {
    DhcpServer {
        interface,
        enabled: scope.enable,
        range_from: scope.range.from.clone(),
        range_to: scope.range.to.clone(),
        gateway: scope.gateway.clone(),
        dns_servers: scope
            .dnsserver
            .split([',', ' ', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        domain: scope.domain.clone(),
    }
}

pub(crate) fn static_mapping_from_entry(
    scope: &str,
    entry: StaticMapEntry,
) -> Result<DhcpStaticMapping, CoreError> {
    let key = format!("{scope}/{}", entry.mac);
    let mac_address = MacAddress::parse(&entry.mac).map_err(|e| {
        conversion(EntityKind::DhcpStaticMapping, &key, "mac", e.to_string())
    })?;
    let ip_address = parse_ipv4(&entry.ipaddr).ok_or_else(|| {
        conversion(
            EntityKind::DhcpStaticMapping,
            &key,
            "ipaddr",
            format!("'{}' is not an IPv4 address", entry.ipaddr),
        )
    })?;

    Ok(DhcpStaticMapping {
        scope: scope.to_owned(),
        mac_address,
        ip_address,
        hostname: entry.hostname,
        description: entry.descr,
        remote_id: non_empty(entry.uuid),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interface_with_dhcp_address_has_no_ip() {
        let iface = interface_from_entry(
            "wan".into(),
            InterfaceEntry {
                device: "igc0".into(),
                ipaddr: "dhcp".into(),
                enable: true,
                ..InterfaceEntry::default()
            },
        );
        assert_eq!(iface.ip_address, None);
        assert_eq!(iface.device, "igc0");
    }

    #[test]
    fn vlan_out_of_range_names_the_field() {
        let err = Vlan::try_from(VlanEntry {
            uuid: "v-1".into(),
            parent: "igc0".into(),
            tag: Some(5000),
            ..VlanEntry::default()
        })
        .unwrap_err();
        match err {
            CoreError::Conversion { field, key, .. } => {
                assert_eq!(field, "tag");
                assert_eq!(key, "v-1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nat_rule_without_target_port_reuses_external() {
        let pf = PortForward::try_from(NatRuleEntry {
            uuid: "n-1".into(),
            kind: "port_forward".into(),
            interface: "wan".into(),
            protocol: "TCP/UDP".into(),
            source_port: "443".into(),
            target: "10.0.100.5".into(),
            ..NatRuleEntry::default()
        })
        .unwrap();
        assert_eq!(pf.protocol, Protocol::TcpUdp);
        assert_eq!(pf.internal_port, PortSpec::single(443).unwrap());
        assert!(pf.enabled);
    }

    #[test]
    fn disabled_filter_rule_is_not_enabled() {
        let rule = FirewallRule::try_from(FilterRuleEntry {
            uuid: "r-1".into(),
            action: "block".into(),
            disabled: true,
            ..FilterRuleEntry::default()
        })
        .unwrap();
        assert_eq!(rule.action, RuleAction::Block);
        assert!(!rule.enabled);
        assert_eq!(rule.source, "any");
    }

    #[test]
    fn static_mapping_normalizes_mac() {
        let m = static_mapping_from_entry(
            "opt2",
            StaticMapEntry {
                uuid: "m-1".into(),
                mac: "AA-BB-CC-DD-EE-01".into(),
                ipaddr: "10.0.100.5".into(),
                ..StaticMapEntry::default()
            },
        )
        .unwrap();
        assert_eq!(m.mac_address.as_str(), "aa:bb:cc:dd:ee:01");
        assert_eq!(m.ip_address, Ipv4Addr::new(10, 0, 100, 5));
    }

    #[test]
    fn dns_servers_split_on_commas() {
        let server = dhcp_server_from_scope(
            "lan".into(),
            &DhcpScopeEntry {
                dnsserver: "1.1.1.1, 9.9.9.9".into(),
                ..DhcpScopeEntry::default()
            },
        );
        assert_eq!(server.dns_servers, vec!["1.1.1.1", "9.9.9.9"]);
    }
}
