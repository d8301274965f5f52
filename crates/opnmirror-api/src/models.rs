// Raw wire models for the OPNsense API
//
// Field names follow the appliance's JSON. The appliance is loose about
// scalar types: booleans arrive as "0"/"1" strings, numbers as strings,
// and optional fields as "" or null. The helpers in `de` absorb that so
// downstream conversion only sees typed values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::client::summarize_validations;
use crate::error::Error;

// ── Envelopes ────────────────────────────────────────────────────────

/// `{"rows": [...], "total": N}` shape returned by `search*`/`get*` grids.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
    #[serde(default, deserialize_with = "de::opt_u64")]
    pub total: Option<u64>,
}

/// Reply to every add/set call.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "de::validations")]
    pub validations: BTreeMap<String, String>,
}

impl MutationResponse {
    /// Unwrap a `saved` reply into the new record's uuid.
    pub fn into_uuid(self) -> Result<String, Error> {
        if self.result == "saved" {
            return Ok(self.uuid.unwrap_or_default());
        }
        let message = if self.validations.is_empty() {
            format!("result={}", self.result)
        } else {
            summarize_validations(&self.validations)
        };
        Err(Error::Rejected {
            message,
            validations: self.validations,
        })
    }
}

// ── System ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SystemVersion {
    #[serde(default)]
    pub product_version: String,
    #[serde(default)]
    pub product_name: String,
}

// ── Interfaces ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfacesResponse {
    #[serde(default)]
    pub interfaces: BTreeMap<String, InterfaceEntry>,
}

/// One logical interface assignment (`lan`, `wan`, `opt1`, ...).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceEntry {
    /// Device name (`igc0`, `vlan0.100`).
    #[serde(default, rename = "if", deserialize_with = "de::string")]
    pub device: String,
    #[serde(default, deserialize_with = "de::string")]
    pub descr: String,
    #[serde(default, deserialize_with = "de::string")]
    pub ipaddr: String,
    #[serde(default, deserialize_with = "de::opt_u64")]
    pub subnet: Option<u64>,
    #[serde(default, deserialize_with = "de::flag")]
    pub enable: bool,
    #[serde(default, deserialize_with = "de::string")]
    pub uuid: String,
}

// ── VLANs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VlanEntry {
    #[serde(default, deserialize_with = "de::string")]
    pub uuid: String,
    #[serde(default, rename = "if", deserialize_with = "de::string")]
    pub parent: String,
    #[serde(default, deserialize_with = "de::opt_u64")]
    pub tag: Option<u64>,
    #[serde(default, deserialize_with = "de::string")]
    pub descr: String,
    #[serde(default, deserialize_with = "de::opt_u64")]
    pub pcp: Option<u64>,
    #[serde(default, deserialize_with = "de::string")]
    pub vlanif: String,
}

/// Body for `interfaces/vlan/addItem`.
#[derive(Debug, Clone, Serialize)]
pub struct NewVlan {
    #[serde(rename = "if")]
    pub parent: String,
    pub tag: String,
    pub pcp: String,
    pub descr: String,
}

// ── Firewall filter ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRuleEntry {
    #[serde(default, deserialize_with = "de::string")]
    pub uuid: String,
    #[serde(default, deserialize_with = "de::string")]
    pub interface: String,
    #[serde(default, deserialize_with = "de::string")]
    pub action: String,
    #[serde(default, deserialize_with = "de::string")]
    pub protocol: String,
    #[serde(default, alias = "source_net", deserialize_with = "de::string")]
    pub source: String,
    #[serde(default, deserialize_with = "de::string")]
    pub source_port: String,
    #[serde(default, alias = "destination_net", deserialize_with = "de::string")]
    pub destination: String,
    #[serde(default, deserialize_with = "de::string")]
    pub destination_port: String,
    #[serde(default, deserialize_with = "de::string")]
    pub direction: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub disabled: bool,
    #[serde(default, alias = "descr", deserialize_with = "de::string")]
    pub description: String,
}

/// Body for `firewall/filter/addRule` (wrapped under `rule`).
#[derive(Debug, Clone, Serialize)]
pub struct NewFilterRule {
    pub enabled: String,
    pub action: String,
    pub interface: String,
    pub direction: String,
    pub ipprotocol: String,
    pub protocol: String,
    pub source_net: String,
    pub destination_net: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub destination_port: String,
    pub description: String,
}

// ── Firewall NAT ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NatRuleEntry {
    #[serde(default, deserialize_with = "de::string")]
    pub uuid: String,
    #[serde(default, rename = "type", deserialize_with = "de::string")]
    pub kind: String,
    #[serde(default, deserialize_with = "de::string")]
    pub interface: String,
    #[serde(default, deserialize_with = "de::string")]
    pub protocol: String,
    /// External (destination) port on the appliance.
    #[serde(default, deserialize_with = "de::string")]
    pub source_port: String,
    #[serde(default, deserialize_with = "de::string")]
    pub target: String,
    #[serde(default, deserialize_with = "de::string")]
    pub target_port: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub disabled: bool,
    #[serde(default, alias = "descr", deserialize_with = "de::string")]
    pub description: String,
}

impl NatRuleEntry {
    pub fn is_port_forward(&self) -> bool {
        self.kind == "port_forward"
    }
}

/// Body for `firewall/nat/addRule` (wrapped under `rule`).
#[derive(Debug, Clone, Serialize)]
pub struct NewNatRule {
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: String,
    pub interface: String,
    pub protocol: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
    pub description: String,
}

// ── DHCPv4 ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DhcpServiceResponse {
    #[serde(default)]
    pub dhcp: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DhcpRange {
    #[serde(default, deserialize_with = "de::string")]
    pub from: String,
    #[serde(default, deserialize_with = "de::string")]
    pub to: String,
}

/// One per-interface DHCPv4 scope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DhcpScopeEntry {
    #[serde(default, deserialize_with = "de::flag")]
    pub enable: bool,
    #[serde(default)]
    pub range: DhcpRange,
    #[serde(default, deserialize_with = "de::string")]
    pub gateway: String,
    #[serde(default, deserialize_with = "de::string")]
    pub dnsserver: String,
    #[serde(default, deserialize_with = "de::string")]
    pub domain: String,
    #[serde(default, deserialize_with = "de::staticmaps")]
    pub staticmap: Vec<StaticMapEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticMapEntry {
    #[serde(default, deserialize_with = "de::string")]
    pub uuid: String,
    #[serde(default, deserialize_with = "de::string")]
    pub mac: String,
    #[serde(default, deserialize_with = "de::string")]
    pub ipaddr: String,
    #[serde(default, deserialize_with = "de::string")]
    pub hostname: String,
    #[serde(default, deserialize_with = "de::string")]
    pub descr: String,
}

/// Body for `dhcp/service/addStaticMap/{scope}`.
#[derive(Debug, Clone, Serialize)]
pub struct NewStaticMap {
    pub mac: String,
    pub ipaddr: String,
    pub hostname: String,
    pub descr: String,
}

// ── Lenient deserializers ────────────────────────────────────────────

pub(crate) mod de {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::StaticMapEntry;

    /// Any scalar (or null) as a string.
    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => if b { "1" } else { "0" }.to_owned(),
            _ => String::new(),
        })
    }

    /// `"1"`, `1`, `true`, `"yes"` → true; everything else → false.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_u64().is_some_and(|v| v != 0),
            Value::String(s) => matches!(s.trim(), "1" | "true" | "yes" | "on"),
            _ => false,
        })
    }

    /// Number or numeric string; empty or garbage becomes `None`.
    pub fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// `{field: "msg"}` or `{field: ["msg", ...]}`.
    pub fn validations<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, String>, D::Error> {
        let Value::Object(map) = Value::deserialize(d)? else {
            return Ok(BTreeMap::new());
        };
        Ok(map
            .into_iter()
            .map(|(field, v)| {
                let msg = match v {
                    Value::String(s) => s,
                    Value::Array(items) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                    other => other.to_string(),
                };
                (field, msg)
            })
            .collect())
    }

    /// Static maps arrive as an array, a uuid-keyed object, or "".
    pub fn staticmaps<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<StaticMapEntry>, D::Error> {
        let value = Value::deserialize(d)?;
        let items: Vec<(Option<String>, Value)> = match value {
            Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
            Value::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
            _ => return Ok(Vec::new()),
        };
        items
            .into_iter()
            .map(|(key, v)| {
                let mut entry: StaticMapEntry =
                    serde_json::from_value(v).map_err(serde::de::Error::custom)?;
                if entry.uuid.is_empty() {
                    entry.uuid = key.unwrap_or_default();
                }
                Ok(entry)
            })
            .collect()
    }
}
