// DHCPv4 service endpoints.
//
// `dhcp/service/get` returns one object keyed by interface name; a few
// keys hold service-wide settings rather than scopes and are skipped.

use serde_json::json;
use tracing::debug;

use crate::client::OpnClient;
use crate::error::Error;
use crate::models::{DhcpScopeEntry, DhcpServiceResponse, NewStaticMap};

/// Top-level keys of the DHCP service object that are not scopes.
pub const NON_SCOPE_KEYS: &[&str] = &["registration", "netflow", "ntpd"];

impl OpnClient {
    /// List DHCPv4 scopes keyed by interface, with their static maps.
    ///
    /// `GET /api/dhcp/service/get`
    pub async fn list_dhcp_scopes(&self) -> Result<Vec<(String, DhcpScopeEntry)>, Error> {
        debug!("listing dhcp scopes");
        let resp: DhcpServiceResponse = self.get("dhcp/service/get").await?;

        let mut scopes = Vec::new();
        for (key, value) in resp.dhcp {
            if NON_SCOPE_KEYS.contains(&key.as_str()) || !value.is_object() {
                continue;
            }
            match serde_json::from_value::<DhcpScopeEntry>(value) {
                Ok(scope) => scopes.push((key, scope)),
                Err(e) => {
                    return Err(Error::Deserialization {
                        message: format!("dhcp scope '{key}': {e}"),
                        body: String::new(),
                    });
                }
            }
        }
        if scopes.is_empty() {
            debug!("appliance reported no dhcp scopes");
        }
        Ok(scopes)
    }

    /// Reserve an address in `scope` and return the mapping uuid.
    ///
    /// `POST /api/dhcp/service/addStaticMap/{scope}` with `{"staticmap": {...}}`
    pub async fn add_static_map(&self, scope: &str, map: &NewStaticMap) -> Result<String, Error> {
        debug!(scope, mac = %map.mac, ip = %map.ipaddr, "creating static mapping");
        let path = format!("dhcp/service/addStaticMap/{scope}");
        self.post_mutation(&path, &json!({ "staticmap": map })).await
    }

    /// Restart the DHCP service so new reservations take effect.
    ///
    /// `POST /api/dhcp/service/reconfigure`
    pub async fn reconfigure_dhcp(&self) -> Result<(), Error> {
        self.post_action("dhcp/service/reconfigure").await
    }
}
