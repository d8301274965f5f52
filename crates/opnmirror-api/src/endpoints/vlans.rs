// VLAN endpoints.

use serde_json::json;
use tracing::debug;

use crate::client::OpnClient;
use crate::error::Error;
use crate::models::{NewVlan, SearchResponse, VlanEntry};

impl OpnClient {
    /// List configured VLAN devices.
    ///
    /// `GET /api/interfaces/vlan/getVlans`
    pub async fn list_vlans(&self) -> Result<Vec<VlanEntry>, Error> {
        debug!("listing vlans");
        let resp: SearchResponse<VlanEntry> = self.get("interfaces/vlan/getVlans").await?;
        Ok(resp.rows)
    }

    /// Create a VLAN and return its uuid.
    ///
    /// `POST /api/interfaces/vlan/addItem` with `{"vlan": {...}}`
    pub async fn add_vlan(&self, vlan: &NewVlan) -> Result<String, Error> {
        debug!(parent = %vlan.parent, tag = %vlan.tag, "creating vlan");
        self.post_mutation("interfaces/vlan/addItem", &json!({ "vlan": vlan }))
            .await
    }

    /// Apply pending VLAN changes.
    ///
    /// `POST /api/interfaces/vlan/reconfigure`
    pub async fn reconfigure_vlans(&self) -> Result<(), Error> {
        self.post_action("interfaces/vlan/reconfigure").await
    }
}
