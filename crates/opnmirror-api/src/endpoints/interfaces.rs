// Interface assignment endpoints.

use tracing::debug;

use crate::client::OpnClient;
use crate::error::Error;
use crate::models::{InterfaceEntry, InterfacesResponse};

impl OpnClient {
    /// List logical interface assignments keyed by name (`lan`, `opt1`, ...).
    ///
    /// `GET /api/interfaces/interface/getInterfaces`
    pub async fn list_interfaces(&self) -> Result<Vec<(String, InterfaceEntry)>, Error> {
        debug!("listing interfaces");
        let resp: InterfacesResponse = self.get("interfaces/interface/getInterfaces").await?;
        Ok(resp.interfaces.into_iter().collect())
    }
}
