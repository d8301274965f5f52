// System endpoints: firmware/version info used as the connectivity and
// credential probe.

use tracing::debug;

use crate::client::OpnClient;
use crate::error::Error;
use crate::models::SystemVersion;

impl OpnClient {
    /// Fetch product name and version.
    ///
    /// `GET /api/core/system/version`
    pub async fn system_version(&self) -> Result<SystemVersion, Error> {
        debug!("fetching system version");
        self.get("core/system/version").await
    }
}
