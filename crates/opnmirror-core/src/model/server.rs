// ── Registered appliances ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ServerId;

/// A registered appliance. Secrets are never held here, only a
/// reference to where the caller keeps them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub hostname: String,
    pub verify_ssl: bool,
    /// Where the API secret lives (e.g. `keyring:opnmirror/fw1/api-secret`).
    pub credential_ref: String,
    pub product_version: Option<String>,
    pub registered_at: DateTime<Utc>,
}
