// Firewall filter and NAT endpoints.

use serde_json::json;
use tracing::debug;

use crate::client::OpnClient;
use crate::error::Error;
use crate::models::{FilterRuleEntry, NatRuleEntry, NewFilterRule, NewNatRule, SearchResponse};

impl OpnClient {
    // ── Filter rules ─────────────────────────────────────────────────

    /// List filter rules.
    ///
    /// `GET /api/firewall/filter/searchRule`
    pub async fn search_filter_rules(&self) -> Result<Vec<FilterRuleEntry>, Error> {
        debug!("listing filter rules");
        let resp: SearchResponse<FilterRuleEntry> = self.get("firewall/filter/searchRule").await?;
        Ok(resp.rows)
    }

    /// Create a filter rule and return its uuid.
    ///
    /// `POST /api/firewall/filter/addRule` with `{"rule": {...}}`
    pub async fn add_filter_rule(&self, rule: &NewFilterRule) -> Result<String, Error> {
        debug!(interface = %rule.interface, "creating filter rule");
        self.post_mutation("firewall/filter/addRule", &json!({ "rule": rule }))
            .await
    }

    /// Apply pending filter changes.
    ///
    /// `POST /api/firewall/filter/apply`
    pub async fn apply_filter(&self) -> Result<(), Error> {
        self.post_action("firewall/filter/apply").await
    }

    // ── NAT ──────────────────────────────────────────────────────────

    /// List all NAT rules; callers filter to `type == "port_forward"`.
    ///
    /// `GET /api/firewall/nat/searchRule`
    pub async fn search_nat_rules(&self) -> Result<Vec<NatRuleEntry>, Error> {
        debug!("listing nat rules");
        let resp: SearchResponse<NatRuleEntry> = self.get("firewall/nat/searchRule").await?;
        Ok(resp.rows)
    }

    /// List only port-forward NAT rules.
    pub async fn list_port_forwards(&self) -> Result<Vec<NatRuleEntry>, Error> {
        let rows = self.search_nat_rules().await?;
        Ok(rows.into_iter().filter(NatRuleEntry::is_port_forward).collect())
    }

    /// Create a NAT rule and return its uuid.
    ///
    /// `POST /api/firewall/nat/addRule` with `{"rule": {...}}`
    pub async fn add_nat_rule(&self, rule: &NewNatRule) -> Result<String, Error> {
        debug!(interface = %rule.interface, port = %rule.source_port, "creating nat rule");
        self.post_mutation("firewall/nat/addRule", &json!({ "rule": rule }))
            .await
    }
}
