// OPNsense API HTTP client
//
// Wraps `reqwest::Client` with appliance URL construction, basic auth, and
// the `{"result": "saved" | "failed", ...}` mutation envelope. Endpoint
// groups (interfaces, vlans, firewall, dhcp, system) are inherent methods
// in `crate::endpoints` so this module stays focused on transport.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::ApiCredentials;
use crate::error::Error;
use crate::models::MutationResponse;
use crate::transport::TransportConfig;

/// Raw HTTP client for one OPNsense appliance.
///
/// All paths are relative to `{base}/api/`, e.g. `core/system/version`.
pub struct OpnClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: ApiCredentials,
}

impl OpnClient {
    /// Create a client for `hostname` using the given transport settings.
    ///
    /// `hostname` may be a bare host (`fw.lan`, `10.0.0.1:8443`) or a full
    /// URL; bare hosts are assumed to speak HTTPS.
    pub fn new(
        hostname: &str,
        credentials: ApiCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let base_url = normalize_base_url(hostname)?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: ApiCredentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    /// The appliance base URL (without the `/api/` suffix).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("GET {}", url);

        let resp = self
            .credentials
            .apply(self.http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_body(resp).await
    }

    /// Send an authenticated POST with a JSON body and decode the reply.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("POST {}", url);

        let resp = self
            .credentials
            .apply(self.http.post(url).json(body))
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_body(resp).await
    }

    /// POST a create request and return the new record's uuid.
    ///
    /// The appliance answers mutations with HTTP 200 either way; a
    /// `result` other than `saved` becomes [`Error::Rejected`].
    pub(crate) async fn post_mutation(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<String, Error> {
        let resp: MutationResponse = self.post(path, body).await?;
        resp.into_uuid()
    }

    /// POST an apply/reconfigure action with an empty body.
    pub(crate) async fn post_action(&self, path: &str) -> Result<(), Error> {
        let _: serde_json::Value = self.post(path, &serde_json::json!({})).await?;
        Ok(())
    }
}

/// Accept `host`, `host:port`, or a full `https://host[:port]` URL.
fn normalize_base_url(hostname: &str) -> Result<Url, Error> {
    let trimmed = hostname.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("https://{trimmed}"))?)
    }
}

async fn parse_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("appliance refused API credentials (HTTP {})", status.as_u16()),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: preview(&body).to_owned(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body: body.clone(),
    })
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Flatten the appliance's validation map into `field: message` pairs.
pub(crate) fn summarize_validations(validations: &BTreeMap<String, String>) -> String {
    if validations.is_empty() {
        return "no validation details returned".into();
    }
    validations
        .iter()
        .map(|(field, msg)| format!("{field}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults_to_https() {
        let url = normalize_base_url("fw.lan").unwrap();
        assert_eq!(url.as_str(), "https://fw.lan/");
    }

    #[test]
    fn explicit_scheme_and_port_are_kept() {
        let url = normalize_base_url("http://10.0.0.1:8080/").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:8080/");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        let p = preview(&body);
        assert!(p.len() <= 200);
        assert!(body.starts_with(p));
    }

    #[test]
    fn validations_summary_joins_fields() {
        let v = BTreeMap::from([
            ("vlan.tag".to_owned(), "out of range".to_owned()),
            ("vlan.if".to_owned(), "required".to_owned()),
        ]);
        assert_eq!(
            summarize_validations(&v),
            "vlan.if: required; vlan.tag: out of range"
        );
    }
}
