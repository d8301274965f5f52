use std::collections::BTreeMap;

use thiserror::Error;

/// Top-level error type for the `opnmirror-api` crate.
///
/// Covers every failure mode of the appliance API surface: authentication,
/// transport, HTTP status, structured validation rejections, and payload
/// decoding. `opnmirror-core` folds these into its remote-unavailable /
/// remote-rejected taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The appliance refused the API key/secret pair (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Appliance responses ─────────────────────────────────────────
    /// Non-success HTTP status with a truncated body preview.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The appliance accepted the request but refused the payload
    /// (`{"result": "failed", "validations": {...}}`).
    #[error("Rejected by appliance: {message}")]
    Rejected {
        message: String,
        validations: BTreeMap<String, String>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } | Self::Tls(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Field-level validation messages, if the appliance returned any.
    pub fn validations(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Rejected { validations, .. } => Some(validations),
            _ => None,
        }
    }
}
