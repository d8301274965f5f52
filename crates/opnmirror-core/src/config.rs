// ── Runtime connection configuration ──
//
// These types describe how to reach one appliance. They carry credential
// data and connection tuning but never touch disk: the CLI resolves a
// profile into a `ConnectionConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;

/// API key/secret pair for one appliance.
#[derive(Debug, Clone)]
pub struct ServerCredentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs, the appliance default).
    #[default]
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub fn from_verify_ssl(verify_ssl: bool) -> Self {
        if verify_ssl {
            Self::SystemDefaults
        } else {
            Self::DangerAcceptInvalid
        }
    }

    pub fn verifies(&self) -> bool {
        !matches!(self, Self::DangerAcceptInvalid)
    }
}

/// Everything needed to open a connection to one appliance.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host, `host:port`, or full base URL.
    pub hostname: String,
    pub credentials: ServerCredentials,
    pub tls: TlsVerification,
    /// Per-request timeout; also bounds each remote call made by the
    /// synchronizer and orchestrator.
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(hostname: impl Into<String>, credentials: ServerCredentials) -> Self {
        Self {
            hostname: hostname.into(),
            credentials,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub(crate) fn transport(&self) -> opnmirror_api::TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => opnmirror_api::TlsMode::System,
            TlsVerification::CustomCa(path) => opnmirror_api::TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => opnmirror_api::TlsMode::DangerAcceptInvalid,
        };
        opnmirror_api::TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }
}

/// Mirror-wide tuning.
#[derive(Debug, Clone)]
pub struct MirrorSettings {
    /// Upper bound on any single remote call.
    pub remote_timeout: Duration,
    /// Default WAN interface for container port forwards.
    pub wan_interface: String,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(30),
            wan_interface: "wan".into(),
        }
    }
}
