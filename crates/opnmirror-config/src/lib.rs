//! Configuration for the opnmirror CLI.
//!
//! TOML profiles (one per appliance), file locations, credential
//! resolution (env + keyring + plaintext), and translation to
//! `opnmirror_core::ConnectionConfig` / `MirrorSettings`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use opnmirror_core::{ConnectionConfig, MirrorSettings, ServerCredentials, TlsVerification};

/// Keyring service name; entries are `{profile}/api-secret`.
pub const KEYRING_SERVICE: &str = "opnmirror";

const ENV_PREFIX: &str = "OPNMIRROR_";
const ENV_API_KEY: &str = "OPNMIRROR_API_KEY";
const ENV_API_SECRET: &str = "OPNMIRROR_API_SECRET";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' is not defined in {path}")]
    UnknownProfile { profile: String, path: String },

    #[error("no {what} configured for profile '{profile}'")]
    NoCredentials { profile: String, what: &'static str },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named appliance profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Remote call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Interface published container ports are forwarded from.
    #[serde(default = "default_wan")]
    pub wan_interface: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            wan_interface: default_wan(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_wan() -> String {
    "wan".into()
}

/// One appliance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Appliance address (`fw.example.net`, `10.0.0.1:8443`, or a full URL).
    pub hostname: String,

    /// API key (the basic-auth user).
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,

    /// API secret in plaintext; prefer the keyring.
    pub api_secret: Option<String>,

    /// Environment variable holding the API secret.
    pub api_secret_env: Option<String>,

    /// Verify the appliance certificate against system roots.
    #[serde(default)]
    pub verify_ssl: bool,

    /// Custom CA certificate; implies verification.
    pub ca_cert: Option<PathBuf>,

    pub timeout: Option<u64>,

    pub wan_interface: Option<String>,
}

impl Config {
    /// Name of the profile to use: the explicit one, else the default.
    pub fn profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.to_owned(),
                path: config_path().display().to_string(),
            })
    }

    /// Mirror settings for `profile`, falling back to global defaults.
    pub fn mirror_settings(&self, profile: Option<&Profile>) -> MirrorSettings {
        let timeout = profile
            .and_then(|p| p.timeout)
            .unwrap_or(self.defaults.timeout);
        let wan_interface = profile
            .and_then(|p| p.wan_interface.clone())
            .unwrap_or_else(|| self.defaults.wan_interface.clone());
        MirrorSettings {
            remote_timeout: Duration::from_secs(timeout),
            wan_interface,
        }
    }
}

// ── File locations ──────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "opnmirror", "opnmirror")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    for part in parts {
        p.push(part);
    }
    p
}

/// Config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".config", "opnmirror", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Mirror state file (JSON snapshot of every registered server).
pub fn state_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "opnmirror", "state.json"]),
        |dirs| dirs.data_dir().join("state.json"),
    )
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load the config at the canonical path, merged with `OPNMIRROR_*` env.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the TOML file at `path` (if present), then env vars
/// such as `OPNMIRROR_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Where the API secret for `profile_name` lives in the keyring.
pub fn credential_ref(profile_name: &str) -> String {
    format!("{KEYRING_SERVICE}/{profile_name}/api-secret")
}

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/api-secret"),
    )?)
}

/// API key: profile env var, `OPNMIRROR_API_KEY`, then plaintext.
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    let from_env = profile
        .api_key_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
        .or_else(|| std::env::var(ENV_API_KEY).ok());
    from_env
        .or_else(|| profile.api_key.clone())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            what: "API key",
        })
}

/// API secret: profile env var, `OPNMIRROR_API_SECRET`, system keyring,
/// then plaintext.
pub fn resolve_api_secret(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Environment
    if let Some(val) = profile
        .api_secret_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
        .or_else(|| std::env::var(ENV_API_SECRET).ok())
    {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(secret) = keyring_entry(profile_name).and_then(|e| Ok(e.get_password()?)) {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref secret) = profile.api_secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        what: "API secret",
    })
}

/// Store the API secret for `profile_name` in the system keyring.
pub fn store_api_secret(profile_name: &str, secret: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(secret)?;
    debug!(profile = %profile_name, "api secret stored in keyring");
    Ok(())
}

/// TLS policy from a profile: a CA file wins, then `verify_ssl`.
pub fn tls_for(profile: &Profile) -> TlsVerification {
    match &profile.ca_cert {
        Some(path) => TlsVerification::CustomCa(path.clone()),
        None => TlsVerification::from_verify_ssl(profile.verify_ssl),
    }
}

/// Build a `ConnectionConfig` from a profile, resolving credentials.
pub fn profile_to_connection_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ConnectionConfig, ConfigError> {
    if profile.hostname.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "hostname".into(),
            reason: format!("profile '{profile_name}' has no hostname"),
        });
    }
    let credentials = ServerCredentials {
        api_key: resolve_api_key(profile, profile_name)?,
        api_secret: resolve_api_secret(profile, profile_name)?,
    };
    Ok(ConnectionConfig {
        hostname: profile.hostname.clone(),
        credentials,
        tls: tls_for(profile),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    })
}
