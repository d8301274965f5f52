//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use opnmirror_config::ConfigError;
use opnmirror_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const BUSY: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Appliance unavailable during {operation}")]
    #[diagnostic(
        code(opnmirror::unavailable),
        help(
            "{reason}\n\
             Check that the appliance is reachable. For self-signed certificates\n\
             use --insecure (-k) or set ca_cert in the profile."
        )
    )]
    Unavailable { operation: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(opnmirror::auth_failed),
        help(
            "Verify the API key and secret under System > Access > Users on the appliance.\n\
             Update the secret with: opnmirror config set-secret"
        )
    )]
    AuthFailed { message: String },

    #[error("No {what} configured for profile '{profile}'")]
    #[diagnostic(
        code(opnmirror::no_credentials),
        help(
            "Configure credentials with: opnmirror config init\n\
             Or set OPNMIRROR_API_KEY and OPNMIRROR_API_SECRET."
        )
    )]
    NoCredentials { profile: String, what: String },

    // ── Lookup ───────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(opnmirror::not_found), help("Run: {hint}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        hint: String,
    },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(opnmirror::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: opnmirror config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    // ── Conflicts and deployment ─────────────────────────────────────

    #[error("{count} conflict(s) found")]
    #[diagnostic(
        code(opnmirror::conflict),
        help("Pick free values, or re-run with --force to apply anyway.")
    )]
    Conflicts { count: usize },

    #[error("Server '{name}' is already registered")]
    #[diagnostic(
        code(opnmirror::duplicate_server),
        help("Remove it first with: opnmirror server remove {name}")
    )]
    AlreadyRegistered { name: String },

    #[error("Appliance rejected {operation}: {reason}")]
    #[diagnostic(code(opnmirror::rejected))]
    Rejected { operation: String, reason: String },

    #[error("Deployment of {resource} failed")]
    #[diagnostic(
        code(opnmirror::deploy_failed),
        help("{message}\nCompleted steps are kept; re-running the deployment skips them.")
    )]
    DeployFailed { resource: String, message: String },

    #[error("Sync already in progress")]
    #[diagnostic(
        code(opnmirror::sync_in_progress),
        help("Another opnmirror process holds {lock}. Retry once it finishes.")
    )]
    SyncInProgress { lock: String },

    #[error("Sync failed: {message}")]
    #[diagnostic(code(opnmirror::sync_failed))]
    SyncFailed { message: String },

    #[error("Mirror inconsistent: {message}")]
    #[diagnostic(
        code(opnmirror::inconsistent),
        help("Fix the duplicate on the appliance, then run: opnmirror sync")
    )]
    Inconsistent { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(opnmirror::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid declaration file {path}")]
    #[diagnostic(
        code(opnmirror::declaration),
        help("{reason}\nExpected a resource with `kind: vlan | port_forward | container`, a list of them, or `resources: [...]`.")
    )]
    Declaration { path: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(opnmirror::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration and state ──────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(opnmirror::config))]
    Config(ConfigError),

    #[error("Cannot read mirror state from {path}")]
    #[diagnostic(
        code(opnmirror::state),
        help("{reason}\nMove the file aside to start from an empty mirror.")
    )]
    State { path: String, reason: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(opnmirror::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(opnmirror::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflicts { .. } | Self::AlreadyRegistered { .. } => exit_code::CONFLICT,
            Self::SyncInProgress { .. } => exit_code::BUSY,
            Self::Validation { .. }
            | Self::Declaration { .. }
            | Self::ProfileNotFound { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn server_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: "server".into(),
            identifier: identifier.into(),
            hint: "opnmirror server list (or register it with: opnmirror server register)".into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RemoteUnavailable { operation, reason } => {
                Self::Unavailable { operation, reason }
            }

            CoreError::RemoteRejected {
                operation,
                reason,
                validations,
            } => {
                let mut reason = reason;
                for (field, msg) in validations {
                    reason.push_str(&format!("\n  {field}: {msg}"));
                }
                Self::Rejected { operation, reason }
            }

            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },

            e @ (CoreError::MirrorInconsistent { .. } | CoreError::Conversion { .. }) => {
                Self::Inconsistent {
                    message: e.to_string(),
                }
            }

            CoreError::ServerNotFound { identifier } => Self::server_not_found(identifier),

            CoreError::DuplicateServer { name } => Self::AlreadyRegistered { name },

            CoreError::NotConnected { name } => Self::NoCredentials {
                profile: name,
                what: "credentials".into(),
            },

            CoreError::NotFound { kind, key } => Self::NotFound {
                hint: format!("opnmirror list {kind}s"),
                resource_type: kind.to_string(),
                identifier: key,
            },

            CoreError::Validation { field, message } => Self::Validation {
                field,
                reason: message,
            },

            CoreError::Config { message } => Self::Validation {
                field: "connection".into(),
                reason: message,
            },

            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile, what } => Self::NoCredentials {
                profile,
                what: what.into(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}
