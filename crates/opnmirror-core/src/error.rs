// ── Core error types ──
//
// Consumers never see HTTP status codes or JSON parse failures directly.
// `CoreError::remote` folds transport-layer errors into the two remote
// classes callers act on: unavailable (retry later) and rejected (fix the
// request). Conflicts are data, reported through `ConflictReport`, and
// never surface here.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::EntityKind;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Remote errors ────────────────────────────────────────────────
    /// The appliance could not be reached, timed out, or failed
    /// server-side. Retryable.
    #[error("Appliance unavailable during {operation}: {reason}")]
    RemoteUnavailable { operation: String, reason: String },

    /// The appliance refused the request. Not retryable as-is.
    #[error("Appliance rejected {operation}: {reason}")]
    RemoteRejected {
        operation: String,
        reason: String,
        validations: BTreeMap<String, String>,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Mirror errors ────────────────────────────────────────────────
    /// A fetched set violates a mirror invariant (duplicate natural key,
    /// duplicate reservation). Nothing from that set was applied.
    #[error("Mirror inconsistent for {kind} '{key}': {reason}")]
    MirrorInconsistent {
        kind: EntityKind,
        key: String,
        reason: String,
    },

    /// A remote record could not be mapped onto the domain model.
    #[error("Cannot read {kind} '{key}': field '{field}' {reason}")]
    Conversion {
        kind: EntityKind,
        key: String,
        field: String,
        reason: String,
    },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Server not found: {identifier}")]
    ServerNotFound { identifier: String },

    #[error("Server '{name}' is already registered")]
    DuplicateServer { name: String },

    #[error("Server '{name}' has no active connection (credentials not loaded)")]
    NotConnected { name: String },

    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Map an API error raised while performing `operation`.
    pub fn remote(operation: impl Into<String>, err: opnmirror_api::Error) -> Self {
        let operation = operation.into();
        match err {
            opnmirror_api::Error::Authentication { message } => {
                Self::AuthenticationFailed { message }
            }
            opnmirror_api::Error::Rejected {
                message,
                validations,
            } => Self::RemoteRejected {
                operation,
                reason: message,
                validations,
            },
            opnmirror_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("invalid appliance URL: {e}"),
            },
            ref e if e.is_transient() => Self::RemoteUnavailable {
                operation,
                reason: e.to_string(),
            },
            opnmirror_api::Error::Api { status, message } if status >= 400 => {
                Self::RemoteRejected {
                    operation,
                    reason: format!("HTTP {status}: {message}"),
                    validations: BTreeMap::new(),
                }
            }
            other => Self::RemoteUnavailable {
                operation,
                reason: other.to_string(),
            },
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }

    /// Stable snake_case label for reports and machine output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable { .. } => "remote_unavailable",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::MirrorInconsistent { .. } => "mirror_inconsistent",
            Self::Conversion { .. } => "conversion",
            Self::ServerNotFound { .. } => "server_not_found",
            Self::DuplicateServer { .. } => "duplicate_server",
            Self::NotConnected { .. } => "not_connected",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation",
            Self::Config { .. } => "config",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<opnmirror_api::Error> for CoreError {
    fn from(err: opnmirror_api::Error) -> Self {
        Self::remote("appliance request", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_map_to_unavailable() {
        let err = CoreError::remote(
            "fetch vlans",
            opnmirror_api::Error::Api {
                status: 502,
                message: "bad gateway".into(),
            },
        );
        assert!(err.is_retryable());
        assert_eq!(err.label(), "remote_unavailable");
        assert!(err.to_string().contains("fetch vlans"));
    }

    #[test]
    fn client_errors_map_to_rejected() {
        let err = CoreError::remote(
            "create vlan",
            opnmirror_api::Error::Api {
                status: 400,
                message: "bad request".into(),
            },
        );
        assert!(!err.is_retryable());
        assert_eq!(err.label(), "remote_rejected");
    }

    #[test]
    fn validation_rejections_keep_field_details() {
        let err = CoreError::remote(
            "create port forward",
            opnmirror_api::Error::Rejected {
                message: "rule.target: required".into(),
                validations: BTreeMap::from([("rule.target".into(), "required".into())]),
            },
        );
        match err {
            CoreError::RemoteRejected { validations, .. } => {
                assert_eq!(validations.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn timeouts_are_retryable() {
        let err = CoreError::remote(
            "test connection",
            opnmirror_api::Error::Timeout { timeout_secs: 5 },
        );
        assert!(err.is_retryable());
    }
}
