// ── Synchronizer ──
//
// Pulls each entity type from the appliance in a fixed order and
// reconciles it into the server's `MirrorStore`. A type whose fetch or
// reconcile fails keeps its previous data and is reported; the other
// types still run. Serialization of passes per server is the caller's
// job (`Mirror` holds the per-server lock).

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{EntityKind, ServerId};
use crate::remote::{RemoteState, bounded};
use crate::store::{ChangeCounts, MirrorEntity, MirrorStore, Reconciled};

// ── Result types ────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncStatus {
    /// Every entity type reconciled.
    Complete,
    /// Some entity types failed; their previous data is retained.
    Partial,
    /// No entity type reconciled.
    Failed,
    /// Another pass for this server was already running; nothing was done.
    InProgress,
}

/// Change counts per synced entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub interfaces: ChangeCounts,
    pub vlans: ChangeCounts,
    pub firewall_rules: ChangeCounts,
    pub port_forwards: ChangeCounts,
    pub dhcp_servers: ChangeCounts,
    pub dhcp_static_mappings: ChangeCounts,
}

impl SyncCounts {
    pub fn get(&self, kind: EntityKind) -> ChangeCounts {
        match kind {
            EntityKind::Interface => self.interfaces,
            EntityKind::Vlan => self.vlans,
            EntityKind::FirewallRule => self.firewall_rules,
            EntityKind::PortForward => self.port_forwards,
            EntityKind::DhcpServer => self.dhcp_servers,
            EntityKind::DhcpStaticMapping => self.dhcp_static_mappings,
            EntityKind::Container => ChangeCounts::default(),
        }
    }

    fn slot_mut(&mut self, kind: EntityKind) -> Option<&mut ChangeCounts> {
        match kind {
            EntityKind::Interface => Some(&mut self.interfaces),
            EntityKind::Vlan => Some(&mut self.vlans),
            EntityKind::FirewallRule => Some(&mut self.firewall_rules),
            EntityKind::PortForward => Some(&mut self.port_forwards),
            EntityKind::DhcpServer => Some(&mut self.dhcp_servers),
            EntityKind::DhcpStaticMapping => Some(&mut self.dhcp_static_mappings),
            EntityKind::Container => None,
        }
    }

    pub fn total(&self) -> usize {
        EntityKind::SYNCED.iter().map(|k| self.get(*k).total()).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TypeOutcome {
    Reconciled {
        counts: ChangeCounts,
        entities: usize,
        /// A local write landed during the fetch and the type was fetched
        /// a second time.
        refetched: bool,
    },
    Failed {
        error: String,
        error_kind: String,
        retryable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeResult {
    pub kind: EntityKind,
    #[serde(flatten)]
    pub outcome: TypeOutcome,
}

impl TypeResult {
    fn failed(kind: EntityKind, err: &CoreError) -> Self {
        Self {
            kind,
            outcome: TypeOutcome::Failed {
                error: err.to_string(),
                error_kind: err.label().to_owned(),
                retryable: err.is_retryable(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, TypeOutcome::Reconciled { .. })
    }
}

/// Outcome of one sync pass over one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub server_id: ServerId,
    pub status: SyncStatus,
    pub counts: SyncCounts,
    pub types: Vec<TypeResult>,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl SyncResult {
    pub fn in_progress(server_id: ServerId) -> Self {
        Self {
            server_id,
            status: SyncStatus::InProgress,
            counts: SyncCounts::default(),
            types: Vec::new(),
            message: "a sync for this server is already running".into(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// A pass that could not start (no connection, task failure).
    pub fn aborted(server_id: ServerId, err: &CoreError) -> Self {
        Self {
            server_id,
            status: SyncStatus::Failed,
            counts: SyncCounts::default(),
            types: Vec::new(),
            message: err.to_string(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.status == SyncStatus::Complete
    }
}

/// Last-sync metadata kept per server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncInfo {
    pub last_sync: DateTime<Utc>,
    pub status: SyncStatus,
    pub duration_ms: u64,
    pub counts: SyncCounts,
    pub message: String,
    pub last_success: Option<DateTime<Utc>>,
}

impl SyncInfo {
    pub(crate) fn record(result: &SyncResult, previous: Option<&SyncInfo>) -> Self {
        let last_success = if result.success() {
            Some(result.started_at)
        } else {
            previous.and_then(|p| p.last_success)
        };
        Self {
            last_sync: result.started_at,
            status: result.status,
            duration_ms: result.duration_ms,
            counts: result.counts,
            message: result.message.clone(),
            last_success,
        }
    }
}

// ── Synchronizer ────────────────────────────────────────────────────

/// One sync pass over one server's store.
pub struct Synchronizer {
    store: Arc<MirrorStore>,
    remote: Arc<dyn RemoteState>,
    timeout: Duration,
}

impl Synchronizer {
    pub fn new(store: Arc<MirrorStore>, remote: Arc<dyn RemoteState>, timeout: Duration) -> Self {
        Self {
            store,
            remote,
            timeout,
        }
    }

    /// Fetch and reconcile every synced type, in order.
    pub async fn sync_all(&self, server_id: ServerId) -> SyncResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let remote = &self.remote;

        let types = vec![
            self.sync_type(|| remote.fetch_interfaces()).await,
            self.sync_type(|| remote.fetch_vlans()).await,
            self.sync_type(|| remote.fetch_firewall_rules()).await,
            self.sync_type(|| remote.fetch_port_forwards()).await,
            self.sync_type(|| remote.fetch_dhcp_servers()).await,
            self.sync_type(|| remote.fetch_dhcp_static_mappings()).await,
        ];

        let mut counts = SyncCounts::default();
        for t in &types {
            if let (TypeOutcome::Reconciled { counts: c, .. }, Some(slot)) =
                (&t.outcome, counts.slot_mut(t.kind))
            {
                *slot += *c;
            }
        }

        let failed: Vec<&TypeResult> = types.iter().filter(|t| !t.is_ok()).collect();
        let (status, message) = if failed.is_empty() {
            (
                SyncStatus::Complete,
                format!(
                    "synchronized {} entity types ({} changes)",
                    types.len(),
                    counts.total()
                ),
            )
        } else {
            let detail = failed
                .iter()
                .map(|t| match &t.outcome {
                    TypeOutcome::Failed { error, .. } => format!("{}: {error}", t.kind),
                    TypeOutcome::Reconciled { .. } => t.kind.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            if failed.len() == types.len() {
                (SyncStatus::Failed, format!("all entity types failed: {detail}"))
            } else {
                (
                    SyncStatus::Partial,
                    format!("{} of {} entity types failed: {detail}", failed.len(), types.len()),
                )
            }
        };

        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            server = %server_id,
            %status,
            changes = counts.total(),
            failed = failed.len(),
            duration_ms,
            "sync pass finished"
        );

        SyncResult {
            server_id,
            status,
            counts,
            types,
            message,
            started_at,
            duration_ms,
        }
    }

    async fn sync_type<T, F, Fut>(&self, fetch: F) -> TypeResult
    where
        T: MirrorEntity,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Vec<T>, CoreError>>,
    {
        let collection = self.store.collection::<T>();
        let operation = format!("fetch {}", T::KIND);
        let mut refetched = false;

        loop {
            let seen = collection.version();
            let remote = match bounded(self.timeout, &operation, fetch()).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(kind = %T::KIND, error = %e, "fetch failed, keeping previous data");
                    return TypeResult::failed(T::KIND, &e);
                }
            };

            // After one refetch the fetched set wins regardless of local writes.
            let guard = (!refetched).then_some(seen);
            match collection.reconcile(remote, guard) {
                Ok(Reconciled::Applied(counts)) => {
                    debug!(
                        kind = %T::KIND,
                        created = counts.created,
                        updated = counts.updated,
                        deleted = counts.deleted,
                        "reconciled"
                    );
                    return TypeResult {
                        kind: T::KIND,
                        outcome: TypeOutcome::Reconciled {
                            counts,
                            entities: collection.len(),
                            refetched,
                        },
                    };
                }
                Ok(Reconciled::Stale) => {
                    debug!(kind = %T::KIND, "local write landed during fetch, refetching");
                    refetched = true;
                }
                Err(e) => {
                    warn!(kind = %T::KIND, error = %e, "remote set rejected, keeping previous data");
                    return TypeResult::failed(T::KIND, &e);
                }
            }
        }
    }
}
