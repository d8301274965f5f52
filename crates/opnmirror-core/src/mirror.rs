// ── Mirror facade ──
//
// Registry of servers, each with its own `MirrorStore`, connection, and
// locks. Sync passes and deployments run in spawned tasks so a caller
// that goes away does not abort them halfway through a write.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, MirrorSettings};
use crate::conflict::{ConflictDetector, ConflictReport};
use crate::deploy::{DeployReport, Orchestrator};
use crate::error::CoreError;
use crate::model::{Container, EntityKind, Resource, Server, ServerId};
use crate::remote::{ConnectionInfo, Connector, RemoteState, bounded};
use crate::spec::Proposal;
use crate::store::{MirrorSnapshot, MirrorStore, ServerSnapshot};
use crate::sync::{SyncInfo, SyncResult, SyncStatus, Synchronizer};

// ── Requests and outcomes ───────────────────────────────────────────

/// Everything needed to register an appliance.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub connection: ConnectionConfig,
    /// Where the caller keeps the API secret (a keyring entry name, an
    /// environment variable). Stored, never dereferenced here.
    pub credential_ref: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    pub success: bool,
    pub server_id: ServerId,
    pub interfaces_imported: usize,
    pub message: String,
}

/// Result of test, register, and first sync in one call.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardOutcome {
    pub product_version: String,
    pub registration: RegisterOutcome,
    pub sync: SyncResult,
}

// ── Per-server state ────────────────────────────────────────────────

struct ServerHandle {
    server: Server,
    store: Arc<MirrorStore>,
    remote: ArcSwapOption<Arc<dyn RemoteState>>,
    sync_lock: Arc<Mutex<()>>,
    deploy_lock: Arc<Mutex<()>>,
    sync_info: ArcSwapOption<SyncInfo>,
}

impl ServerHandle {
    fn new(server: Server, store: MirrorStore) -> Self {
        Self {
            server,
            store: Arc::new(store),
            remote: ArcSwapOption::empty(),
            sync_lock: Arc::new(Mutex::new(())),
            deploy_lock: Arc::new(Mutex::new(())),
            sync_info: ArcSwapOption::empty(),
        }
    }

    fn remote(&self) -> Result<Arc<dyn RemoteState>, CoreError> {
        self.remote
            .load_full()
            .map(|r| Arc::clone(&*r))
            .ok_or_else(|| CoreError::NotConnected {
                name: self.server.name.clone(),
            })
    }
}

// ── Mirror ──────────────────────────────────────────────────────────

/// Cheaply cloneable handle over every registered server's mirror.
#[derive(Clone)]
pub struct Mirror {
    inner: Arc<MirrorInner>,
}

struct MirrorInner {
    connector: Arc<dyn Connector>,
    settings: MirrorSettings,
    servers: DashMap<ServerId, Arc<ServerHandle>>,
    /// Held across the name check and the insert of a registration.
    registration: std::sync::Mutex<()>,
}

impl Mirror {
    pub fn new(connector: Arc<dyn Connector>, settings: MirrorSettings) -> Self {
        Self {
            inner: Arc::new(MirrorInner {
                connector,
                settings,
                servers: DashMap::new(),
                registration: std::sync::Mutex::new(()),
            }),
        }
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.inner.settings
    }

    fn timeout(&self) -> Duration {
        self.inner.settings.remote_timeout
    }

    fn handle(&self, id: ServerId) -> Result<Arc<ServerHandle>, CoreError> {
        self.inner
            .servers
            .get(&id)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| CoreError::ServerNotFound {
                identifier: id.to_string(),
            })
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// Check connectivity and credentials without registering anything.
    pub async fn test_connection(&self, config: &ConnectionConfig) -> Result<ConnectionInfo, CoreError> {
        let remote = self.inner.connector.connect(config)?;
        bounded(self.timeout(), "test connection", remote.test_connection()).await
    }

    /// Test the connection, register the server, and import its interfaces.
    pub async fn register_server(&self, request: RegisterRequest) -> Result<RegisterOutcome, CoreError> {
        let name = request.name.trim().to_owned();
        if name.is_empty() {
            return Err(CoreError::validation("name", "must not be empty"));
        }
        if self.find_server_by_name(&name).is_some() {
            return Err(CoreError::DuplicateServer { name });
        }

        let remote = self.inner.connector.connect(&request.connection)?;
        let info = bounded(self.timeout(), "test connection", remote.test_connection()).await?;

        let store = MirrorStore::new();
        let imported = store.reconcile(info.interfaces)?.created;
        let server = Server {
            id: ServerId::new(),
            name: name.clone(),
            hostname: request.connection.hostname.clone(),
            verify_ssl: request.connection.tls.verifies(),
            credential_ref: request.credential_ref,
            product_version: Some(info.product_version.clone()).filter(|v| !v.is_empty()),
            registered_at: Utc::now(),
        };
        let id = server.id;
        let handle = ServerHandle::new(server, store);
        handle.remote.store(Some(Arc::new(remote)));

        {
            let _registering = self
                .inner
                .registration
                .lock()
                .map_err(|_| CoreError::Internal("registration lock poisoned".into()))?;
            if self.find_server_by_name(&name).is_some() {
                return Err(CoreError::DuplicateServer { name });
            }
            self.inner.servers.insert(id, Arc::new(handle));
        }

        info!(server = %id, %name, interfaces = imported, "server registered");
        Ok(RegisterOutcome {
            success: true,
            server_id: id,
            interfaces_imported: imported,
            message: format!(
                "registered '{name}' ({} {}), imported {imported} interfaces",
                info.product_name, info.product_version
            ),
        })
    }

    /// Register then run a first sync. Stops at the first failing step;
    /// a failed sync still leaves the server registered.
    pub async fn onboard_and_sync(&self, request: RegisterRequest) -> Result<OnboardOutcome, CoreError> {
        let registration = self.register_server(request).await?;
        let product_version = self
            .server(registration.server_id)?
            .product_version
            .unwrap_or_default();
        let sync = self.sync_server(registration.server_id).await?;
        Ok(OnboardOutcome {
            product_version,
            registration,
            sync,
        })
    }

    /// Attach a live connection to a registered (for example restored)
    /// server. Does not contact the appliance.
    pub fn connect(&self, id: ServerId, config: &ConnectionConfig) -> Result<(), CoreError> {
        let handle = self.handle(id)?;
        let remote = self.inner.connector.connect(config)?;
        handle.remote.store(Some(Arc::new(remote)));
        debug!(server = %id, "connection attached");
        Ok(())
    }

    pub fn is_connected(&self, id: ServerId) -> bool {
        self.handle(id).is_ok_and(|h| h.remote.load().is_some())
    }

    pub fn unregister_server(&self, id: ServerId) -> Result<Server, CoreError> {
        let (_, handle) =
            self.inner
                .servers
                .remove(&id)
                .ok_or_else(|| CoreError::ServerNotFound {
                    identifier: id.to_string(),
                })?;
        info!(server = %id, name = %handle.server.name, "server unregistered");
        Ok(handle.server.clone())
    }

    /// Registered servers, by name.
    pub fn servers(&self) -> Vec<Server> {
        let mut servers: Vec<Server> = self
            .inner
            .servers
            .iter()
            .map(|h| h.value().server.clone())
            .collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }

    pub fn server(&self, id: ServerId) -> Result<Server, CoreError> {
        Ok(self.handle(id)?.server.clone())
    }

    pub fn find_server_by_name(&self, name: &str) -> Option<Server> {
        self.inner
            .servers
            .iter()
            .find(|h| h.value().server.name.eq_ignore_ascii_case(name))
            .map(|h| h.value().server.clone())
    }

    /// Resolve a server id or name.
    pub fn resolve(&self, identifier: &str) -> Result<ServerId, CoreError> {
        if let Ok(id) = identifier.parse::<ServerId>() {
            if self.inner.servers.contains_key(&id) {
                return Ok(id);
            }
        }
        self.find_server_by_name(identifier)
            .map(|s| s.id)
            .ok_or_else(|| CoreError::ServerNotFound {
                identifier: identifier.to_owned(),
            })
    }

    pub fn store(&self, id: ServerId) -> Result<Arc<MirrorStore>, CoreError> {
        Ok(Arc::clone(&self.handle(id)?.store))
    }

    // ── Sync ─────────────────────────────────────────────────────────

    /// Run one sync pass. A pass already running for this server makes
    /// this return an `in_progress` result immediately.
    pub async fn sync_server(&self, id: ServerId) -> Result<SyncResult, CoreError> {
        let handle = self.handle(id)?;
        let remote = handle.remote()?;
        let Ok(guard) = Arc::clone(&handle.sync_lock).try_lock_owned() else {
            debug!(server = %id, "sync already running");
            return Ok(SyncResult::in_progress(id));
        };

        let timeout = self.timeout();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = Synchronizer::new(Arc::clone(&handle.store), remote, timeout)
                .sync_all(id)
                .await;
            let previous = handle.sync_info.load_full();
            handle
                .sync_info
                .store(Some(Arc::new(SyncInfo::record(&result, previous.as_deref()))));
            result
        });
        task.await
            .map_err(|e| CoreError::Internal(format!("sync task failed: {e}")))
    }

    /// Sync every registered server, one after another.
    pub async fn sync_all_servers(&self) -> Vec<SyncResult> {
        let mut ids: Vec<(String, ServerId)> = self
            .inner
            .servers
            .iter()
            .map(|h| (h.value().server.name.clone(), *h.key()))
            .collect();
        ids.sort();

        let mut results = Vec::with_capacity(ids.len());
        for (_, id) in ids {
            let result = match self.sync_server(id).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(server = %id, error = %e, "sync could not start");
                    SyncResult::aborted(id, &e)
                }
            };
            results.push(result);
        }
        results
    }

    /// Sync every server on a fixed interval until `cancel` fires. The
    /// first pass runs one interval after spawning.
    pub fn spawn_periodic_sync(&self, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let mirror = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        for result in mirror.sync_all_servers().await {
                            match result.status {
                                SyncStatus::InProgress => {
                                    debug!(server = %result.server_id, "periodic sync skipped, pass already running");
                                }
                                SyncStatus::Complete => {}
                                SyncStatus::Partial | SyncStatus::Failed => {
                                    warn!(server = %result.server_id, message = %result.message, "periodic sync incomplete");
                                }
                            }
                        }
                    }
                }
            }
            debug!("periodic sync stopped");
        })
    }

    pub fn sync_info(&self, id: ServerId) -> Result<Option<SyncInfo>, CoreError> {
        Ok(self.handle(id)?.sync_info.load_full().map(|i| (*i).clone()))
    }

    // ── Conflicts and deployment ─────────────────────────────────────

    pub fn check(&self, id: ServerId, proposal: &Proposal) -> Result<ConflictReport, CoreError> {
        proposal.validate()?;
        let handle = self.handle(id)?;
        Ok(ConflictDetector::new(&handle.store, &self.inner.settings.wan_interface).check(proposal))
    }

    pub fn check_batch(
        &self,
        id: ServerId,
        proposals: &[Proposal],
    ) -> Result<Vec<ConflictReport>, CoreError> {
        for p in proposals {
            p.validate()?;
        }
        let handle = self.handle(id)?;
        Ok(ConflictDetector::new(&handle.store, &self.inner.settings.wan_interface)
            .check_batch(proposals))
    }

    /// Deploy one declared resource. Deployments on one server run one
    /// at a time.
    pub async fn deploy(
        &self,
        id: ServerId,
        proposal: Proposal,
        force: bool,
    ) -> Result<DeployReport, CoreError> {
        let handle = self.handle(id)?;
        let remote = handle.remote()?;
        let orchestrator = Orchestrator::new(
            Arc::clone(&handle.store),
            remote,
            self.timeout(),
            self.inner.settings.wan_interface.clone(),
        );

        let task = tokio::spawn(async move {
            let _deploying = Arc::clone(&handle.deploy_lock).lock_owned().await;
            orchestrator.deploy(&proposal, force).await
        });
        task.await
            .map_err(|e| CoreError::Internal(format!("deploy task failed: {e}")))?
    }

    /// Drop a container record, releasing its address, MAC, and ports for
    /// later proposals. Appliance-side entities stay until removed there.
    pub async fn remove_container(&self, id: ServerId, name: &str) -> Result<Container, CoreError> {
        let handle = self.handle(id)?;
        let _deploying = handle.deploy_lock.lock().await;
        let removed = handle
            .store
            .remove::<Container>(name)
            .ok_or_else(|| CoreError::NotFound {
                kind: EntityKind::Container,
                key: name.to_owned(),
            })?;
        info!(server = %id, container = %name, "container record removed");
        Ok((*removed).clone())
    }

    pub fn list_resources(&self, id: ServerId, kind: EntityKind) -> Result<Vec<Resource>, CoreError> {
        Ok(self.handle(id)?.store.list_kind(kind))
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub fn snapshot(&self) -> MirrorSnapshot {
        let mut servers: Vec<ServerSnapshot> = self
            .inner
            .servers
            .iter()
            .map(|h| ServerSnapshot {
                server: h.value().server.clone(),
                sync_info: h.value().sync_info.load_full().map(|i| (*i).clone()),
                store: h.value().store.to_snapshot(),
            })
            .collect();
        servers.sort_by(|a, b| a.server.name.cmp(&b.server.name));
        MirrorSnapshot {
            servers,
            ..MirrorSnapshot::default()
        }
    }

    /// Rebuild a mirror from a snapshot. Servers come back without a
    /// connection; call [`connect`](Self::connect) before remote work.
    pub fn restore(
        connector: Arc<dyn Connector>,
        settings: MirrorSettings,
        snapshot: MirrorSnapshot,
    ) -> Result<Self, CoreError> {
        snapshot.check_version()?;
        let mirror = Self::new(connector, settings);
        for entry in snapshot.servers {
            let store = MirrorStore::from_snapshot(entry.store)?;
            let handle = ServerHandle::new(entry.server, store);
            handle.sync_info.store(entry.sync_info.map(Arc::new));
            mirror
                .inner
                .servers
                .insert(handle.server.id, Arc::new(handle));
        }
        debug!(servers = mirror.inner.servers.len(), "mirror restored");
        Ok(mirror)
    }
}
