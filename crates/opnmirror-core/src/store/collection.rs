// ── Copy-swap entity collection ──
//
// One collection per entity type. The whole keyed set lives behind a
// `watch` channel as an `Arc` snapshot: readers clone the `Arc` and never
// block writers, writers build the next set and swap it in under the
// channel's write lock. A version counter bumps on every change so a
// reconcile can detect writes that landed after its fetch started.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::error::CoreError;

use super::entity::MirrorEntity;

/// Result of a single-entity upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Per-type diff produced by a reconcile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct ChangeCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ChangeCounts {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

impl std::ops::AddAssign for ChangeCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.deleted += rhs.deleted;
    }
}

/// Outcome of a version-guarded reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Applied(ChangeCounts),
    /// The collection changed after `expected_version` was read; nothing
    /// was applied.
    Stale,
}

type Entries<T> = Arc<IndexMap<String, Arc<T>>>;

struct State<T> {
    version: u64,
    entries: Entries<T>,
}

/// A keyed, copy-swapped set of one entity type.
pub struct Collection<T: MirrorEntity> {
    state: watch::Sender<State<T>>,
}

impl<T: MirrorEntity> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MirrorEntity> Collection<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(State {
            version: 0,
            entries: Arc::new(IndexMap::new()),
        });
        Self { state }
    }

    /// Build a collection from stored entities, validating keys.
    pub fn from_entities(entities: Vec<T>) -> Result<Self, CoreError> {
        let entries = index_remote_set(entities)?;
        let (state, _) = watch::channel(State {
            version: 0,
            entries: Arc::new(entries),
        });
        Ok(Self { state })
    }

    /// Current version; bumps on every applied change.
    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Cheap `Arc` clone of the current set.
    pub fn snapshot(&self) -> Entries<T> {
        Arc::clone(&self.state.borrow().entries)
    }

    pub fn list(&self) -> Vec<Arc<T>> {
        self.snapshot().values().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.snapshot().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.borrow().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace one entity under its natural key.
    pub fn upsert(&self, entity: T) -> UpsertOutcome {
        let key = entity.natural_key();
        let mut outcome = UpsertOutcome::Unchanged;
        self.state.send_if_modified(|state| {
            outcome = match state.entries.get(&key) {
                Some(existing) if **existing == entity => return false,
                Some(_) => UpsertOutcome::Updated,
                None => UpsertOutcome::Inserted,
            };
            Arc::make_mut(&mut state.entries).insert(key, Arc::new(entity));
            state.version += 1;
            true
        });
        outcome
    }

    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        let mut removed = None;
        self.state.send_if_modified(|state| {
            if !state.entries.contains_key(key) {
                return false;
            }
            removed = Arc::make_mut(&mut state.entries).shift_remove(key);
            state.version += 1;
            true
        });
        removed
    }

    /// Replace the set with `remote`, creating, updating, and deleting by
    /// natural key.
    ///
    /// With `expected_version`, nothing is applied if the collection moved
    /// past that version. An inconsistent remote set is rejected whole.
    pub fn reconcile(
        &self,
        remote: Vec<T>,
        expected_version: Option<u64>,
    ) -> Result<Reconciled, CoreError> {
        let incoming = index_remote_set(remote)?;

        let mut result = Reconciled::Stale;
        self.state.send_if_modified(|state| {
            if expected_version.is_some_and(|v| v != state.version) {
                return false;
            }

            let mut counts = ChangeCounts::default();
            let mut next = IndexMap::with_capacity(incoming.len());
            for (key, entity) in incoming {
                match state.entries.get(&key) {
                    None => {
                        counts.created += 1;
                        next.insert(key, entity);
                    }
                    Some(old) if **old == *entity => {
                        next.insert(key, Arc::clone(old));
                    }
                    Some(_) => {
                        counts.updated += 1;
                        next.insert(key, entity);
                    }
                }
            }
            counts.deleted = state
                .entries
                .keys()
                .filter(|k| !next.contains_key(*k))
                .count();

            result = Reconciled::Applied(counts);
            if counts.is_zero() {
                return false;
            }
            state.entries = Arc::new(next);
            state.version += 1;
            true
        });
        Ok(result)
    }

    /// Owned copies of every entity, in key order of insertion.
    pub fn to_vec(&self) -> Vec<T> {
        self.snapshot().values().map(|e| T::clone(e)).collect()
    }
}

/// Key a remote set, rejecting duplicates the mirror cannot represent.
fn index_remote_set<T: MirrorEntity>(
    remote: Vec<T>,
) -> Result<IndexMap<String, Arc<T>>, CoreError> {
    let mut entries: IndexMap<String, Arc<T>> = IndexMap::with_capacity(remote.len());

    for entity in remote {
        let key = entity.natural_key();
        match entries.get(&key) {
            None => {
                entries.insert(key, Arc::new(entity));
            }
            Some(existing) if existing.is_active() && entity.is_active() => {
                return Err(CoreError::MirrorInconsistent {
                    kind: T::KIND,
                    key,
                    reason: "natural key appears more than once in the remote set".into(),
                });
            }
            Some(existing) if !existing.is_active() && entity.is_active() => {
                debug!(kind = %T::KIND, %key, "inactive duplicate dropped in favour of an active one");
                entries.insert(key, Arc::new(entity));
            }
            Some(_) => {
                debug!(kind = %T::KIND, %key, "inactive duplicate dropped");
            }
        }
    }

    let mut claimed: HashMap<String, &str> = HashMap::new();
    for (key, entity) in &entries {
        if let Some(secondary) = entity.secondary_key() {
            if let Some(holder) = claimed.insert(secondary.clone(), key) {
                return Err(CoreError::MirrorInconsistent {
                    kind: T::KIND,
                    key: secondary,
                    reason: format!("claimed by both '{holder}' and '{key}'"),
                });
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::model::{DhcpStaticMapping, MacAddress, PortForward, Protocol, Vlan, VlanTag};

    fn vlan(parent: &str, tag: u16) -> Vlan {
        Vlan {
            parent_interface: parent.into(),
            tag: VlanTag::new(tag).unwrap(),
            device: format!("vlan0.{tag}"),
            description: String::new(),
            priority: 0,
            remote_id: None,
        }
    }

    fn forward(port: u16, enabled: bool) -> PortForward {
        PortForward {
            interface: "wan".into(),
            protocol: Protocol::Tcp,
            external_port: crate::model::PortSpec::single(port).unwrap(),
            internal_ip: "10.0.100.5".into(),
            internal_port: crate::model::PortSpec::single(port).unwrap(),
            enabled,
            description: String::new(),
            remote_id: None,
        }
    }

    fn mapping(mac: &str, ip: [u8; 4]) -> DhcpStaticMapping {
        DhcpStaticMapping {
            scope: "opt1".into(),
            mac_address: MacAddress::parse(mac).unwrap(),
            ip_address: Ipv4Addr::from(ip),
            hostname: String::new(),
            description: String::new(),
            remote_id: None,
        }
    }

    fn applied(r: Reconciled) -> ChangeCounts {
        match r {
            Reconciled::Applied(c) => c,
            Reconciled::Stale => panic!("unexpected stale reconcile"),
        }
    }

    #[test]
    fn upsert_reports_insert_update_unchanged() {
        let col = Collection::<Vlan>::new();
        assert_eq!(col.upsert(vlan("igc0", 100)), UpsertOutcome::Inserted);
        assert_eq!(col.upsert(vlan("igc0", 100)), UpsertOutcome::Unchanged);

        let mut changed = vlan("igc0", 100);
        changed.description = "iot".into();
        assert_eq!(col.upsert(changed), UpsertOutcome::Updated);
        assert_eq!(col.len(), 1);
        assert_eq!(col.version(), 2);
    }

    #[test]
    fn reconcile_creates_missing_entities() {
        let col = Collection::<Vlan>::new();
        col.upsert(vlan("igc0", 100));

        let counts = applied(
            col.reconcile(vec![vlan("igc0", 100), vlan("igc0", 200)], None)
                .unwrap(),
        );
        assert_eq!(
            counts,
            ChangeCounts {
                created: 1,
                updated: 0,
                deleted: 0
            }
        );
        assert!(col.contains("igc0/100"));
        assert!(col.contains("igc0/200"));
    }

    #[test]
    fn reconcile_deletes_absent_entities() {
        let col = Collection::<Vlan>::new();
        col.upsert(vlan("igc0", 100));
        col.upsert(vlan("igc0", 200));

        let counts = applied(col.reconcile(vec![vlan("igc0", 100)], None).unwrap());
        assert_eq!(counts.deleted, 1);
        assert!(col.get("igc0/200").is_none());
    }

    #[test]
    fn reconcile_twice_is_idempotent() {
        let col = Collection::<Vlan>::new();
        let set = vec![vlan("igc0", 100), vlan("igc1", 100)];
        applied(col.reconcile(set.clone(), None).unwrap());
        let version = col.version();

        let second = applied(col.reconcile(set, None).unwrap());
        assert!(second.is_zero());
        assert_eq!(col.version(), version);
    }

    #[test]
    fn reconcile_counts_only_content_changes_as_updates() {
        let col = Collection::<Vlan>::new();
        col.upsert(vlan("igc0", 100));
        let mut renamed = vlan("igc0", 100);
        renamed.description = "cameras".into();

        let counts = applied(col.reconcile(vec![renamed], None).unwrap());
        assert_eq!(counts.updated, 1);
        assert_eq!(col.get("igc0/100").unwrap().description, "cameras");
    }

    #[test]
    fn duplicate_natural_keys_reject_whole_set() {
        let col = Collection::<Vlan>::new();
        col.upsert(vlan("igc0", 300));

        let err = col
            .reconcile(vec![vlan("igc0", 100), vlan("igc0", 100)], None)
            .unwrap_err();
        assert!(matches!(err, CoreError::MirrorInconsistent { .. }));
        // Stale data retained.
        assert!(col.contains("igc0/300"));
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn disabled_duplicate_forward_yields_to_enabled() {
        let col = Collection::<PortForward>::new();
        let counts = applied(
            col.reconcile(vec![forward(80, false), forward(80, true)], None)
                .unwrap(),
        );
        assert_eq!(counts.created, 1);
        assert!(col.get("wan/tcp/80").unwrap().enabled);
    }

    #[test]
    fn disabled_duplicate_after_enabled_is_dropped() {
        let col = Collection::<PortForward>::new();
        let counts = applied(
            col.reconcile(vec![forward(80, true), forward(80, false)], None)
                .unwrap(),
        );
        assert_eq!(counts.created, 1);
        assert_eq!(col.len(), 1);
        assert!(col.get("wan/tcp/80").unwrap().enabled);
    }

    #[test]
    fn two_enabled_forwards_on_one_key_are_inconsistent() {
        let col = Collection::<PortForward>::new();
        let err = col
            .reconcile(vec![forward(80, true), forward(80, true)], None)
            .unwrap_err();
        assert!(matches!(err, CoreError::MirrorInconsistent { .. }));
    }

    #[test]
    fn duplicate_reserved_ip_in_scope_is_inconsistent() {
        let col = Collection::<DhcpStaticMapping>::new();
        let err = col
            .reconcile(
                vec![
                    mapping("aa:bb:cc:dd:ee:01", [10, 0, 100, 5]),
                    mapping("aa:bb:cc:dd:ee:02", [10, 0, 100, 5]),
                ],
                None,
            )
            .unwrap_err();
        match err {
            CoreError::MirrorInconsistent { key, .. } => assert_eq!(key, "opt1/10.0.100.5"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn guarded_reconcile_detects_intervening_write() {
        let col = Collection::<Vlan>::new();
        let seen = col.version();
        col.upsert(vlan("igc0", 100));

        let result = col.reconcile(vec![], Some(seen)).unwrap();
        assert_eq!(result, Reconciled::Stale);
        assert!(col.contains("igc0/100"));

        let now = col.version();
        let counts = applied(col.reconcile(vec![], Some(now)).unwrap());
        assert_eq!(counts.deleted, 1);
    }

    #[test]
    fn readers_keep_their_snapshot_across_swaps() {
        let col = Collection::<Vlan>::new();
        col.upsert(vlan("igc0", 100));
        let before = col.snapshot();

        applied(col.reconcile(vec![vlan("igc0", 200)], None).unwrap());
        assert!(before.contains_key("igc0/100"));
        assert!(!col.contains("igc0/100"));
    }
}
