//! Configuration mirror and conflict-aware synchronizer for OPNsense
//! appliances.
//!
//! The appliance stays the source of truth and keeps accepting manual
//! changes through its own UI. This crate keeps a local copy of its state
//! and uses that copy to refuse conflicting allocations before they are
//! pushed:
//!
//! - **[`Mirror`]**: facade over every registered server. Registers
//!   appliances (importing their interfaces), runs sync passes one at a
//!   time per server, checks and deploys declared resources, and
//!   snapshots/restores its state.
//!
//! - **[`MirrorStore`]**: one per server. A [`Collection`] per entity type,
//!   each an atomically swapped snapshot keyed by natural key. Readers
//!   never observe a half-applied reconcile.
//!
//! - **[`Synchronizer`]**: fetches interfaces, VLANs, firewall rules, port
//!   forwards, DHCP scopes and reservations in that order, reconciling
//!   each into the store. A failing type keeps its previous data.
//!
//! - **[`ConflictDetector`]**: read-only VLAN tag, IP, MAC and port checks
//!   of a [`Proposal`] against the mirror and against earlier proposals
//!   of a batch.
//!
//! - **[`Orchestrator`]**: conflict check, remote create, optimistic
//!   write. Containers deploy as a sequence of idempotent steps.
//!
//! - **[`RemoteState`]**: the typed seam to the appliance, implemented
//!   over `opnmirror-api` by [`OpnRemote`].

pub mod config;
pub mod conflict;
pub mod convert;
pub mod deploy;
pub mod error;
pub mod mirror;
pub mod model;
pub mod remote;
pub mod spec;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConnectionConfig, MirrorSettings, ServerCredentials, TlsVerification};
pub use conflict::{Conflict, ConflictDetector, ConflictHolder, ConflictKind, ConflictReport};
pub use deploy::{DeployReport, DeployStep, DeploymentState, Orchestrator, StepOutcome};
pub use error::CoreError;
pub use mirror::{Mirror, OnboardOutcome, RegisterOutcome, RegisterRequest};
pub use remote::{ConnectionInfo, Connector, OpnConnector, OpnRemote, RemoteState};
pub use spec::{
    ContainerNetworkSpec, ContainerSpec, FirewallRuleSpec, PortForwardSpec, PortMappingSpec,
    Proposal, StaticMappingSpec, VlanSpec,
};
pub use store::{
    ChangeCounts, Collection, MirrorEntity, MirrorSnapshot, MirrorStore, Reconciled,
    UpsertOutcome,
};
pub use sync::{SyncCounts, SyncInfo, SyncResult, SyncStatus, Synchronizer, TypeOutcome, TypeResult};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Container, ContainerNetwork, ContainerStatus, DhcpServer, DhcpStaticMapping, EntityKind,
    FirewallRule, Interface, MacAddress, PortForward, PortMapping, PortSpec, Protocol, Resource,
    RuleAction, Server, ServerId, Vlan, VlanTag,
};
